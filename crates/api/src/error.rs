use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use persistence::{StoreError, StoreErrorKind};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation error: {message}")]
    Validation {
        message: String,
        details: Option<Vec<ValidationDetail>>,
    },

    /// An outbound provider (email, messaging) failed.
    #[error("Upstream error: {message}")]
    Upstream {
        message: String,
        details: Option<String>,
    },

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::Validation {
            message: message.into(),
            details: None,
        }
    }

    pub fn upstream(message: impl Into<String>, details: Option<String>) -> Self {
        ApiError::Upstream {
            message: message.into(),
            details,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum ErrorDetails {
    Fields(Vec<ValidationDetail>),
    Text(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<ErrorDetails>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationDetail {
    pub field: String,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message, details) = match self {
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg, None),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg, None),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg, None),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg, None),
            ApiError::Validation { message, details } => (
                StatusCode::BAD_REQUEST,
                "validation_error",
                message,
                details.map(ErrorDetails::Fields),
            ),
            ApiError::Upstream { message, details } => {
                tracing::warn!(error = %message, details = ?details, "Upstream provider failure");
                (
                    StatusCode::BAD_GATEWAY,
                    "upstream_error",
                    message,
                    details.map(ErrorDetails::Text),
                )
            }
            ApiError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".into(),
                    None,
                )
            }
            ApiError::ServiceUnavailable(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "service_unavailable",
                msg,
                None,
            ),
        };

        let body = ErrorBody {
            error: error_code.into(),
            message,
            details,
        };

        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err.kind {
            StoreErrorKind::Conflict => ApiError::Conflict("Resource already exists".into()),
            StoreErrorKind::ForeignKey => {
                ApiError::NotFound("Referenced resource not found".into())
            }
            StoreErrorKind::Unavailable => {
                ApiError::ServiceUnavailable("Data store unavailable".into())
            }
            StoreErrorKind::PermissionDenied => {
                ApiError::Forbidden("Operation not permitted".into())
            }
            _ => ApiError::Internal(format!("Store error ({}): {}", err.kind.as_str(), err)),
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut details: Vec<ValidationDetail> = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |e| ValidationDetail {
                    field: field.to_string(),
                    message: e
                        .message
                        .clone()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| e.code.to_string()),
                })
            })
            .collect();
        details.sort_by(|a, b| a.field.cmp(&b.field));

        let message = if details.len() == 1 {
            details[0].message.clone()
        } else {
            format!("{} validation errors", details.len())
        };

        ApiError::Validation {
            message,
            details: Some(details),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_status_codes() {
        let cases = [
            (ApiError::Unauthorized("x".into()), StatusCode::UNAUTHORIZED),
            (ApiError::Forbidden("x".into()), StatusCode::FORBIDDEN),
            (ApiError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (ApiError::Conflict("x".into()), StatusCode::CONFLICT),
            (ApiError::validation("x"), StatusCode::BAD_REQUEST),
            (ApiError::upstream("x", None), StatusCode::BAD_GATEWAY),
            (ApiError::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (ApiError::ServiceUnavailable("x".into()), StatusCode::SERVICE_UNAVAILABLE),
        ];
        for (error, status) in cases {
            assert_eq!(error.into_response().status(), status);
        }
    }

    #[tokio::test]
    async fn test_internal_hides_cause() {
        let body = body_json(ApiError::Internal("password=hunter2".into()).into_response()).await;
        assert_eq!(body["error"], "internal_error");
        assert_eq!(body["message"], "An internal error occurred");
        assert!(body.get("details").is_none());
    }

    #[tokio::test]
    async fn test_upstream_carries_details() {
        let body = body_json(
            ApiError::upstream("Failed to send approval email", Some("HTTP 500".into()))
                .into_response(),
        )
        .await;
        assert_eq!(body["error"], "upstream_error");
        assert_eq!(body["details"], "HTTP 500");
    }

    #[test]
    fn test_from_store_error() {
        let conflict: ApiError = StoreError::new(StoreErrorKind::Conflict, "dup").into();
        assert!(matches!(conflict, ApiError::Conflict(_)));

        let down: ApiError = StoreError::new(StoreErrorKind::Unavailable, "timeout").into();
        assert!(matches!(down, ApiError::ServiceUnavailable(_)));

        let other: ApiError = StoreError::new(StoreErrorKind::SchemaMismatch, "column").into();
        assert!(matches!(other, ApiError::Internal(_)));
    }

    #[tokio::test]
    async fn test_from_validation_errors() {
        use validator::Validate;

        let request = domain::models::ApproveAccountRequest {
            token: String::new(),
        };
        let error: ApiError = request.validate().unwrap_err().into();
        let body = body_json(error.into_response()).await;

        assert_eq!(body["message"], "Missing token");
        assert_eq!(body["details"][0]["field"], "token");
    }

    #[test]
    fn test_display() {
        assert_eq!(
            ApiError::NotFound("Retreat not found".into()).to_string(),
            "Not found: Retreat not found"
        );
        assert_eq!(
            ApiError::validation("bad").to_string(),
            "Validation error: bad"
        );
    }
}
