//! Bearer token authentication and admin gating.

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use domain::models::Profile;
use shared::jwt::{extract_user_id, AccessTokenVerifier, JwtError};
use uuid::Uuid;

use crate::app::AppState;
use crate::error::ApiError;

/// Identity taken from a verified access token.
#[derive(Debug, Clone)]
pub struct UserAuth {
    pub user_id: Uuid,
    pub email: Option<String>,
}

impl UserAuth {
    /// Verifies `token` and returns the caller's identity.
    pub fn validate(verifier: &AccessTokenVerifier, token: &str) -> Result<Self, ApiError> {
        let claims = verifier.verify(token).map_err(|e| match e {
            JwtError::TokenExpired => ApiError::Unauthorized("Token has expired".into()),
            _ => ApiError::Unauthorized("Invalid token".into()),
        })?;
        let user_id = extract_user_id(&claims)
            .map_err(|_| ApiError::Unauthorized("Invalid user ID in token".into()))?;

        Ok(UserAuth {
            user_id,
            email: claims.email,
        })
    }

    /// Reads and verifies the `Authorization: Bearer` header.
    pub fn from_headers(verifier: &AccessTokenVerifier, headers: &HeaderMap) -> Result<Self, ApiError> {
        let token = bearer_token(headers)?;
        Self::validate(verifier, token)
    }
}

/// An approved admin, resolved after primary-admin re-assertion.
#[derive(Debug, Clone)]
pub struct AdminUser {
    pub user_id: Uuid,
    pub profile: Profile,
}

/// Extracts the raw bearer token.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("Missing Authorization header".into()))?;

    match value.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => Ok(token.trim()),
        _ => Err(ApiError::Unauthorized(
            "Invalid Authorization header format".into(),
        )),
    }
}

/// Resolves the caller's profile and requires an approved admin.
pub async fn resolve_admin(state: &AppState, auth: &UserAuth) -> Result<AdminUser, ApiError> {
    let profile = state
        .accounts
        .sign_in(auth.user_id, auth.email.as_deref(), Utc::now())
        .await?;

    if !profile.is_approved_admin() {
        tracing::info!(user_id = %auth.user_id, role = %profile.role, "Admin access denied");
        return Err(ApiError::Forbidden("Admin access required".into()));
    }

    Ok(AdminUser {
        user_id: auth.user_id,
        profile,
    })
}

/// Route layer requiring a valid access token.
pub async fn require_user_auth(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    match UserAuth::from_headers(&state.verifier, req.headers()) {
        Ok(auth) => {
            req.extensions_mut().insert(auth);
            next.run(req).await
        }
        Err(e) => e.into_response(),
    }
}

/// Route layer requiring an approved admin.
pub async fn require_admin(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let auth = match UserAuth::from_headers(&state.verifier, req.headers()) {
        Ok(auth) => auth,
        Err(e) => return e.into_response(),
    };

    match resolve_admin(&state, &auth).await {
        Ok(admin) => {
            req.extensions_mut().insert(auth);
            req.extensions_mut().insert(admin);
            next.run(req).await
        }
        Err(e) => e.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn verifier() -> AccessTokenVerifier {
        AccessTokenVerifier::new("test-secret-that-is-long-enough", 0).unwrap()
    }

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token(&headers("Bearer abc")).unwrap(), "abc");
        assert!(bearer_token(&headers("Basic abc")).is_err());
        assert!(bearer_token(&headers("Bearer ")).is_err());
        assert!(bearer_token(&HeaderMap::new()).is_err());
    }

    #[test]
    fn test_validate_round_trip_claims() {
        let verifier = verifier();
        let user_id = Uuid::new_v4();
        let token = verifier
            .issue(user_id, Some("maria@example.com"), 3600)
            .unwrap();

        let auth = UserAuth::from_headers(&verifier, &headers(&format!("Bearer {}", token))).unwrap();
        assert_eq!(auth.user_id, user_id);
        assert_eq!(auth.email.as_deref(), Some("maria@example.com"));
    }

    #[test]
    fn test_expired_token_is_unauthorized() {
        let verifier = verifier();
        let token = verifier.issue(Uuid::new_v4(), None, -120).unwrap();

        let err = UserAuth::validate(&verifier, &token).unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(ref m) if m == "Token has expired"));
    }

    #[test]
    fn test_foreign_signature_is_unauthorized() {
        let other = AccessTokenVerifier::new("another-secret-entirely", 0).unwrap();
        let token = other.issue(Uuid::new_v4(), None, 3600).unwrap();

        assert!(matches!(
            UserAuth::validate(&verifier(), &token),
            Err(ApiError::Unauthorized(_))
        ));
    }
}
