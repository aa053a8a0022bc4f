//! Account routes: sign-in, sign-up and admin approval.

use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use domain::models::{ApprovalRequest, ApproveAccountRequest, Profile, SignUpRequest};
use serde::Serialize;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::UserAuth;
use crate::services::accounts::SignUpOutcome;
use crate::services::approval::IssueOutcome;

/// Response of the approval endpoints.
#[derive(Debug, Serialize)]
pub struct ApprovalResponse {
    pub ok: bool,
    pub message: String,
}

/// Issue an approval token and email the link to the approver.
///
/// POST /api/v1/accounts/approval-requests
pub async fn request_approval(
    State(state): State<AppState>,
    Json(request): Json<ApprovalRequest>,
) -> Result<(StatusCode, Json<ApprovalResponse>), ApiError> {
    request.validate()?;

    let outcome = state
        .approvals
        .request_approval(
            request.user_id,
            &request.email,
            request.full_name.as_deref(),
            Utc::now(),
        )
        .await?;

    let (status, message) = match outcome {
        IssueOutcome::Issued => (StatusCode::ACCEPTED, "Approval requested"),
        IssueOutcome::PrimaryAdmin => (StatusCode::OK, "Primary admin does not need approval"),
    };
    Ok((
        status,
        Json(ApprovalResponse {
            ok: true,
            message: message.to_string(),
        }),
    ))
}

/// Consume an approval token.
///
/// POST /api/v1/accounts/approve
pub async fn approve(
    State(state): State<AppState>,
    Json(request): Json<ApproveAccountRequest>,
) -> Result<Json<ApprovalResponse>, ApiError> {
    request.validate()?;

    let outcome = state.approvals.approve(&request.token, Utc::now()).await?;
    Ok(Json(ApprovalResponse {
        ok: true,
        message: outcome.message().to_string(),
    }))
}

/// Current profile, created on first sign-in.
///
/// GET /api/v1/accounts/me
pub async fn me(
    State(state): State<AppState>,
    user_auth: UserAuth,
) -> Result<Json<Profile>, ApiError> {
    let profile = state
        .accounts
        .sign_in(user_auth.user_id, user_auth.email.as_deref(), Utc::now())
        .await?;
    Ok(Json(profile))
}

/// POST /api/v1/accounts/sign-up
pub async fn sign_up(
    State(state): State<AppState>,
    user_auth: UserAuth,
    body: Option<Json<SignUpRequest>>,
) -> Result<(StatusCode, Json<SignUpOutcome>), ApiError> {
    let request = body.map(|Json(r)| r).unwrap_or_default();
    request.validate()?;

    let outcome = state
        .accounts
        .sign_up(
            user_auth.user_id,
            user_auth.email.as_deref(),
            request.full_name.as_deref(),
            Utc::now(),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}
