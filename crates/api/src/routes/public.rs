//! Public registration routes reached through a retreat's share link.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use domain::models::{CreateRegistrationRequest, NotificationResult, PublicRetreat, Retreat};
use persistence::repositories::RetreatRepository;
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::services::registration_lifecycle::TransitionOutcome;

async fn active_retreat(state: &AppState, share_link: &str) -> Result<Retreat, ApiError> {
    RetreatRepository::new(state.store.clone())
        .find_active_by_share_link(share_link.trim())
        .await?
        .ok_or_else(|| ApiError::NotFound("Retreat not found".into()))
}

/// GET /api/v1/public/retreats/:share_link
pub async fn get_retreat(
    State(state): State<AppState>,
    Path(share_link): Path<String>,
) -> Result<Json<PublicRetreat>, ApiError> {
    let retreat = active_retreat(&state, &share_link).await?;
    Ok(Json(retreat.into()))
}

/// Submit a registration form.
///
/// POST /api/v1/public/retreats/:share_link/registrations
///
/// The registration is stored as `pending` before the confirmation email is
/// attempted; the email outcome is reported alongside it.
pub async fn submit_registration(
    State(state): State<AppState>,
    Path(share_link): Path<String>,
    Json(request): Json<CreateRegistrationRequest>,
) -> Result<(StatusCode, Json<TransitionOutcome>), ApiError> {
    request.validate()?;
    let retreat = active_retreat(&state, &share_link).await?;

    let outcome = state
        .lifecycle
        .submit(&retreat, &request, Utc::now())
        .await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

/// POST /api/v1/public/registrations/:id/resend-confirmation
pub async fn resend_confirmation(
    State(state): State<AppState>,
    Path(registration_id): Path<Uuid>,
) -> Result<Json<NotificationResult>, ApiError> {
    let result = state.lifecycle.resend_confirmation(registration_id).await?;
    Ok(Json(result))
}
