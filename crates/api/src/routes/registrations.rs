//! Admin payment-lifecycle routes for a single registration.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use domain::models::{ConfirmPaymentRequest, SendPaymentLinkRequest};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::AdminUser;
use crate::services::registration_lifecycle::TransitionOutcome;

/// Store payment instructions and notify the participant.
///
/// POST /api/v1/registrations/:id/payment-link
///
/// The body may be empty; the retreat's default instructions are used then.
pub async fn send_payment_link(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(registration_id): Path<Uuid>,
    body: Option<Json<SendPaymentLinkRequest>>,
) -> Result<Json<TransitionOutcome>, ApiError> {
    let request = body.map(|Json(r)| r).unwrap_or_default();
    request.validate()?;

    let outcome = state
        .lifecycle
        .send_payment_link(registration_id, request.payment_instructions.as_deref())
        .await?;

    info!(
        registration_id = %registration_id,
        admin_id = %admin.user_id,
        email_sent = outcome.notification.email_sent,
        "Payment link sent"
    );
    Ok(Json(outcome))
}

/// Mark a registration paid and send the group invite.
///
/// POST /api/v1/registrations/:id/confirm-payment
pub async fn confirm_payment(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(registration_id): Path<Uuid>,
    body: Option<Json<ConfirmPaymentRequest>>,
) -> Result<Json<TransitionOutcome>, ApiError> {
    let request = body.map(|Json(r)| r).unwrap_or_default();
    request.validate()?;

    let outcome = state
        .lifecycle
        .confirm_payment(
            registration_id,
            request.whatsapp_group_link.as_deref(),
            Utc::now(),
        )
        .await?;

    info!(
        registration_id = %registration_id,
        admin_id = %admin.user_id,
        email_sent = outcome.notification.email_sent,
        "Payment confirmation sent"
    );
    Ok(Json(outcome))
}

/// Re-send the message that matches the current payment status.
///
/// POST /api/v1/registrations/:id/resend-notification
pub async fn resend_notification(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(registration_id): Path<Uuid>,
) -> Result<Json<TransitionOutcome>, ApiError> {
    let outcome = state.lifecycle.resend_notification(registration_id).await?;
    Ok(Json(outcome))
}

/// DELETE /api/v1/registrations/:id
pub async fn delete_registration(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(registration_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.lifecycle.delete(registration_id).await?;

    info!(
        registration_id = %registration_id,
        admin_id = %admin.user_id,
        "Registration deleted"
    );
    Ok(StatusCode::NO_CONTENT)
}
