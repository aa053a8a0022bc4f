//! Registration lifecycle: submission and payment-status transitions.
//!
//! Every transition persists first and notifies second. Notification failures
//! are reported next to the committed registration and never undo it.

use chrono::{DateTime, Utc};
use domain::models::registration::CreateRegistrationRequest;
use domain::models::retreat::clean_optional_text;
use domain::models::{
    NewRegistration, NotificationAction, NotificationRequest, NotificationResult, PaymentStatus,
    Registration, Retreat,
};
use persistence::repositories::{RegistrationRepository, RegistrationShape, RetreatRepository};
use persistence::{SharedStore, StoreError, StoreErrorKind};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::NotificationsConfig;
use crate::error::ApiError;
use crate::middleware::metrics::record_registration_transition;
use crate::services::dispatcher::NotificationDispatcher;

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Registration not found")]
    RegistrationNotFound,

    #[error("Retreat not found")]
    RetreatNotFound,

    #[error("Cannot move registration from {from} to {to}")]
    InvalidTransition {
        from: PaymentStatus,
        to: PaymentStatus,
    },

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<LifecycleError> for ApiError {
    fn from(err: LifecycleError) -> Self {
        match err {
            LifecycleError::RegistrationNotFound | LifecycleError::RetreatNotFound => {
                ApiError::NotFound(err.to_string())
            }
            LifecycleError::InvalidTransition { .. } => ApiError::Conflict(err.to_string()),
            LifecycleError::Validation(message) => ApiError::validation(message),
            LifecycleError::Store(e) => e.into(),
        }
    }
}

/// Attempts and linear backoff for the registration confirmation email.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &NotificationsConfig) -> Self {
        Self {
            attempts: config.confirmation_attempts.max(1),
            backoff: Duration::from_millis(config.confirmation_backoff_ms),
        }
    }

    /// Delay before the attempt that follows attempt number `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.backoff * attempt
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&NotificationsConfig::default())
    }
}

/// A committed registration change plus what the participant was told.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionOutcome {
    pub registration: Registration,
    pub notification: NotificationResult,
}

#[derive(Clone)]
pub struct RegistrationLifecycle {
    store: SharedStore,
    elevated_store: SharedStore,
    dispatcher: NotificationDispatcher,
    retry: RetryPolicy,
}

impl RegistrationLifecycle {
    pub fn new(
        store: SharedStore,
        elevated_store: SharedStore,
        dispatcher: NotificationDispatcher,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            store,
            elevated_store,
            dispatcher,
            retry,
        }
    }

    /// Inserts a public submission as `pending` and sends the confirmation email.
    pub async fn submit(
        &self,
        retreat: &Retreat,
        request: &CreateRegistrationRequest,
        now: DateTime<Utc>,
    ) -> Result<TransitionOutcome, LifecycleError> {
        if let Some(size) = clean_optional_text(request.shirt_size.as_deref()) {
            if !retreat.offers_shirt_size(&size) {
                return Err(LifecycleError::Validation(format!(
                    "Shirt size {} is not offered for this retreat",
                    size
                )));
            }
        }

        let new = NewRegistration::from_request(retreat.id, request, now);
        let registration = self.insert_registration(&new).await?;

        info!(
            registration_id = %registration.id,
            retreat_id = %retreat.id,
            "Registration submitted"
        );
        record_registration_transition("submitted");

        let notification = self.send_confirmation(&registration, retreat).await;
        Ok(TransitionOutcome {
            registration,
            notification,
        })
    }

    /// Stores payment instructions, moves to `link_sent` and notifies the participant.
    ///
    /// Without instructions in the request the retreat's default instructions are used.
    pub async fn send_payment_link(
        &self,
        registration_id: Uuid,
        instructions: Option<&str>,
    ) -> Result<TransitionOutcome, LifecycleError> {
        let (registration, retreat) = self.load(registration_id).await?;
        ensure_transition(registration.payment_status, PaymentStatus::LinkSent)?;

        let instructions = clean_optional_text(instructions)
            .or_else(|| clean_optional_text(retreat.payment_instructions.as_deref()))
            .ok_or_else(|| {
                LifecycleError::Validation("Payment instructions are required".to_string())
            })?;

        let updated = match RegistrationRepository::new(self.store.clone())
            .mark_link_sent(registration_id, registration.payment_status, &instructions)
            .await?
        {
            Some(updated) => updated,
            None => return Err(self.lost_transition(registration_id, PaymentStatus::LinkSent).await),
        };

        info!(registration_id = %registration_id, "Payment link stored");
        record_registration_transition("link_sent");

        let notification = self
            .notify(NotificationAction::PaymentLink, &updated, &retreat)
            .await;
        Ok(TransitionOutcome {
            registration: updated,
            notification,
        })
    }

    /// Confirms payment. Requires a WhatsApp group link from the request or the retreat.
    ///
    /// A new link is written to the retreat before the registration changes; if
    /// that write fails nothing else happens.
    pub async fn confirm_payment(
        &self,
        registration_id: Uuid,
        whatsapp_group_link: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<TransitionOutcome, LifecycleError> {
        let (registration, mut retreat) = self.load(registration_id).await?;
        ensure_transition(registration.payment_status, PaymentStatus::Paid)?;

        let link = clean_optional_text(whatsapp_group_link)
            .or_else(|| retreat.group_link().map(str::to_string))
            .ok_or_else(|| {
                LifecycleError::Validation(
                    "A WhatsApp group link is required to confirm payment".to_string(),
                )
            })?;

        if retreat.group_link() != Some(link.as_str()) {
            let saved = RetreatRepository::new(self.store.clone())
                .set_whatsapp_group_link(retreat.id, &link)
                .await?;
            if !saved {
                return Err(LifecycleError::RetreatNotFound);
            }
            info!(retreat_id = %retreat.id, "Retreat WhatsApp group link updated");
            retreat.whatsapp_group_link = Some(link.clone());
        }

        let updated = match RegistrationRepository::new(self.store.clone())
            .mark_paid(registration_id, registration.payment_status, &link, now)
            .await?
        {
            Some(updated) => updated,
            None => return Err(self.lost_transition(registration_id, PaymentStatus::Paid).await),
        };

        info!(registration_id = %registration_id, "Payment confirmed");
        record_registration_transition("paid");

        let notification = self
            .notify(NotificationAction::PaymentConfirmed, &updated, &retreat)
            .await;
        Ok(TransitionOutcome {
            registration: updated,
            notification,
        })
    }

    /// Re-sends the notification matching the current status without changing it.
    pub async fn resend_notification(
        &self,
        registration_id: Uuid,
    ) -> Result<TransitionOutcome, LifecycleError> {
        let (registration, retreat) = self.load(registration_id).await?;

        let notification = match registration.payment_status {
            PaymentStatus::Pending => self.send_confirmation(&registration, &retreat).await,
            PaymentStatus::LinkSent => {
                self.notify(NotificationAction::PaymentLink, &registration, &retreat)
                    .await
            }
            PaymentStatus::Paid => {
                self.notify(NotificationAction::PaymentConfirmed, &registration, &retreat)
                    .await
            }
        };

        Ok(TransitionOutcome {
            registration,
            notification,
        })
    }

    /// Re-sends the registration confirmation email.
    pub async fn resend_confirmation(
        &self,
        registration_id: Uuid,
    ) -> Result<NotificationResult, LifecycleError> {
        let (registration, retreat) = self.load(registration_id).await?;
        Ok(self.send_confirmation(&registration, &retreat).await)
    }

    /// Hard-deletes a registration in any state.
    pub async fn delete(&self, registration_id: Uuid) -> Result<(), LifecycleError> {
        let removed = RegistrationRepository::new(self.store.clone())
            .delete(registration_id)
            .await?;
        if !removed {
            return Err(LifecycleError::RegistrationNotFound);
        }
        info!(registration_id = %registration_id, "Registration deleted");
        Ok(())
    }

    async fn load(&self, registration_id: Uuid) -> Result<(Registration, Retreat), LifecycleError> {
        let registration = RegistrationRepository::new(self.store.clone())
            .find_by_id(registration_id)
            .await?
            .ok_or(LifecycleError::RegistrationNotFound)?;
        let retreat = RetreatRepository::new(self.store.clone())
            .find_by_id(registration.retreat_id)
            .await?
            .ok_or(LifecycleError::RetreatNotFound)?;
        Ok((registration, retreat))
    }

    /// Explains a guarded status write that matched no row.
    async fn lost_transition(&self, registration_id: Uuid, to: PaymentStatus) -> LifecycleError {
        match RegistrationRepository::new(self.store.clone())
            .find_by_id(registration_id)
            .await
        {
            Ok(Some(current)) => {
                warn!(
                    registration_id = %registration_id,
                    status = %current.payment_status,
                    "Payment status changed concurrently"
                );
                LifecycleError::InvalidTransition {
                    from: current.payment_status,
                    to,
                }
            }
            Ok(None) => LifecycleError::RegistrationNotFound,
            Err(e) => LifecycleError::Store(e),
        }
    }

    /// Tries each payload shape in order.
    ///
    /// Schema mismatches move on to the next shape. A permission denial
    /// switches to the elevated store once; any other error stops immediately.
    async fn insert_registration(&self, new: &NewRegistration) -> Result<Registration, StoreError> {
        let mut repo = RegistrationRepository::new(self.store.clone());
        let mut elevated = false;
        let mut last_error = None;

        for shape in RegistrationShape::ALL {
            let result = match repo.insert_shape(new, shape).await {
                Err(e) if e.is_permission_denied() && !elevated => {
                    warn!(shape = shape.as_str(), error = %e, "Insert denied, retrying with elevated store");
                    elevated = true;
                    repo = RegistrationRepository::new(self.elevated_store.clone());
                    repo.insert_shape(new, shape).await
                }
                other => other,
            };

            match result {
                Ok(registration) => {
                    info!(shape = shape.as_str(), elevated, "Registration inserted");
                    return Ok(registration);
                }
                Err(e) if e.is_schema_mismatch() => {
                    warn!(shape = shape.as_str(), error = %e, "Registration shape rejected by schema");
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| {
            StoreError::new(StoreErrorKind::Other, "no registration payload shape accepted")
        }))
    }

    async fn send_confirmation(
        &self,
        registration: &Registration,
        retreat: &Retreat,
    ) -> NotificationResult {
        let request = NotificationRequest::for_registration(
            NotificationAction::RegistrationConfirmation,
            registration,
            retreat,
        );

        let mut attempt = 1;
        loop {
            let result = self.dispatcher.dispatch(&request).await;
            if !result.email_retryable() || attempt >= self.retry.attempts {
                if !result.email_sent {
                    warn!(
                        registration_id = %registration.id,
                        attempts = attempt,
                        "Confirmation email not delivered"
                    );
                }
                return result;
            }

            let delay = self.retry.delay_after(attempt);
            warn!(
                registration_id = %registration.id,
                attempt,
                delay_ms = delay.as_millis() as u64,
                "Confirmation email failed, retrying"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    async fn notify(
        &self,
        action: NotificationAction,
        registration: &Registration,
        retreat: &Retreat,
    ) -> NotificationResult {
        let request = NotificationRequest::for_registration(action, registration, retreat);
        self.dispatcher.dispatch(&request).await
    }
}

fn ensure_transition(from: PaymentStatus, to: PaymentStatus) -> Result<(), LifecycleError> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(LifecycleError::InvalidTransition { from, to })
    }
}
