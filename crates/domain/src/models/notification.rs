//! Notification request and result contracts.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::registration::Registration;
use super::retreat::Retreat;

/// Maximum characters of provider diagnostics kept in a result.
pub const DETAILS_MAX_CHARS: usize = 500;

/// Lifecycle event a participant notification is sent for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationAction {
    RegistrationConfirmation,
    PaymentLink,
    PaymentConfirmed,
}

impl NotificationAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationAction::RegistrationConfirmation => "registration_confirmation",
            NotificationAction::PaymentLink => "payment_link",
            NotificationAction::PaymentConfirmed => "payment_confirmed",
        }
    }

    /// Whether a WhatsApp message exists for this action.
    pub fn has_whatsapp_message(&self) -> bool {
        !matches!(self, NotificationAction::RegistrationConfirmation)
    }
}

impl fmt::Display for NotificationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything needed to render and deliver one participant notification.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationRequest {
    pub action: NotificationAction,
    pub to: String,
    pub phone: Option<String>,
    pub participant_name: String,
    pub retreat_name: String,
    pub retreat_start: Option<NaiveDate>,
    pub retreat_end: Option<NaiveDate>,
    pub location: Option<String>,
    pub instagram_handle: Option<String>,
    /// Payment instructions (free text or URL) for `payment_link`.
    pub payment_link: Option<String>,
    /// Group invite for `payment_confirmed`.
    pub whatsapp_group_link: Option<String>,
}

impl NotificationRequest {
    /// Builds the request for `action` from the stored registration and its retreat.
    pub fn for_registration(
        action: NotificationAction,
        registration: &Registration,
        retreat: &Retreat,
    ) -> Self {
        let (payment_link, whatsapp_group_link) = match action {
            NotificationAction::RegistrationConfirmation => (None, None),
            NotificationAction::PaymentLink => (registration.payment_link.clone(), None),
            NotificationAction::PaymentConfirmed => (
                None,
                registration
                    .whatsapp_group_link
                    .clone()
                    .or_else(|| retreat.group_link().map(str::to_string)),
            ),
        };

        Self {
            action,
            to: registration.email.clone(),
            phone: Some(registration.phone.clone()).filter(|p| !p.trim().is_empty()),
            participant_name: registration.full_name.clone(),
            retreat_name: retreat.name.clone(),
            retreat_start: Some(retreat.start_date),
            retreat_end: retreat.end_date,
            location: Some(retreat.location.clone()),
            instagram_handle: retreat.instagram_handle.clone(),
            payment_link,
            whatsapp_group_link,
        }
    }
}

/// Why a WhatsApp message was or was not delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WhatsAppReason {
    NotAttempted,
    MissingPhone,
    ActionNotSupported,
    InvalidPhone,
    ConfigMissing,
    TemplateProviderError,
    ProviderError,
    FallbackTextSent,
}

impl WhatsAppReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            WhatsAppReason::NotAttempted => "not_attempted",
            WhatsAppReason::MissingPhone => "missing_phone",
            WhatsAppReason::ActionNotSupported => "action_not_supported",
            WhatsAppReason::InvalidPhone => "invalid_phone",
            WhatsAppReason::ConfigMissing => "config_missing",
            WhatsAppReason::TemplateProviderError => "template_provider_error",
            WhatsAppReason::ProviderError => "provider_error",
            WhatsAppReason::FallbackTextSent => "fallback_text_sent",
        }
    }
}

/// WhatsApp channel outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhatsAppResult {
    pub attempted: bool,
    pub sent: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<WhatsAppReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl WhatsAppResult {
    /// Channel skipped before any attempt.
    pub fn skipped(reason: WhatsAppReason) -> Self {
        Self {
            attempted: false,
            sent: false,
            reason: Some(reason),
            details: None,
        }
    }

    /// Attempted but not delivered.
    pub fn failed(reason: WhatsAppReason, details: Option<String>) -> Self {
        Self {
            attempted: true,
            sent: false,
            reason: Some(reason),
            details: details.map(|d| truncate_details(&d)),
        }
    }

    pub fn delivered(reason: Option<WhatsAppReason>) -> Self {
        Self {
            attempted: true,
            sent: true,
            reason,
            details: None,
        }
    }
}

/// Uniform outcome of one dispatch.
///
/// `ok` reports whether the dispatcher completed; delivery per channel is in
/// `email_sent` and `whatsapp.sent`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationResult {
    pub ok: bool,
    pub email_sent: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    pub whatsapp: WhatsAppResult,
    /// Set when the email failure is worth retrying.
    #[serde(skip)]
    pub email_transient: bool,
}

impl NotificationResult {
    /// Dispatch refused before any network call.
    pub fn rejected(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            email_sent: false,
            error: Some(error.into()),
            details: None,
            whatsapp: WhatsAppResult::skipped(WhatsAppReason::NotAttempted),
            email_transient: false,
        }
    }

    /// Whether the email channel failed transiently after a completed dispatch.
    pub fn email_retryable(&self) -> bool {
        self.ok && !self.email_sent && self.email_transient
    }
}

/// Truncates provider diagnostics to [`DETAILS_MAX_CHARS`] characters.
pub fn truncate_details(details: &str) -> String {
    let trimmed = details.trim();
    if trimmed.chars().count() <= DETAILS_MAX_CHARS {
        trimmed.to_string()
    } else {
        let mut out: String = trimmed.chars().take(DETAILS_MAX_CHARS).collect();
        out.push('…');
        out
    }
}
