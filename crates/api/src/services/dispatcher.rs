//! Notification dispatcher.
//!
//! Renders a lifecycle notification and delivers it over email, then
//! WhatsApp. Each invocation makes at most one call per channel and never
//! fails: channel problems are reported in the returned [`NotificationResult`].

use domain::models::notification::truncate_details;
use domain::models::{
    NotificationAction, NotificationRequest, NotificationResult, WhatsAppReason, WhatsAppResult,
};
use domain::services::{
    EmailMessage, EmailTransport, EmailTransportError, WhatsAppMessage, WhatsAppPayload,
    WhatsAppTransport,
};
use metrics::counter;
use shared::validation::{is_plausible_email, normalize_whatsapp_phone};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::{EmailConfig, WhatsAppConfig};
use crate::services::templates::{
    render_participant_email, whatsapp_template_parameters, whatsapp_text, Branding,
};

/// Error code reported when the recipient address fails the syntax check.
pub const INVALID_RECIPIENT: &str = "invalid_recipient_email";

/// Error code reported when the email provider did not accept the message.
pub const EMAIL_SEND_FAILED: &str = "email_send_failed";

/// Template names and language used for WhatsApp structured messages.
#[derive(Debug, Clone, Default)]
pub struct WhatsAppTemplates {
    pub payment_link: Option<String>,
    pub payment_confirmed: Option<String>,
    pub language: String,
}

impl WhatsAppTemplates {
    pub fn from_config(config: &WhatsAppConfig) -> Self {
        let name = |s: &str| Some(s.trim().to_string()).filter(|s| !s.is_empty());
        Self {
            payment_link: name(&config.payment_link_template),
            payment_confirmed: name(&config.payment_confirmed_template),
            language: config.template_language.clone(),
        }
    }

    fn for_action(&self, action: NotificationAction) -> Option<&str> {
        match action {
            NotificationAction::PaymentLink => self.payment_link.as_deref(),
            NotificationAction::PaymentConfirmed => self.payment_confirmed.as_deref(),
            NotificationAction::RegistrationConfirmation => None,
        }
    }
}

/// Sends participant notifications and admin emails.
#[derive(Clone)]
pub struct NotificationDispatcher {
    email: Arc<dyn EmailTransport>,
    whatsapp: Arc<dyn WhatsAppTransport>,
    branding: Branding,
    templates: WhatsAppTemplates,
}

impl NotificationDispatcher {
    pub fn new(
        email: Arc<dyn EmailTransport>,
        whatsapp: Arc<dyn WhatsAppTransport>,
        branding: Branding,
        templates: WhatsAppTemplates,
    ) -> Self {
        Self {
            email,
            whatsapp,
            branding,
            templates,
        }
    }

    pub fn from_config(
        email: Arc<dyn EmailTransport>,
        whatsapp: Arc<dyn WhatsAppTransport>,
        email_config: &EmailConfig,
        whatsapp_config: &WhatsAppConfig,
    ) -> Self {
        Self::new(
            email,
            whatsapp,
            Branding::new(&email_config.brand_name, &email_config.logo_url),
            WhatsAppTemplates::from_config(whatsapp_config),
        )
    }

    /// Delivers `request` over both channels.
    pub async fn dispatch(&self, request: &NotificationRequest) -> NotificationResult {
        let action = request.action;

        if !is_plausible_email(&request.to) {
            warn!(action = %action, "Notification rejected: invalid recipient email");
            record(action, "email", "rejected");
            return NotificationResult::rejected(INVALID_RECIPIENT);
        }

        let content = render_participant_email(request, &self.branding);
        let message = EmailMessage {
            to: request.to.trim().to_string(),
            participant_name: request.participant_name.clone(),
            subject: content.subject,
            html: content.html,
            action: action.as_str().to_string(),
            retreat_name: request.retreat_name.clone(),
        };

        let email_outcome = self.email.send(&message).await;
        record(
            action,
            "email",
            if email_outcome.is_ok() { "sent" } else { "failed" },
        );

        let whatsapp = self.send_whatsapp(request).await;
        record(action, "whatsapp", whatsapp_outcome(&whatsapp));

        info!(
            action = %action,
            email_sent = email_outcome.is_ok(),
            whatsapp_sent = whatsapp.sent,
            whatsapp_reason = whatsapp.reason.map(|r| r.as_str()).unwrap_or("none"),
            "Notification dispatched"
        );

        match email_outcome {
            Ok(()) => NotificationResult {
                ok: true,
                email_sent: true,
                error: None,
                details: None,
                whatsapp,
                email_transient: false,
            },
            Err(e) => {
                warn!(action = %action, error = %e, "Email delivery failed");
                NotificationResult {
                    ok: true,
                    email_sent: false,
                    error: Some(EMAIL_SEND_FAILED.to_string()),
                    details: Some(truncate_details(&e.details())),
                    whatsapp,
                    email_transient: e.is_transient(),
                }
            }
        }
    }

    /// Sends an already rendered email outside the participant flow.
    pub async fn send_admin_email(&self, message: &EmailMessage) -> Result<(), EmailTransportError> {
        let outcome = self.email.send(message).await;
        counter!(
            "notifications_total",
            "action" => message.action.clone(),
            "channel" => "email",
            "outcome" => if outcome.is_ok() { "sent" } else { "failed" }
        )
        .increment(1);
        outcome
    }

    async fn send_whatsapp(&self, request: &NotificationRequest) -> WhatsAppResult {
        let Some(raw_phone) = request.phone.as_deref().filter(|p| !p.trim().is_empty()) else {
            return WhatsAppResult::skipped(WhatsAppReason::MissingPhone);
        };

        if !request.action.has_whatsapp_message() {
            return WhatsAppResult::skipped(WhatsAppReason::ActionNotSupported);
        }

        let Some(to) = normalize_whatsapp_phone(raw_phone) else {
            return WhatsAppResult::failed(WhatsAppReason::InvalidPhone, None);
        };

        if !self.whatsapp.is_configured() {
            return WhatsAppResult::failed(WhatsAppReason::ConfigMissing, None);
        }

        if let Some(template) = self.templates.for_action(request.action) {
            let message = WhatsAppMessage {
                to,
                payload: WhatsAppPayload::Template {
                    name: template.to_string(),
                    language: self.templates.language.clone(),
                    parameters: whatsapp_template_parameters(request),
                },
            };
            return match self.whatsapp.send(&message).await {
                Ok(()) => WhatsAppResult::delivered(None),
                Err(e) => WhatsAppResult::failed(
                    WhatsAppReason::TemplateProviderError,
                    Some(e.details()),
                ),
            };
        }

        let Some(body) = whatsapp_text(request) else {
            return WhatsAppResult::skipped(WhatsAppReason::ActionNotSupported);
        };
        let message = WhatsAppMessage {
            to,
            payload: WhatsAppPayload::Text { body },
        };
        match self.whatsapp.send(&message).await {
            Ok(()) => WhatsAppResult::delivered(Some(WhatsAppReason::FallbackTextSent)),
            Err(e) => WhatsAppResult::failed(WhatsAppReason::ProviderError, Some(e.details())),
        }
    }
}

fn whatsapp_outcome(result: &WhatsAppResult) -> &'static str {
    match (result.attempted, result.sent) {
        (_, true) => "sent",
        (true, false) => "failed",
        (false, false) => "skipped",
    }
}

fn record(action: NotificationAction, channel: &'static str, outcome: &'static str) {
    counter!(
        "notifications_total",
        "action" => action.as_str(),
        "channel" => channel,
        "outcome" => outcome
    )
    .increment(1);
}
