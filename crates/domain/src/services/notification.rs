//! Notification transport contracts.
//!
//! The dispatcher renders messages and hands them to an [`EmailTransport`] and
//! a [`WhatsAppTransport`]. Concrete HTTP providers live in the API crate; the
//! mock transports here record what they were asked to send.

use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use thiserror::Error;

/// A rendered email handed to the email provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailMessage {
    pub to: String,
    pub participant_name: String,
    pub subject: String,
    pub html: String,
    /// Action tag forwarded to the provider, e.g. `payment_link` or `admin_account_approval`.
    pub action: String,
    pub retreat_name: String,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EmailTransportError {
    #[error("email provider returned HTTP {status}")]
    Status { status: u16, body: String },

    #[error("email provider unreachable: {0}")]
    Network(String),

    #[error("email provider not configured")]
    NotConfigured,
}

impl EmailTransportError {
    /// Provider diagnostics suitable for the `details` field of a result.
    pub fn details(&self) -> String {
        match self {
            EmailTransportError::Status { body, .. } if !body.trim().is_empty() => body.clone(),
            other => other.to_string(),
        }
    }

    /// Network failures and 5xx responses; anything else will fail again.
    pub fn is_transient(&self) -> bool {
        match self {
            EmailTransportError::Network(_) => true,
            EmailTransportError::Status { status, .. } => *status >= 500,
            EmailTransportError::NotConfigured => false,
        }
    }
}

/// Delivers rendered emails.
#[async_trait::async_trait]
pub trait EmailTransport: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<(), EmailTransportError>;
}

/// WhatsApp message body: a pre-approved template or free text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WhatsAppPayload {
    Template {
        name: String,
        language: String,
        parameters: Vec<String>,
    },
    Text {
        body: String,
    },
}

/// A WhatsApp message addressed to an international digit string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WhatsAppMessage {
    pub to: String,
    pub payload: WhatsAppPayload,
}

impl WhatsAppMessage {
    pub fn is_template(&self) -> bool {
        matches!(self.payload, WhatsAppPayload::Template { .. })
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WhatsAppTransportError {
    #[error("whatsapp provider returned HTTP {status}")]
    Status { status: u16, body: String },

    #[error("whatsapp provider unreachable: {0}")]
    Network(String),
}

impl WhatsAppTransportError {
    pub fn details(&self) -> String {
        match self {
            WhatsAppTransportError::Status { body, .. } if !body.trim().is_empty() => body.clone(),
            other => other.to_string(),
        }
    }
}

/// Delivers WhatsApp messages.
#[async_trait::async_trait]
pub trait WhatsAppTransport: Send + Sync {
    /// Whether credentials (access token and sender id) are present.
    fn is_configured(&self) -> bool;

    async fn send(&self, message: &WhatsAppMessage) -> Result<(), WhatsAppTransportError>;
}

/// Mock email transport for development and testing.
///
/// Records every attempted message. Failures can be simulated for all calls or
/// for the first `n` calls.
#[derive(Debug, Default)]
pub struct MockEmailTransport {
    fail_always: bool,
    reject_status: Option<u16>,
    failures_remaining: AtomicUsize,
    attempts: AtomicUsize,
    sent: Mutex<Vec<EmailMessage>>,
}

impl MockEmailTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// A transport whose every call returns HTTP 500.
    pub fn failing() -> Self {
        Self {
            fail_always: true,
            ..Self::default()
        }
    }

    /// A transport whose every call is refused with `status`.
    pub fn rejecting(status: u16) -> Self {
        Self {
            fail_always: true,
            reject_status: Some(status),
            ..Self::default()
        }
    }

    /// A transport whose first `n` calls return HTTP 500.
    pub fn failing_times(n: usize) -> Self {
        Self {
            failures_remaining: AtomicUsize::new(n),
            ..Self::default()
        }
    }

    /// Number of send calls, failed or not.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Messages that were delivered.
    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    fn should_fail(&self) -> bool {
        if self.fail_always {
            return true;
        }
        self.failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait::async_trait]
impl EmailTransport for MockEmailTransport {
    async fn send(&self, message: &EmailMessage) -> Result<(), EmailTransportError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        if self.should_fail() {
            tracing::warn!(
                to = %message.to,
                action = %message.action,
                "Mock email transport simulating failure"
            );
            return Err(EmailTransportError::Status {
                status: self.reject_status.unwrap_or(500),
                body: "Simulated failure".to_string(),
            });
        }

        tracing::info!(
            to = %message.to,
            action = %message.action,
            subject = %message.subject,
            "Mock: Would send email"
        );

        if let Ok(mut sent) = self.sent.lock() {
            sent.push(message.clone());
        }
        Ok(())
    }
}

/// Mock WhatsApp transport for development and testing.
#[derive(Debug)]
pub struct MockWhatsAppTransport {
    configured: bool,
    simulate_failure: bool,
    attempts: AtomicUsize,
    sent: Mutex<Vec<WhatsAppMessage>>,
}

impl Default for MockWhatsAppTransport {
    fn default() -> Self {
        Self {
            configured: true,
            simulate_failure: false,
            attempts: AtomicUsize::new(0),
            sent: Mutex::new(Vec::new()),
        }
    }
}

impl MockWhatsAppTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// A transport that reports missing credentials.
    pub fn unconfigured() -> Self {
        Self {
            configured: false,
            ..Self::default()
        }
    }

    /// A transport whose every call returns HTTP 400.
    pub fn failing() -> Self {
        Self {
            simulate_failure: true,
            ..Self::default()
        }
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<WhatsAppMessage> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl WhatsAppTransport for MockWhatsAppTransport {
    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn send(&self, message: &WhatsAppMessage) -> Result<(), WhatsAppTransportError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        if self.simulate_failure {
            tracing::warn!(to = %message.to, "Mock WhatsApp transport simulating failure");
            return Err(WhatsAppTransportError::Status {
                status: 400,
                body: r#"{"error":{"message":"Simulated failure"}}"#.to_string(),
            });
        }

        tracing::info!(
            to = %message.to,
            template = message.is_template(),
            "Mock: Would send WhatsApp message"
        );

        if let Ok(mut sent) = self.sent.lock() {
            sent.push(message.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message() -> EmailMessage {
        EmailMessage {
            to: "maria@example.com".to_string(),
            participant_name: "Maria".to_string(),
            subject: "Inscrição recebida - Retiro".to_string(),
            html: "<p>ok</p>".to_string(),
            action: "registration_confirmation".to_string(),
            retreat_name: "Retiro".to_string(),
        }
    }

    #[tokio::test]
    async fn test_mock_email_records_message() {
        let transport = MockEmailTransport::new();
        transport.send(&message()).await.unwrap();

        assert_eq!(transport.attempts(), 1);
        assert_eq!(transport.sent(), vec![message()]);
    }

    #[tokio::test]
    async fn test_email_error_transience() {
        let rejected = MockEmailTransport::rejecting(422)
            .send(&message())
            .await
            .unwrap_err();
        assert!(!rejected.is_transient());
        assert!(!EmailTransportError::NotConfigured.is_transient());
        assert!(EmailTransportError::Network("reset".to_string()).is_transient());

        let failed = MockEmailTransport::failing().send(&message()).await.unwrap_err();
        assert!(failed.is_transient());
    }

    #[tokio::test]
    async fn test_mock_email_failing_times() {
        let transport = MockEmailTransport::failing_times(2);

        assert!(transport.send(&message()).await.is_err());
        assert!(transport.send(&message()).await.is_err());
        assert!(transport.send(&message()).await.is_ok());
        assert_eq!(transport.attempts(), 3);
        assert_eq!(transport.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_mock_email_failing() {
        let transport = MockEmailTransport::failing();
        for _ in 0..4 {
            assert!(matches!(
                transport.send(&message()).await,
                Err(EmailTransportError::Status { status: 500, .. })
            ));
        }
        assert!(transport.sent().is_empty());
    }

    #[tokio::test]
    async fn test_mock_whatsapp() {
        let transport = MockWhatsAppTransport::new();
        assert!(transport.is_configured());
        assert!(!MockWhatsAppTransport::unconfigured().is_configured());

        let msg = WhatsAppMessage {
            to: "5511987654321".to_string(),
            payload: WhatsAppPayload::Text {
                body: "Paz!".to_string(),
            },
        };
        transport.send(&msg).await.unwrap();
        assert_eq!(transport.sent(), vec![msg.clone()]);

        let failing = MockWhatsAppTransport::failing();
        let err = failing.send(&msg).await.unwrap_err();
        assert!(err.details().contains("Simulated failure"));
    }

    #[test]
    fn test_error_details_prefers_body() {
        let err = EmailTransportError::Status {
            status: 502,
            body: "quota exceeded".to_string(),
        };
        assert_eq!(err.details(), "quota exceeded");
        assert_eq!(
            EmailTransportError::Status {
                status: 500,
                body: String::new()
            }
            .details(),
            "email provider returned HTTP 500"
        );
    }
}
