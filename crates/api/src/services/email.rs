//! Email transports.
//!
//! Supports two providers:
//! - `console`: Logs emails (development, or when email is disabled)
//! - `webhook`: Posts the rendered message to an HTTP relay

use crate::config::EmailConfig;
use domain::services::{EmailMessage, EmailTransport, EmailTransportError};
use reqwest::Client;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

/// Logs messages instead of delivering them.
#[derive(Debug, Default, Clone)]
pub struct ConsoleEmailTransport;

#[async_trait::async_trait]
impl EmailTransport for ConsoleEmailTransport {
    async fn send(&self, message: &EmailMessage) -> Result<(), EmailTransportError> {
        info!(
            to = %message.to,
            subject = %message.subject,
            action = %message.action,
            "Email (console provider)"
        );
        debug!(html = %message.html, "Email body");
        Ok(())
    }
}

#[derive(Serialize)]
struct WebhookBody<'a> {
    #[serde(flatten)]
    message: &'a EmailMessage,
    #[serde(skip_serializing_if = "Option::is_none")]
    token: Option<&'a str>,
}

/// Posts each message as JSON to a relay that performs the actual delivery.
#[derive(Debug, Clone)]
pub struct WebhookEmailTransport {
    client: Client,
    url: String,
    token: Option<String>,
}

impl WebhookEmailTransport {
    pub fn new(url: &str, token: &str, timeout_ms: u64) -> Result<Self, EmailTransportError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .map_err(|e| EmailTransportError::Network(e.to_string()))?;

        Ok(Self {
            client,
            url: url.to_string(),
            token: Some(token.trim().to_string()).filter(|t| !t.is_empty()),
        })
    }
}

#[async_trait::async_trait]
impl EmailTransport for WebhookEmailTransport {
    async fn send(&self, message: &EmailMessage) -> Result<(), EmailTransportError> {
        let body = WebhookBody {
            message,
            token: self.token.as_deref(),
        };

        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| EmailTransportError::Network(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            debug!(to = %message.to, action = %message.action, "Email relayed");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(EmailTransportError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

/// Transport that refuses every message; used when the provider is misconfigured.
#[derive(Debug, Default, Clone)]
pub struct UnconfiguredEmailTransport;

#[async_trait::async_trait]
impl EmailTransport for UnconfiguredEmailTransport {
    async fn send(&self, _message: &EmailMessage) -> Result<(), EmailTransportError> {
        Err(EmailTransportError::NotConfigured)
    }
}

/// Builds the transport selected by `config.provider`.
pub fn build_email_transport(config: &EmailConfig) -> Arc<dyn EmailTransport> {
    if !config.enabled {
        debug!("Email disabled, using console provider");
        return Arc::new(ConsoleEmailTransport);
    }

    match config.provider.as_str() {
        "console" => Arc::new(ConsoleEmailTransport),
        "webhook" if !config.webhook_url.trim().is_empty() => {
            match WebhookEmailTransport::new(
                config.webhook_url.trim(),
                &config.webhook_token,
                config.timeout_ms,
            ) {
                Ok(transport) => Arc::new(transport),
                Err(e) => {
                    error!(error = %e, "Failed to build email webhook client");
                    Arc::new(UnconfiguredEmailTransport)
                }
            }
        }
        provider => {
            error!(provider = %provider, "Email provider not configured");
            Arc::new(UnconfiguredEmailTransport)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn message() -> EmailMessage {
        EmailMessage {
            to: "maria@example.com".to_string(),
            participant_name: "Maria".to_string(),
            subject: "Pagamento confirmado - Retiro".to_string(),
            html: "<p>ok</p>".to_string(),
            action: "payment_confirmed".to_string(),
            retreat_name: "Retiro".to_string(),
        }
    }

    #[tokio::test]
    async fn test_webhook_posts_message_with_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/send"))
            .and(body_json(json!({
                "to": "maria@example.com",
                "participantName": "Maria",
                "subject": "Pagamento confirmado - Retiro",
                "html": "<p>ok</p>",
                "action": "payment_confirmed",
                "retreatName": "Retiro",
                "token": "relay-secret"
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let transport =
            WebhookEmailTransport::new(&format!("{}/send", server.uri()), "relay-secret", 2000)
                .unwrap();
        transport.send(&message()).await.unwrap();
    }

    #[tokio::test]
    async fn test_webhook_omits_empty_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/send"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let transport =
            WebhookEmailTransport::new(&format!("{}/send", server.uri()), "  ", 2000).unwrap();
        transport.send(&message()).await.unwrap();

        let requests = server.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert!(body.get("token").is_none());
    }

    #[tokio::test]
    async fn test_webhook_error_status_keeps_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(422).set_body_string("domain not verified"))
            .mount(&server)
            .await;

        let transport = WebhookEmailTransport::new(&server.uri(), "", 2000).unwrap();
        let err = transport.send(&message()).await.unwrap_err();
        assert_eq!(
            err,
            EmailTransportError::Status {
                status: 422,
                body: "domain not verified".to_string()
            }
        );
        assert_eq!(err.details(), "domain not verified");
    }

    #[tokio::test]
    async fn test_build_transport_without_url_refuses() {
        let config = EmailConfig {
            enabled: true,
            provider: "webhook".to_string(),
            ..EmailConfig::default()
        };
        let transport = build_email_transport(&config);
        assert_eq!(
            transport.send(&message()).await.unwrap_err(),
            EmailTransportError::NotConfigured
        );
    }

    #[tokio::test]
    async fn test_disabled_email_logs_only() {
        let transport = build_email_transport(&EmailConfig::default());
        assert!(transport.send(&message()).await.is_ok());
    }
}
