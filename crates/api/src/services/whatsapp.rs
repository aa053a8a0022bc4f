//! WhatsApp Cloud API transport.

use crate::config::WhatsAppConfig;
use domain::services::{WhatsAppMessage, WhatsAppPayload, WhatsAppTransport, WhatsAppTransportError};
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

/// Sends template and free-text messages through the Cloud API `messages` endpoint.
#[derive(Debug, Clone)]
pub struct CloudApiWhatsAppTransport {
    client: Client,
    config: WhatsAppConfig,
}

impl CloudApiWhatsAppTransport {
    pub fn new(config: WhatsAppConfig) -> Result<Self, WhatsAppTransportError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| WhatsAppTransportError::Network(e.to_string()))?;

        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/{}/{}/messages",
            self.config.base_url.trim_end_matches('/'),
            self.config.api_version.trim(),
            self.config.phone_number_id.trim()
        )
    }
}

/// JSON body for one message.
pub fn message_body(message: &WhatsAppMessage) -> Value {
    match &message.payload {
        WhatsAppPayload::Template {
            name,
            language,
            parameters,
        } => {
            let parameters: Vec<Value> = parameters
                .iter()
                .map(|text| json!({ "type": "text", "text": text }))
                .collect();
            json!({
                "messaging_product": "whatsapp",
                "to": message.to,
                "type": "template",
                "template": {
                    "name": name,
                    "language": { "code": language },
                    "components": [{ "type": "body", "parameters": parameters }]
                }
            })
        }
        WhatsAppPayload::Text { body } => json!({
            "messaging_product": "whatsapp",
            "to": message.to,
            "type": "text",
            "text": { "preview_url": false, "body": body }
        }),
    }
}

#[async_trait::async_trait]
impl WhatsAppTransport for CloudApiWhatsAppTransport {
    fn is_configured(&self) -> bool {
        self.config.enabled
            && !self.config.access_token.trim().is_empty()
            && !self.config.phone_number_id.trim().is_empty()
    }

    async fn send(&self, message: &WhatsAppMessage) -> Result<(), WhatsAppTransportError> {
        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(self.config.access_token.trim())
            .json(&message_body(message))
            .send()
            .await
            .map_err(|e| WhatsAppTransportError::Network(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            debug!(template = message.is_template(), "WhatsApp message accepted");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(WhatsAppTransportError::Status {
            status: status.as_u16(),
            body,
        })
    }
}
