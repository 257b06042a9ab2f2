//! WhatsApp Cloud API sender.
//!
//! Sends plain text through `POST {base}/{version}/{phone_number_id}/messages`.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, Secret};
use serde::Serialize;
use std::time::Duration;

use crate::domain::foundation::Identity;
use crate::ports::{MessageSender, SendError};

/// Longest body the Cloud API accepts for a text message.
const MAX_BODY_CHARS: usize = 4096;

/// Configuration for the Cloud API sender.
#[derive(Debug, Clone)]
pub struct WhatsAppConfig {
    access_token: Secret<String>,
    pub phone_number_id: String,
    pub graph_api_base: String,
    pub graph_api_version: String,
    pub timeout: Duration,
}

impl WhatsAppConfig {
    pub fn new(access_token: Secret<String>, phone_number_id: impl Into<String>) -> Self {
        Self {
            access_token,
            phone_number_id: phone_number_id.into(),
            graph_api_base: "https://graph.facebook.com".to_string(),
            graph_api_version: "v23.0".to_string(),
            timeout: Duration::from_secs(15),
        }
    }

    pub fn with_graph_api_base(mut self, base: impl Into<String>) -> Self {
        self.graph_api_base = base.into();
        self
    }

    pub fn with_graph_api_version(mut self, version: impl Into<String>) -> Self {
        self.graph_api_version = version.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/{}/{}/messages",
            self.graph_api_base.trim_end_matches('/'),
            self.graph_api_version.trim_matches('/'),
            self.phone_number_id
        )
    }
}

/// Sender backed by the WhatsApp Cloud API.
pub struct WhatsAppCloudSender {
    config: WhatsAppConfig,
    client: Client,
}

impl WhatsAppCloudSender {
    /// # Errors
    /// Returns `SendError::Network` if the HTTP client cannot be built
    pub fn new(config: WhatsAppConfig) -> Result<Self, SendError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| SendError::Network(e.to_string()))?;
        Ok(Self { config, client })
    }
}

#[derive(Debug, Serialize)]
struct TextMessage<'a> {
    messaging_product: &'static str,
    to: String,
    #[serde(rename = "type")]
    kind: &'static str,
    text: TextBody<'a>,
}

#[derive(Debug, Serialize)]
struct TextBody<'a> {
    preview_url: bool,
    body: &'a str,
}

impl<'a> TextMessage<'a> {
    fn new(to: &Identity, body: &'a str) -> Self {
        Self {
            messaging_product: "whatsapp",
            to: normalize_recipient(to),
            kind: "text",
            text: TextBody {
                preview_url: true,
                body: truncate(body, MAX_BODY_CHARS),
            },
        }
    }
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

/// Recipient in the form the Cloud API delivers to.
///
/// Buenos Aires mobiles arrive as `54 9 11 XXXXXXXX` but are only reachable
/// as `+54 11 15 XXXXXXXX`; everything else is `+<digits>`.
pub fn normalize_recipient(identity: &Identity) -> String {
    let digits = identity.as_str();
    match digits.strip_prefix("54911") {
        Some(rest) => format!("+541115{}", rest),
        None => format!("+{}", digits),
    }
}

#[async_trait]
impl MessageSender for WhatsAppCloudSender {
    async fn send_text(&self, to: &Identity, body: &str) -> Result<(), SendError> {
        let message = TextMessage::new(to, body);
        let response = self
            .client
            .post(self.config.messages_url())
            .bearer_auth(self.config.access_token.expose_secret())
            .json(&message)
            .send()
            .await
            .map_err(|e| SendError::Network(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            tracing::debug!(to = %message.to, "WhatsApp message accepted");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(SendError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}
