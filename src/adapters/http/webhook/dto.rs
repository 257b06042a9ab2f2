//! HTTP DTOs for the WhatsApp webhook.
//!
//! Only the fields the assistant reads are modelled; everything else in
//! Meta's payload is ignored.

use serde::{Deserialize, Serialize};

// ════════════════════════════════════════════════════════════════════════════════
// Verification handshake
// ════════════════════════════════════════════════════════════════════════════════

/// Query of `GET /webhook`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VerifyQuery {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

// ════════════════════════════════════════════════════════════════════════════════
// Notification payload
// ════════════════════════════════════════════════════════════════════════════════

/// Body of `POST /webhook`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub entry: Vec<WebhookEntry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookEntry {
    #[serde(default)]
    pub changes: Vec<WebhookChange>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookChange {
    #[serde(default)]
    pub value: WebhookValue,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookValue {
    #[serde(default)]
    pub messages: Vec<WebhookMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookMessage {
    pub from: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub text: Option<WebhookText>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookText {
    #[serde(default)]
    pub body: String,
}

/// The one message a notification is about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundText {
    pub from: String,
    /// Empty for non-text messages.
    pub body: String,
}

impl WebhookPayload {
    /// `entry[0].changes[0].value.messages[0]`, when it has a sender.
    ///
    /// Status callbacks carry no messages and yield `None`.
    pub fn first_message(&self) -> Option<InboundText> {
        let message = self
            .entry
            .first()?
            .changes
            .first()?
            .value
            .messages
            .first()?;
        let from = message.from.as_deref().map(str::trim).filter(|f| !f.is_empty())?;

        Some(InboundText {
            from: from.to_string(),
            body: message
                .text
                .as_ref()
                .map(|t| t.body.clone())
                .unwrap_or_default(),
        })
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Response DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// Body of `GET /health`.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

impl HealthResponse {
    pub fn ok() -> Self {
        Self {
            status: "ok",
            version: env!("CARGO_PKG_VERSION"),
        }
    }
}
