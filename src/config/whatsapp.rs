//! WhatsApp Cloud API configuration

use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;

use super::error::{ensure_url, ValidationError};

/// WhatsApp Cloud API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct WhatsAppSettings {
    /// Token Meta echoes in the subscription handshake
    pub verify_token: Secret<String>,

    /// Sending phone number id
    pub phone_number_id: String,

    /// Graph API bearer token
    pub access_token: Secret<String>,

    /// App secret for `X-Hub-Signature-256`; unsigned webhooks are accepted when unset
    pub app_secret: Option<Secret<String>>,

    #[serde(default = "default_graph_api_base")]
    pub graph_api_base: String,

    #[serde(default = "default_graph_api_version")]
    pub graph_api_version: String,
}

impl WhatsAppSettings {
    /// Validate WhatsApp configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.verify_token.expose_secret().is_empty() {
            return Err(ValidationError::MissingRequired("WHATSAPP__VERIFY_TOKEN"));
        }
        if self.phone_number_id.trim().is_empty() {
            return Err(ValidationError::MissingRequired("WHATSAPP__PHONE_NUMBER_ID"));
        }
        if self.access_token.expose_secret().is_empty() {
            return Err(ValidationError::MissingRequired("WHATSAPP__ACCESS_TOKEN"));
        }
        ensure_url(
            "WHATSAPP__GRAPH_API_BASE",
            "whatsapp.graph_api_base",
            &self.graph_api_base,
            &["https", "http"],
        )?;
        Ok(())
    }

    /// Whether webhook signatures are checked
    pub fn verifies_signatures(&self) -> bool {
        self.app_secret
            .as_ref()
            .is_some_and(|s| !s.expose_secret().is_empty())
    }
}

fn default_graph_api_base() -> String {
    "https://graph.facebook.com".to_string()
}

fn default_graph_api_version() -> String {
    "v23.0".to_string()
}
