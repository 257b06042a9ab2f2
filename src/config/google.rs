//! Google Calendar configuration

use serde::Deserialize;

use super::error::{ensure_url, ValidationError};

/// Google Calendar configuration
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleConfig {
    #[serde(default = "default_calendar_api_base")]
    pub calendar_api_base: String,

    #[serde(default = "default_calendar_id")]
    pub calendar_id: String,

    /// Path of the OAuth start endpoint, appended to the public base URL
    #[serde(default = "default_consent_path")]
    pub consent_path: String,
}

impl GoogleConfig {
    /// Validate Google configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        ensure_url(
            "GOOGLE__CALENDAR_API_BASE",
            "google.calendar_api_base",
            &self.calendar_api_base,
            &["https", "http"],
        )?;
        if self.calendar_id.trim().is_empty() {
            return Err(ValidationError::MissingRequired("GOOGLE__CALENDAR_ID"));
        }
        if !self.consent_path.starts_with('/') {
            return Err(ValidationError::InvalidUrl("google.consent_path"));
        }
        Ok(())
    }
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            calendar_api_base: default_calendar_api_base(),
            calendar_id: default_calendar_id(),
            consent_path: default_consent_path(),
        }
    }
}

fn default_calendar_api_base() -> String {
    "https://www.googleapis.com/calendar/v3".to_string()
}

fn default_calendar_id() -> String {
    "primary".to_string()
}

fn default_consent_path() -> String {
    "/auth/google/start".to_string()
}
