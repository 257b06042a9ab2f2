//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// A loaded setting the assistant cannot start with
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Missing required setting {0}")]
    MissingRequired(&'static str),

    #[error("{field} must be between {min} and {max}")]
    OutOfRange {
        field: &'static str,
        min: u64,
        max: u64,
    },

    #[error("Cannot bind to {0}")]
    InvalidBindAddress(String),

    #[error("{0} is not a valid URL")]
    InvalidUrl(&'static str),

    #[error("{field} must use one of the schemes: {expected}")]
    UnsupportedScheme {
        field: &'static str,
        expected: String,
    },

    #[error("database.min_connections exceeds database.max_connections")]
    InvalidPoolSize,

    #[error("Unknown IANA timezone: {0}")]
    InvalidTimezone(String),

    #[error("server.public_base_url must use https in production")]
    PublicUrlMustBeHttps,

    #[error("server.request_timeout_secs ({request}) is below the {turn}s a turn may take")]
    RequestTimeoutBelowTurnBudget { request: u64, turn: u64 },
}

/// Checks `min <= value <= max`.
pub(super) fn ensure_range(
    field: &'static str,
    value: u64,
    min: u64,
    max: u64,
) -> Result<(), ValidationError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ValidationError::OutOfRange { field, min, max })
    }
}

/// Parses `raw` and checks its scheme against `schemes`.
///
/// `setting` is the environment key reported when `raw` is empty.
pub(super) fn ensure_url(
    setting: &'static str,
    field: &'static str,
    raw: &str,
    schemes: &[&str],
) -> Result<url::Url, ValidationError> {
    if raw.trim().is_empty() {
        return Err(ValidationError::MissingRequired(setting));
    }
    let url = url::Url::parse(raw).map_err(|_| ValidationError::InvalidUrl(field))?;
    if schemes.contains(&url.scheme()) {
        Ok(url)
    } else {
        Err(ValidationError::UnsupportedScheme {
            field,
            expected: schemes.join(", "),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_is_inclusive() {
        assert!(ensure_range("x", 1, 1, 9).is_ok());
        assert!(ensure_range("x", 9, 1, 9).is_ok());
        assert_eq!(
            ensure_range("x", 10, 1, 9),
            Err(ValidationError::OutOfRange {
                field: "x",
                min: 1,
                max: 9
            })
        );
    }

    #[test]
    fn url_checks_presence_then_syntax_then_scheme() {
        const HTTP: &[&str] = &["http", "https"];
        assert_eq!(
            ensure_url("GOOGLE__CALENDAR_API_BASE", "google.calendar_api_base", " ", HTTP),
            Err(ValidationError::MissingRequired("GOOGLE__CALENDAR_API_BASE"))
        );
        assert_eq!(
            ensure_url("GOOGLE__CALENDAR_API_BASE", "google.calendar_api_base", "nope", HTTP),
            Err(ValidationError::InvalidUrl("google.calendar_api_base"))
        );
        assert_eq!(
            ensure_url("GOOGLE__CALENDAR_API_BASE", "google.calendar_api_base", "ftp://x", HTTP),
            Err(ValidationError::UnsupportedScheme {
                field: "google.calendar_api_base",
                expected: "http, https".to_string()
            })
        );
    }
}
