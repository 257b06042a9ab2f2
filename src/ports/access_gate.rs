//! Access gate port - calendar authorization pre-check.
//!
//! Runs before a message reaches the dialogue. The dialogue itself assumes
//! access was granted.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::Secret;

use crate::domain::foundation::Identity;

/// Why a consent link must be sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsentReason {
    /// The identity never connected a calendar.
    NoCredentials,
    /// Stored credentials can no longer be refreshed.
    ReconsentRequired,
}

impl ConsentReason {
    /// Whether the consent screen must be shown again.
    pub fn force_consent(&self) -> bool {
        matches!(self, ConsentReason::ReconsentRequired)
    }

    /// Whether the account chooser must be shown.
    pub fn select_account(&self) -> bool {
        false
    }
}

/// Outcome of an access check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    Granted,
    SendConsentLink { reason: ConsentReason },
    /// Credentials exist but are being refreshed or the provider failed.
    RetryLater,
}

#[derive(Debug, thiserror::Error)]
pub enum AccessError {
    #[error("No calendar credentials for {0}")]
    NoCredentials(Identity),

    #[error("Access token for {0} has expired")]
    Expired(Identity),

    #[error("Database error: {0}")]
    Database(String),
}

/// Port deciding whether an identity may use the calendar right now.
#[async_trait]
pub trait AccessGate: Send + Sync {
    /// # Errors
    /// Returns `AccessError` when the credential store cannot be read;
    /// callers treat this like `RetryLater`
    async fn check(&self, identity: &Identity, now: DateTime<Utc>)
        -> Result<AccessDecision, AccessError>;
}

/// Port handing out a usable access token for calendar API calls.
#[async_trait]
pub trait AccessTokenSource: Send + Sync {
    async fn access_token(&self, identity: &Identity) -> Result<Secret<String>, AccessError>;
}
