//! Link Cooldown Port - shared anti-spam window for consent links.
//!
//! Backed by an expiring key so every instance of the service sees the same
//! window.

use async_trait::async_trait;
use std::time::Duration;

use crate::domain::foundation::Identity;

#[derive(Debug, Clone, thiserror::Error)]
pub enum CooldownError {
    #[error("Cooldown store unavailable: {0}")]
    Unavailable(String),
}

/// Port for the consent-link cooldown.
#[async_trait]
pub trait LinkCooldown: Send + Sync {
    /// Atomically starts a cooldown window for `identity`.
    ///
    /// # Returns
    /// `true` if no window was active (the caller may send the link),
    /// `false` if a link was already sent within `ttl`
    async fn try_acquire(&self, identity: &Identity, ttl: Duration) -> Result<bool, CooldownError>;
}
