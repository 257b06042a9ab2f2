//! In-memory link cooldown for testing and development.
//!
//! Not shared between processes.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::domain::foundation::Identity;
use crate::ports::{CooldownError, LinkCooldown};

/// Expiring map from identity to the end of its cooldown window.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLinkCooldown {
    windows: Arc<Mutex<HashMap<Identity, Instant>>>,
    unavailable: bool,
}

impl InMemoryLinkCooldown {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every call fail, for fail-open tests.
    pub fn unavailable(mut self) -> Self {
        self.unavailable = true;
        self
    }

    /// Number of windows still open.
    pub async fn active_count(&self) -> usize {
        let now = Instant::now();
        self.windows
            .lock()
            .await
            .values()
            .filter(|until| **until > now)
            .count()
    }
}

#[async_trait]
impl LinkCooldown for InMemoryLinkCooldown {
    async fn try_acquire(&self, identity: &Identity, ttl: Duration) -> Result<bool, CooldownError> {
        if self.unavailable {
            return Err(CooldownError::Unavailable("in-memory cooldown disabled".to_string()));
        }

        let now = Instant::now();
        let mut windows = self.windows.lock().await;
        windows.retain(|_, until| *until > now);

        if windows.contains_key(identity) {
            return Ok(false);
        }
        windows.insert(identity.clone(), now + ttl);
        Ok(true)
    }
}
