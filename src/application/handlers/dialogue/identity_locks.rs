//! IdentityLocks - One async mutex per identity.
//!
//! Turns for the same identity read, modify and write one state row, so they
//! must not overlap. Different identities never wait on each other.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::domain::foundation::Identity;

/// Registry of per-identity turn locks.
#[derive(Debug, Default)]
pub struct IdentityLocks {
    locks: Mutex<HashMap<Identity, Arc<AsyncMutex<()>>>>,
}

impl IdentityLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until no other turn for `identity` is running.
    ///
    /// The lock is released when the returned guard is dropped.
    pub async fn acquire(&self, identity: &Identity) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            // Entries nobody holds or waits on are only referenced by the map.
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            Arc::clone(locks.entry(identity.clone()).or_default())
        };
        lock.lock_owned().await
    }

    /// Number of identities with a turn running or queued.
    pub fn tracked(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .filter(|lock| Arc::strong_count(lock) > 1)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    fn identity(raw: &str) -> Identity {
        Identity::new(raw).unwrap()
    }

    #[tokio::test]
    async fn same_identity_waits_for_release() {
        let locks = Arc::new(IdentityLocks::new());
        let guard = locks.acquire(&identity("5491100000001")).await;

        let waiting = timeout(
            Duration::from_millis(30),
            locks.acquire(&identity("5491100000001")),
        )
        .await;
        assert!(waiting.is_err());

        drop(guard);
        let acquired = timeout(
            Duration::from_millis(100),
            locks.acquire(&identity("5491100000001")),
        )
        .await;
        assert!(acquired.is_ok());
    }

    #[tokio::test]
    async fn different_identities_do_not_block() {
        let locks = IdentityLocks::new();
        let _first = locks.acquire(&identity("5491100000001")).await;

        let second = timeout(
            Duration::from_millis(100),
            locks.acquire(&identity("5491100000002")),
        )
        .await;

        assert!(second.is_ok());
        assert_eq!(locks.tracked(), 2);
    }

    #[tokio::test]
    async fn released_locks_are_pruned() {
        let locks = IdentityLocks::new();
        drop(locks.acquire(&identity("5491100000001")).await);
        assert_eq!(locks.tracked(), 0);

        let _guard = locks.acquire(&identity("5491100000002")).await;
        assert_eq!(locks.locks.lock().unwrap().len(), 1);
    }
}
