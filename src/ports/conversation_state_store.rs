//! Conversation State Store Port - Durable per-identity dialogue memory.
//!
//! One row per identity, never deleted. Saves are guarded by an optimistic
//! `version` so two processes handling the same identity cannot silently
//! overwrite each other.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::dialogue::ConversationState;
use crate::domain::foundation::Identity;

/// Errors that can occur during state store operations
#[derive(Debug, thiserror::Error)]
pub enum StateStoreError {
    #[error("Stale write for {identity}: stored version is no longer {expected}")]
    VersionConflict { identity: Identity, expected: i64 },

    #[error("Failed to serialize state: {0}")]
    Serialization(String),

    #[error("Stored state is corrupt: {0}")]
    Corrupt(String),

    #[error("Database error: {0}")]
    Database(String),
}

/// Port for loading and saving conversation state
#[async_trait]
pub trait ConversationStateStore: Send + Sync {
    /// Load the state of an identity
    ///
    /// # Arguments
    /// * `identity` - Conversation owner
    /// * `now` - Creation time used when no state exists yet
    ///
    /// # Returns
    /// The stored state, or a new empty state (version 0) that has not been
    /// persisted yet
    ///
    /// # Errors
    /// Returns `StateStoreError` if the store cannot be read
    async fn load(
        &self,
        identity: &Identity,
        now: DateTime<Utc>,
    ) -> Result<ConversationState, StateStoreError>;

    /// Save a state loaded earlier
    ///
    /// # Arguments
    /// * `state` - The state to save; its `version` must still be current
    /// * `now` - Update timestamp
    ///
    /// # Returns
    /// The new version
    ///
    /// # Errors
    /// Returns `StateStoreError::VersionConflict` if another writer saved
    /// first
    async fn save(&self, state: &ConversationState, now: DateTime<Utc>)
        -> Result<i64, StateStoreError>;
}
