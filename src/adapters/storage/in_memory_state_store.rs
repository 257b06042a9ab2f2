//! In-Memory Conversation State Store Adapter
//!
//! Keeps conversation state in a process-local map with the same version
//! semantics as the PostgreSQL store. Useful for testing and development.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::dialogue::ConversationState;
use crate::domain::foundation::Identity;
use crate::ports::{ConversationStateStore, StateStoreError};

/// In-memory storage for conversation state
#[derive(Debug, Clone, Default)]
pub struct InMemoryStateStore {
    states: Arc<RwLock<HashMap<Identity, ConversationState>>>,
}

impl InMemoryStateStore {
    /// Create a new in-memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a stored state without creating one (useful for tests)
    pub async fn get(&self, identity: &Identity) -> Option<ConversationState> {
        self.states.read().await.get(identity).cloned()
    }

    /// Get the number of stored states
    pub async fn state_count(&self) -> usize {
        self.states.read().await.len()
    }

    /// Clear all stored data (useful for tests)
    pub async fn clear(&self) {
        self.states.write().await.clear();
    }
}

#[async_trait]
impl ConversationStateStore for InMemoryStateStore {
    async fn load(
        &self,
        identity: &Identity,
        now: DateTime<Utc>,
    ) -> Result<ConversationState, StateStoreError> {
        let states = self.states.read().await;
        Ok(states
            .get(identity)
            .cloned()
            .unwrap_or_else(|| ConversationState::new(identity.clone(), now)))
    }

    async fn save(
        &self,
        state: &ConversationState,
        now: DateTime<Utc>,
    ) -> Result<i64, StateStoreError> {
        let mut states = self.states.write().await;
        let stored_version = states
            .get(state.identity())
            .map(ConversationState::version)
            .unwrap_or(0);

        if stored_version != state.version() {
            return Err(StateStoreError::VersionConflict {
                identity: state.identity().clone(),
                expected: state.version(),
            });
        }

        let version = stored_version + 1;
        let mut saved = state.clone();
        saved.mark_saved(version, now);
        states.insert(state.identity().clone(), saved);
        Ok(version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::dialogue::Intent;

    fn identity() -> Identity {
        Identity::new("5491112345678").unwrap()
    }

    #[tokio::test]
    async fn load_returns_empty_state_without_persisting() {
        let store = InMemoryStateStore::new();
        let state = store.load(&identity(), Utc::now()).await.unwrap();

        assert!(state.is_blank());
        assert_eq!(state.version(), 0);
        assert_eq!(store.state_count().await, 0);
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let store = InMemoryStateStore::new();
        let mut state = store.load(&identity(), Utc::now()).await.unwrap();
        state.start_intent(Intent::Cancel).unwrap();

        let version = store.save(&state, Utc::now()).await.unwrap();
        let loaded = store.load(&identity(), Utc::now()).await.unwrap();

        assert_eq!(version, 1);
        assert_eq!(loaded.version(), 1);
        assert_eq!(loaded.active_intent(), Some(Intent::Cancel));
    }

    #[tokio::test]
    async fn stale_save_is_rejected() {
        let store = InMemoryStateStore::new();
        let first = store.load(&identity(), Utc::now()).await.unwrap();
        let second = first.clone();

        store.save(&first, Utc::now()).await.unwrap();
        let result = store.save(&second, Utc::now()).await;

        assert!(matches!(
            result,
            Err(StateStoreError::VersionConflict { expected: 0, .. })
        ));
    }

    #[tokio::test]
    async fn clear_removes_everything() {
        let store = InMemoryStateStore::new();
        let state = store.load(&identity(), Utc::now()).await.unwrap();
        store.save(&state, Utc::now()).await.unwrap();

        store.clear().await;

        assert_eq!(store.state_count().await, 0);
    }
}
