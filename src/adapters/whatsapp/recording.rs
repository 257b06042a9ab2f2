//! Recording sender for tests.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::domain::foundation::Identity;
use crate::ports::{MessageSender, SendError};

/// One captured outbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub to: Identity,
    pub body: String,
}

/// Sender that keeps every message in memory.
#[derive(Debug, Clone, Default)]
pub struct RecordingSender {
    sent: Arc<Mutex<Vec<SentMessage>>>,
    failures: Arc<Mutex<VecDeque<SendError>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl RecordingSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next send fail; the message is not recorded.
    pub fn fail_next_with(self, error: SendError) -> Self {
        lock(&self.failures).push_back(error);
        self
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        lock(&self.sent).clone()
    }

    pub fn last_body(&self) -> Option<String> {
        lock(&self.sent).last().map(|m| m.body.clone())
    }
}

#[async_trait]
impl MessageSender for RecordingSender {
    async fn send_text(&self, to: &Identity, body: &str) -> Result<(), SendError> {
        if let Some(error) = lock(&self.failures).pop_front() {
            return Err(error);
        }
        lock(&self.sent).push(SentMessage {
            to: to.clone(),
            body: body.to_string(),
        });
        Ok(())
    }
}
