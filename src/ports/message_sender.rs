//! Message Sender Port - outbound text messages to users.

use async_trait::async_trait;

use crate::domain::foundation::Identity;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SendError {
    #[error("Messaging API returned {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Messaging network error: {0}")]
    Network(String),
}

/// Port for sending plain text to an identity.
///
/// Delivery is best-effort; callers log failures and move on.
#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send_text(&self, to: &Identity, body: &str) -> Result<(), SendError>;
}
