//! Errors raised by dialogue state transitions.

use thiserror::Error;

use super::Intent;
use crate::domain::foundation::ValidationError;

/// A dialogue operation that would break a state invariant.
///
/// These are never shown to the user verbatim; the orchestrator logs them
/// and answers with a generic error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DialogueError {
    #[error("invalid sub-dialogue transition: {0}")]
    InvalidTransition(#[from] ValidationError),

    #[error("slots for {proposed} cannot be merged into slots for {current}")]
    SlotsMismatch { current: Intent, proposed: Intent },

    #[error("no active intent")]
    NoActiveIntent,

    #[error("selection {choice} is outside 1..={available}")]
    SelectionOutOfRange { choice: usize, available: usize },
}
