//! Foundation module - Shared domain primitives.
//!
//! Contains value objects and error types that form the vocabulary of the
//! assistant's domain.

mod errors;
mod identity;
mod state_machine;

pub use errors::ValidationError;
pub use identity::Identity;
pub use state_machine::StateMachine;
