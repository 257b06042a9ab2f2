//! Domain layer containing dialogue logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (identity, errors, state machine trait)
//! - `dialogue` - Intents, slot extraction and merge policy, conversation state

pub mod dialogue;
pub mod foundation;
