//! Dialogue handlers: one conversation turn and its helpers.

mod event_resolver;
mod handle_turn;
mod identity_locks;

pub use event_resolver::{EventResolver, Resolution, ResolverConfig};
pub use handle_turn::{
    HandleTurnCommand, HandleTurnHandler, OutboundMessage, TurnConfig, TurnOutcome,
};
pub use identity_locks::IdentityLocks;
