//! Application handlers.
//!
//! Command handlers that orchestrate domain operations through ports.

pub mod dialogue;
pub mod inbound;

pub use dialogue::{
    EventResolver, HandleTurnCommand, HandleTurnHandler, IdentityLocks, OutboundMessage,
    Resolution, ResolverConfig, TurnConfig, TurnOutcome,
};
pub use inbound::{
    consent_link, Delivery, InboundConfig, ReceiveMessageCommand, ReceiveMessageHandler,
    ReplyKind,
};
