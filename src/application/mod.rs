//! Application layer - Commands and Handlers.
//!
//! This layer orchestrates domain operations and coordinates between ports.
//! Handlers never return errors to the transport; every failure becomes a reply.

pub mod handlers;

pub use handlers::{
    // Dialogue
    HandleTurnCommand, HandleTurnHandler, OutboundMessage, TurnConfig, TurnOutcome,
    EventResolver, ResolverConfig,
    // Inbound
    Delivery, InboundConfig, ReceiveMessageCommand, ReceiveMessageHandler, ReplyKind,
};
