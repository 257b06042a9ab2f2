//! Inbound message handlers.

mod receive_message;

pub use receive_message::{
    consent_link, Delivery, InboundConfig, ReceiveMessageCommand, ReceiveMessageHandler,
    ReplyKind,
};
