//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! ## Dialogue Ports
//!
//! - `ConversationStateStore` - Per-identity dialogue memory
//! - `CalendarReader` - Event listing for the event resolver
//! - `CalendarExecutor` - Carries out ready tasks
//!
//! ## Channel Ports
//!
//! - `MessageSender` - Outbound text messages
//! - `AccessGate` / `AccessTokenSource` - Calendar authorization
//! - `LinkCooldown` - Shared consent-link anti-spam window

mod access_gate;
mod calendar;
mod conversation_state_store;
mod link_cooldown;
mod message_sender;

pub use access_gate::{AccessDecision, AccessError, AccessGate, AccessTokenSource, ConsentReason};
pub use calendar::{
    CalendarError, CalendarEvent, CalendarExecutor, CalendarReader, EventTime, ExecutionOutcome,
};
pub use conversation_state_store::{ConversationStateStore, StateStoreError};
pub use link_cooldown::{CooldownError, LinkCooldown};
pub use message_sender::{MessageSender, SendError};
