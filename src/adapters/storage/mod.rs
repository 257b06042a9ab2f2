//! Conversation state storage adapters.
//!
//! - `InMemoryStateStore` - process-local map, for tests and development
//! - `PostgresStateStore` - durable `conversation_state` table

mod in_memory_state_store;
mod postgres_state_store;

pub use in_memory_state_store::InMemoryStateStore;
pub use postgres_state_store::PostgresStateStore;
