//! Calendar access adapters.
//!
//! - `InMemoryAccessGate` - fixed decisions per identity, for tests
//! - `PostgresCredentialGate` - reads stored Google credentials

mod in_memory;
mod postgres;

pub use in_memory::InMemoryAccessGate;
pub use postgres::{decide, PostgresCredentialGate, StoredCredential, EXPIRY_MARGIN_SECS};
