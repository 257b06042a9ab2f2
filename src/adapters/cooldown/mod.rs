//! Consent-link cooldown adapters.
//!
//! - `InMemoryLinkCooldown` - single-process expiring map
//! - `RedisLinkCooldown` - shared `SET NX EX` key for multi-instance deployments

mod in_memory;
mod redis;

pub use in_memory::InMemoryLinkCooldown;
pub use self::redis::RedisLinkCooldown;
