//! Redis-backed link cooldown for multi-instance deployments.
//!
//! One key per identity, created with `SET key 1 NX EX ttl`: the reply is
//! `OK` when the key was absent and nil while a window is open, so checking
//! and starting the window is a single atomic command.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use std::time::Duration;

use crate::domain::foundation::Identity;
use crate::ports::{CooldownError, LinkCooldown};

const DEFAULT_PREFIX: &str = "agenda";

/// Redis-backed cooldown.
#[derive(Clone)]
pub struct RedisLinkCooldown {
    conn: MultiplexedConnection,
    prefix: String,
}

impl RedisLinkCooldown {
    pub fn new(conn: MultiplexedConnection) -> Self {
        Self {
            conn,
            prefix: DEFAULT_PREFIX.to_string(),
        }
    }

    /// Namespace shared with other applications on the same Redis.
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    fn key(&self, identity: &Identity) -> String {
        cooldown_key(&self.prefix, identity)
    }
}

fn cooldown_key(prefix: &str, identity: &Identity) -> String {
    format!("{}:consent-link:{}", prefix, identity)
}

#[async_trait]
impl LinkCooldown for RedisLinkCooldown {
    async fn try_acquire(&self, identity: &Identity, ttl: Duration) -> Result<bool, CooldownError> {
        let mut conn = self.conn.clone();
        // EX rejects 0.
        let ttl_secs = ttl.as_secs().max(1);

        let reply: Option<String> = redis::cmd("SET")
            .arg(self.key(identity))
            .arg(1)
            .arg("NX")
            .arg("EX")
            .arg(ttl_secs)
            .query_async(&mut conn)
            .await
            .map_err(|e: redis::RedisError| CooldownError::Unavailable(e.to_string()))?;

        Ok(reply.is_some())
    }
}
