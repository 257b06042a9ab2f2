//! In-memory access gate for testing.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::Secret;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::domain::foundation::Identity;
use crate::ports::{AccessDecision, AccessError, AccessGate, AccessTokenSource};

/// Gate answering from a fixed table; unknown identities get the default.
#[derive(Debug, Clone)]
pub struct InMemoryAccessGate {
    decisions: Arc<RwLock<HashMap<Identity, AccessDecision>>>,
    default: AccessDecision,
    unavailable: bool,
}

impl Default for InMemoryAccessGate {
    fn default() -> Self {
        Self::granting()
    }
}

impl InMemoryAccessGate {
    /// Grants every identity.
    pub fn granting() -> Self {
        Self::with_default(AccessDecision::Granted)
    }

    pub fn with_default(default: AccessDecision) -> Self {
        Self {
            decisions: Arc::new(RwLock::new(HashMap::new())),
            default,
            unavailable: false,
        }
    }

    /// Overrides the decision for one identity.
    pub fn with_decision(self, identity: Identity, decision: AccessDecision) -> Self {
        self.set_decision(identity, decision);
        self
    }

    /// Makes every check fail as if the credential store were down.
    pub fn unavailable(mut self) -> Self {
        self.unavailable = true;
        self
    }

    pub fn set_decision(&self, identity: Identity, decision: AccessDecision) {
        self.decisions
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(identity, decision);
    }

    fn decision_for(&self, identity: &Identity) -> AccessDecision {
        self.decisions
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(identity)
            .copied()
            .unwrap_or(self.default)
    }
}

#[async_trait]
impl AccessGate for InMemoryAccessGate {
    async fn check(
        &self,
        identity: &Identity,
        _now: DateTime<Utc>,
    ) -> Result<AccessDecision, AccessError> {
        if self.unavailable {
            return Err(AccessError::Database("credential store unavailable".to_string()));
        }
        Ok(self.decision_for(identity))
    }
}

#[async_trait]
impl AccessTokenSource for InMemoryAccessGate {
    async fn access_token(&self, identity: &Identity) -> Result<Secret<String>, AccessError> {
        match self.decision_for(identity) {
            AccessDecision::Granted => Ok(Secret::new(format!("token-{}", identity))),
            AccessDecision::SendConsentLink { .. } => {
                Err(AccessError::NoCredentials(identity.clone()))
            }
            AccessDecision::RetryLater => Err(AccessError::Expired(identity.clone())),
        }
    }
}
