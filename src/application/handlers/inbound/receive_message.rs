//! ReceiveMessageHandler - Entry point for every inbound WhatsApp message.
//!
//! Checks calendar access first. Identities without usable credentials get a
//! consent link (at most one per cooldown window); everyone else goes through
//! a dialogue turn. The reply is always sent through the `MessageSender`.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::timeout;
use url::form_urlencoded;

use crate::application::handlers::dialogue::{HandleTurnCommand, HandleTurnHandler, TurnOutcome};
use crate::domain::dialogue::replies;
use crate::domain::foundation::Identity;
use crate::ports::{AccessDecision, AccessGate, ConsentReason, LinkCooldown, MessageSender};

/// Command carrying one inbound text message.
#[derive(Debug, Clone)]
pub struct ReceiveMessageCommand {
    pub identity: Identity,
    pub text: String,
    pub received_at: DateTime<Utc>,
    /// Public origin consent links are built on, e.g. `https://bot.example.com`.
    pub base_url: String,
}

/// What kind of reply was produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyKind {
    Turn(TurnOutcome),
    ConsentLink(ConsentReason),
    /// A link went out within the cooldown window.
    ConsentReminder,
    RetryLater,
}

/// Result of handling an inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub text: String,
    pub kind: ReplyKind,
    /// Whether the sender accepted the reply.
    pub sent: bool,
}

/// Settings for the inbound pipeline.
#[derive(Debug, Clone)]
pub struct InboundConfig {
    pub consent_path: String,
    pub link_cooldown: Duration,
    pub gate_timeout: Duration,
}

impl Default for InboundConfig {
    fn default() -> Self {
        Self {
            consent_path: "/auth/google/start".to_string(),
            link_cooldown: Duration::from_secs(120),
            gate_timeout: Duration::from_secs(10),
        }
    }
}

/// Handler for inbound messages.
pub struct ReceiveMessageHandler {
    gate: Arc<dyn AccessGate>,
    cooldown: Arc<dyn LinkCooldown>,
    turns: Arc<HandleTurnHandler>,
    sender: Arc<dyn MessageSender>,
    config: InboundConfig,
}

impl ReceiveMessageHandler {
    pub fn new(
        gate: Arc<dyn AccessGate>,
        cooldown: Arc<dyn LinkCooldown>,
        turns: Arc<HandleTurnHandler>,
        sender: Arc<dyn MessageSender>,
        config: InboundConfig,
    ) -> Self {
        Self {
            gate,
            cooldown,
            turns,
            sender,
            config,
        }
    }

    pub async fn handle(&self, cmd: ReceiveMessageCommand) -> Delivery {
        let (text, kind) = match self.decide(&cmd.identity, cmd.received_at).await {
            AccessDecision::Granted => {
                let reply = self
                    .turns
                    .handle(HandleTurnCommand {
                        identity: cmd.identity.clone(),
                        text: cmd.text,
                        received_at: cmd.received_at,
                    })
                    .await;
                (reply.text, ReplyKind::Turn(reply.outcome))
            }
            AccessDecision::SendConsentLink { reason } => {
                self.consent_reply(&cmd.identity, reason, &cmd.base_url).await
            }
            AccessDecision::RetryLater => (replies::retry_later(), ReplyKind::RetryLater),
        };

        let sent = match self.sender.send_text(&cmd.identity, &text).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(identity = %cmd.identity, error = %e, "Failed to send reply");
                false
            }
        };

        Delivery { text, kind, sent }
    }

    async fn decide(&self, identity: &Identity, now: DateTime<Utc>) -> AccessDecision {
        match timeout(self.config.gate_timeout, self.gate.check(identity, now)).await {
            Ok(Ok(decision)) => decision,
            Ok(Err(e)) => {
                tracing::warn!(identity = %identity, error = %e, "Access check failed");
                AccessDecision::RetryLater
            }
            Err(_) => {
                tracing::warn!(identity = %identity, "Access check timed out");
                AccessDecision::RetryLater
            }
        }
    }

    async fn consent_reply(
        &self,
        identity: &Identity,
        reason: ConsentReason,
        base_url: &str,
    ) -> (String, ReplyKind) {
        let first_in_window = self
            .cooldown
            .try_acquire(identity, self.config.link_cooldown)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(identity = %identity, error = %e, "Cooldown store failed, sending link");
                true
            });

        if !first_in_window {
            tracing::debug!(identity = %identity, "Consent link sent recently");
            return (replies::consent_link_recently_sent(), ReplyKind::ConsentReminder);
        }

        let link = consent_link(base_url, &self.config.consent_path, identity, reason);
        tracing::info!(identity = %identity, reason = ?reason, "Sending consent link");
        let text = match reason {
            ConsentReason::NoCredentials => replies::consent_link_first_time(&link),
            ConsentReason::ReconsentRequired => replies::consent_link_again(&link),
        };
        (text, ReplyKind::ConsentLink(reason))
    }
}

/// `{base}{path}?phone=..&force_consent=0|1&select_account=0|1`
pub fn consent_link(
    base_url: &str,
    consent_path: &str,
    identity: &Identity,
    reason: ConsentReason,
) -> String {
    let flag = |on: bool| if on { "1" } else { "0" };
    let query = form_urlencoded::Serializer::new(String::new())
        .append_pair("phone", identity.as_str())
        .append_pair("force_consent", flag(reason.force_consent()))
        .append_pair("select_account", flag(reason.select_account()))
        .finish();

    format!(
        "{}/{}?{}",
        base_url.trim_end_matches('/'),
        consent_path.trim_start_matches('/'),
        query
    )
}
