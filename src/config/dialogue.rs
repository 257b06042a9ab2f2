//! Dialogue configuration

use chrono_tz::Tz;
use serde::Deserialize;
use std::time::Duration;

use super::error::{ensure_range, ValidationError};

/// Bounded calls one turn can make in sequence: access gate, state load,
/// event lookup, calendar write and state save.
const TIMED_CALLS_PER_TURN: u64 = 5;

/// Dialogue tuning
#[derive(Debug, Clone, Deserialize)]
pub struct DialogueConfig {
    /// IANA zone messages are interpreted in
    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// Bound on each state store and calendar call, in seconds
    #[serde(default = "default_collaborator_timeout")]
    pub collaborator_timeout_secs: u64,

    /// Most events offered when a reference is ambiguous
    #[serde(default = "default_max_candidates")]
    pub max_candidates: usize,

    /// Days searched forward when only a title hint is given
    #[serde(default = "default_hint_lookahead")]
    pub hint_lookahead_days: u32,

    /// Minimum seconds between two consent links to the same identity
    #[serde(default = "default_link_cooldown")]
    pub link_cooldown_secs: u64,
}

impl DialogueConfig {
    /// Parsed timezone
    pub fn tz(&self) -> Result<Tz, ValidationError> {
        self.timezone
            .parse::<Tz>()
            .map_err(|_| ValidationError::InvalidTimezone(self.timezone.clone()))
    }

    pub fn collaborator_timeout(&self) -> Duration {
        Duration::from_secs(self.collaborator_timeout_secs)
    }

    /// Longest a turn can take when every bounded call runs to its timeout.
    pub fn turn_budget_secs(&self) -> u64 {
        self.collaborator_timeout_secs.saturating_mul(TIMED_CALLS_PER_TURN)
    }

    pub fn link_cooldown(&self) -> Duration {
        Duration::from_secs(self.link_cooldown_secs)
    }

    /// Validate dialogue configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.tz()?;
        ensure_range(
            "dialogue.collaborator_timeout_secs",
            self.collaborator_timeout_secs,
            1,
            120,
        )?;
        ensure_range("dialogue.max_candidates", self.max_candidates as u64, 1, 9)?;
        ensure_range(
            "dialogue.hint_lookahead_days",
            self.hint_lookahead_days.into(),
            1,
            365,
        )?;
        ensure_range("dialogue.link_cooldown_secs", self.link_cooldown_secs, 1, 86_400)?;
        Ok(())
    }
}

impl Default for DialogueConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            collaborator_timeout_secs: default_collaborator_timeout(),
            max_candidates: default_max_candidates(),
            hint_lookahead_days: default_hint_lookahead(),
            link_cooldown_secs: default_link_cooldown(),
        }
    }
}

fn default_timezone() -> String {
    "America/Argentina/Buenos_Aires".to_string()
}

fn default_collaborator_timeout() -> u64 {
    10
}

fn default_max_candidates() -> usize {
    3
}

fn default_hint_lookahead() -> u32 {
    14
}

fn default_link_cooldown() -> u64 {
    120
}
