//! Calendar ports - reading events and executing calendar actions.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::domain::dialogue::{IntentSlots, TurnContext};
use crate::domain::foundation::Identity;

/// Errors raised by calendar collaborators.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CalendarError {
    #[error("Calendar request timed out")]
    Timeout,

    #[error("Calendar unavailable: {0}")]
    Unavailable(String),

    #[error("Calendar rejected the request: {0}")]
    Rejected(String),

    #[error("Event not found: {0}")]
    NotFound(String),

    #[error("Calendar authorization failed: {0}")]
    Unauthorized(String),
}

impl CalendarError {
    /// Whether retrying the same turn later can succeed.
    ///
    /// Authorization failures count as transient: credentials are refreshed
    /// outside the dialogue.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            CalendarError::Timeout | CalendarError::Unavailable(_) | CalendarError::Unauthorized(_)
        )
    }
}

/// Start or end of an event: an instant, or a whole day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventTime {
    DateTime(DateTime<Utc>),
    Date(NaiveDate),
}

impl EventTime {
    pub fn is_all_day(&self) -> bool {
        matches!(self, EventTime::Date(_))
    }
}

/// An event as listed by the calendar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub id: String,
    pub title: Option<String>,
    pub status: Option<String>,
    pub start: EventTime,
    pub end: EventTime,
}

impl CalendarEvent {
    pub fn is_cancelled(&self) -> bool {
        self.status.as_deref() == Some("cancelled")
    }

    pub fn is_all_day(&self) -> bool {
        self.start.is_all_day()
    }
}

/// Port for querying a user's calendar.
#[async_trait]
pub trait CalendarReader: Send + Sync {
    /// List events overlapping `[time_min, time_max)`, ordered by start.
    ///
    /// # Errors
    /// Returns `CalendarError` on transport failure or refusal
    async fn list_events(
        &self,
        identity: &Identity,
        time_min: DateTime<Utc>,
        time_max: DateTime<Utc>,
        timezone: Tz,
    ) -> Result<Vec<CalendarEvent>, CalendarError>;
}

/// What an executed action reports back to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionOutcome {
    pub summary: String,
    pub event_id: Option<String>,
}

/// Port for carrying out a ready task.
#[async_trait]
pub trait CalendarExecutor: Send + Sync {
    /// Execute the task described by `slots`.
    ///
    /// # Errors
    /// Returns `CalendarError`; see [`CalendarError::is_transient`] for how
    /// the dialogue treats each kind
    async fn execute(
        &self,
        identity: &Identity,
        slots: &IntentSlots,
        ctx: &TurnContext,
    ) -> Result<ExecutionOutcome, CalendarError>;
}
