//! EventResolver - Turns selection criteria into a calendar event id.
//!
//! Searches a local day window (or a lookahead window when only a hint is
//! known), drops cancelled events and events whose title does not contain the
//! hint, then decides:
//!
//! | Matches | Result |
//! |---------|--------|
//! | 0 | `Resolution::NoMatch` |
//! | 1 | `Resolution::Unique(id)` |
//! | more | `Resolution::Ambiguous(candidates)`, all-day first, then by start, capped |

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use tokio::time::timeout;

use crate::domain::dialogue::normalize::normalize;
use crate::domain::dialogue::temporal::day_window;
use crate::domain::dialogue::{replies, CandidateEvent, SelectionCriteria, TurnContext};
use crate::domain::foundation::Identity;
use crate::ports::{CalendarError, CalendarEvent, CalendarReader, EventTime};

/// Outcome of resolving selection criteria.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    NoMatch,
    Unique(String),
    Ambiguous(Vec<CandidateEvent>),
}

impl Resolution {
    /// `(eventId | none, candidates)` view of the resolution.
    pub fn into_parts(self) -> (Option<String>, Vec<CandidateEvent>) {
        match self {
            Resolution::NoMatch => (None, Vec::new()),
            Resolution::Unique(id) => (Some(id), Vec::new()),
            Resolution::Ambiguous(candidates) => (None, candidates),
        }
    }
}

/// Tuning for the resolver.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    pub max_candidates: usize,
    pub hint_lookahead_days: u32,
    pub timeout: Duration,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_candidates: 3,
            hint_lookahead_days: 14,
            timeout: Duration::from_secs(10),
        }
    }
}

/// Resolves the event an UPDATE or CANCEL refers to.
pub struct EventResolver {
    reader: Arc<dyn CalendarReader>,
    config: ResolverConfig,
}

impl EventResolver {
    pub fn new(reader: Arc<dyn CalendarReader>, config: ResolverConfig) -> Self {
        Self { reader, config }
    }

    /// # Errors
    /// Returns the reader's `CalendarError`, or `CalendarError::Timeout`
    /// when the listing does not finish in time
    pub async fn resolve(
        &self,
        identity: &Identity,
        criteria: &SelectionCriteria,
        ctx: &TurnContext,
    ) -> Result<Resolution, CalendarError> {
        let Some((time_min, time_max)) = self.window(criteria, ctx) else {
            return Ok(Resolution::NoMatch);
        };

        let events = timeout(
            self.config.timeout,
            self.reader
                .list_events(identity, time_min, time_max, ctx.timezone),
        )
        .await
        .map_err(|_| CalendarError::Timeout)??;

        let hint = criteria
            .hint
            .as_deref()
            .map(normalize)
            .filter(|h| !h.is_empty());

        let mut matching: Vec<CalendarEvent> = events
            .into_iter()
            .filter(|e| !e.is_cancelled())
            .filter(|e| match &hint {
                Some(hint) => e
                    .title
                    .as_deref()
                    .is_some_and(|title| normalize(title).contains(hint.as_str())),
                None => true,
            })
            .collect();

        tracing::debug!(
            identity = %identity,
            matches = matching.len(),
            "Selection criteria resolved"
        );

        match matching.len() {
            0 => Ok(Resolution::NoMatch),
            1 => Ok(Resolution::Unique(matching.remove(0).id)),
            _ => {
                matching.sort_by_key(|e| (!e.is_all_day(), sort_key(&e.start)));
                let candidates = matching
                    .iter()
                    .take(self.config.max_candidates)
                    .map(|e| candidate(e, ctx))
                    .collect();
                Ok(Resolution::Ambiguous(candidates))
            }
        }
    }

    /// UTC search window; `None` when the criteria cannot be placed in time.
    fn window(
        &self,
        criteria: &SelectionCriteria,
        ctx: &TurnContext,
    ) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        if let Some(date) = criteria.date {
            return day_window(ctx.timezone, date);
        }
        criteria.hint.as_ref()?;

        let today = ctx.today();
        let last = today + ChronoDuration::days(i64::from(self.config.hint_lookahead_days.max(1)));
        let (from, _) = day_window(ctx.timezone, today)?;
        let (until, _) = day_window(ctx.timezone, last)?;
        Some((from, until))
    }
}

fn sort_key(time: &EventTime) -> String {
    match time {
        EventTime::DateTime(instant) => instant.to_rfc3339(),
        EventTime::Date(date) => date.to_string(),
    }
}

fn candidate(event: &CalendarEvent, ctx: &TurnContext) -> CandidateEvent {
    let title = event
        .title
        .clone()
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(replies::untitled_event);

    let local = |instant: &DateTime<Utc>| {
        replies::format_moment(instant.with_timezone(&ctx.timezone).naive_local())
    };

    match (&event.start, &event.end) {
        (EventTime::DateTime(start), EventTime::DateTime(end)) => CandidateEvent {
            title,
            event_id: event.id.clone(),
            display_start: local(start),
            display_end: Some(local(end)),
        },
        (EventTime::DateTime(start), EventTime::Date(_)) => CandidateEvent {
            title,
            event_id: event.id.clone(),
            display_start: local(start),
            display_end: None,
        },
        (EventTime::Date(_), _) => CandidateEvent {
            title,
            event_id: event.id.clone(),
            display_start: replies::ALL_DAY.to_string(),
            display_end: None,
        },
    }
}
