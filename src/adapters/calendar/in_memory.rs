//! In-memory calendar for testing.
//!
//! Implements both calendar ports over a shared event list, so a test can
//! seed events, drive a conversation and then inspect what was executed.
//!
//! # Features
//!
//! - Seeded events
//! - Simulated delays for timeout testing
//! - Error injection (consumed by the next call)
//! - Call tracking for verification
//!
//! # Example
//!
//! ```ignore
//! let calendar = InMemoryCalendar::new()
//!     .with_event(event)
//!     .fail_next_with(CalendarError::Timeout);
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::sleep;

use super::{describe_when, local_span, title_of};
use crate::domain::dialogue::{replies, IntentSlots, TurnContext};
use crate::domain::dialogue::temporal::{day_window, local_to_utc};
use crate::domain::foundation::Identity;
use crate::ports::{
    CalendarError, CalendarEvent, CalendarExecutor, CalendarReader, EventTime, ExecutionOutcome,
};

/// One call to `execute`, as recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutedAction {
    pub identity: Identity,
    pub slots: IntentSlots,
}

/// Fake calendar shared by every identity.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCalendar {
    events: Arc<Mutex<Vec<CalendarEvent>>>,
    failures: Arc<Mutex<VecDeque<CalendarError>>>,
    executions: Arc<Mutex<Vec<ExecutedAction>>>,
    list_calls: Arc<AtomicU64>,
    next_id: Arc<AtomicU64>,
    delay: Duration,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl InMemoryCalendar {
    /// Creates an empty calendar.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds an event.
    pub fn with_event(self, event: CalendarEvent) -> Self {
        lock(&self.events).push(event);
        self
    }

    /// Delays every call, for timeout tests.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Makes the next call (list or execute) fail with `error`.
    pub fn fail_next_with(self, error: CalendarError) -> Self {
        self.push_failure(error);
        self
    }

    /// Queues a failure on a calendar that is already shared.
    pub fn push_failure(&self, error: CalendarError) {
        lock(&self.failures).push_back(error);
    }

    /// Current events, including cancelled ones.
    pub fn events(&self) -> Vec<CalendarEvent> {
        lock(&self.events).clone()
    }

    /// Executions recorded so far.
    pub fn executions(&self) -> Vec<ExecutedAction> {
        lock(&self.executions).clone()
    }

    /// Number of `list_events` calls.
    pub fn list_call_count(&self) -> u64 {
        self.list_calls.load(Ordering::SeqCst)
    }

    async fn before_call(&self) -> Result<(), CalendarError> {
        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }
        match lock(&self.failures).pop_front() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn bounds(event: &CalendarEvent, tz: Tz) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let instant = |time: &EventTime| match time {
            EventTime::DateTime(instant) => Some(*instant),
            EventTime::Date(date) => day_window(tz, *date).map(|w| w.0),
        };
        Some((instant(&event.start)?, instant(&event.end)?))
    }

    fn overlapping(
        &self,
        time_min: DateTime<Utc>,
        time_max: DateTime<Utc>,
        tz: Tz,
    ) -> Vec<CalendarEvent> {
        let mut found: Vec<(DateTime<Utc>, CalendarEvent)> = lock(&self.events)
            .iter()
            .filter_map(|event| {
                let (start, end) = Self::bounds(event, tz)?;
                (start < time_max && end > time_min).then(|| (start, event.clone()))
            })
            .collect();
        found.sort_by_key(|(start, _)| *start);
        found.into_iter().map(|(_, event)| event).collect()
    }

    fn find_active(&self, event_id: &str) -> Result<CalendarEvent, CalendarError> {
        lock(&self.events)
            .iter()
            .find(|e| e.id == event_id && !e.is_cancelled())
            .cloned()
            .ok_or_else(|| CalendarError::NotFound(event_id.to_string()))
    }

    fn replace(&self, updated: CalendarEvent) {
        let mut events = lock(&self.events);
        if let Some(slot) = events.iter_mut().find(|e| e.id == updated.id) {
            *slot = updated;
        }
    }
}

#[async_trait]
impl CalendarReader for InMemoryCalendar {
    async fn list_events(
        &self,
        _identity: &Identity,
        time_min: DateTime<Utc>,
        time_max: DateTime<Utc>,
        timezone: Tz,
    ) -> Result<Vec<CalendarEvent>, CalendarError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.before_call().await?;
        Ok(self.overlapping(time_min, time_max, timezone))
    }
}

#[async_trait]
impl CalendarExecutor for InMemoryCalendar {
    async fn execute(
        &self,
        identity: &Identity,
        slots: &IntentSlots,
        ctx: &TurnContext,
    ) -> Result<ExecutionOutcome, CalendarError> {
        self.before_call().await?;
        lock(&self.executions).push(ExecutedAction {
            identity: identity.clone(),
            slots: slots.clone(),
        });

        let tz = ctx.timezone;
        let invalid = |what: &str| CalendarError::Rejected(format!("invalid {}", what));

        match slots {
            IntentSlots::Create(create) => {
                let (start, end) = create
                    .time_span(ctx.now_local())
                    .ok_or_else(|| invalid("time span"))?;
                let title = create.title.clone().unwrap_or_else(replies::untitled_event);
                let id = format!("evt-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
                let event = CalendarEvent {
                    id: id.clone(),
                    title: Some(title.clone()),
                    status: Some("confirmed".to_string()),
                    start: EventTime::DateTime(
                        local_to_utc(tz, start.date(), start.time()).ok_or_else(|| invalid("start"))?,
                    ),
                    end: EventTime::DateTime(
                        local_to_utc(tz, end.date(), end.time()).ok_or_else(|| invalid("end"))?,
                    ),
                };
                lock(&self.events).push(event);
                Ok(ExecutionOutcome {
                    summary: replies::created(&title, start, end),
                    event_id: Some(id),
                })
            }
            IntentSlots::QueryAvailability(query) => {
                let (from, until) = query
                    .range_start
                    .zip(query.range_end)
                    .ok_or_else(|| invalid("range"))?;
                let busy: Vec<_> = self
                    .overlapping(from, until, tz)
                    .iter()
                    .filter(|e| !e.is_cancelled())
                    .map(|e| local_span(e, tz))
                    .collect();
                let from_local = from.with_timezone(&tz).naive_local();
                let until_local = until.with_timezone(&tz).naive_local();
                let summary = if busy.is_empty() {
                    replies::free_between(from_local, until_local)
                } else {
                    replies::busy_between(from_local, until_local, &busy)
                };
                Ok(ExecutionOutcome {
                    summary,
                    event_id: None,
                })
            }
            IntentSlots::Update(update) => {
                let event_id = update.event_id.as_deref().ok_or_else(|| invalid("event"))?;
                let mut event = self.find_active(event_id)?;
                let old_title = title_of(&event);
                let changes = &update.changes;

                if let Some(title) = changes.title.clone().filter(|t| !t.trim().is_empty()) {
                    event.title = Some(title);
                }
                if changes.changes_schedule() {
                    let (start, end) = local_span(&event, tz);
                    let (new_start, new_end) = changes.reschedule(start, end);
                    event.start = EventTime::DateTime(
                        local_to_utc(tz, new_start.date(), new_start.time())
                            .ok_or_else(|| invalid("start"))?,
                    );
                    event.end = EventTime::DateTime(
                        local_to_utc(tz, new_end.date(), new_end.time())
                            .ok_or_else(|| invalid("end"))?,
                    );
                }
                self.replace(event.clone());

                let new_title = title_of(&event);
                let summary = if changes.changes_schedule() {
                    let (start, end) = local_span(&event, tz);
                    replies::updated(&new_title, start, end)
                } else {
                    replies::renamed(&old_title, &new_title)
                };
                Ok(ExecutionOutcome {
                    summary,
                    event_id: Some(event.id),
                })
            }
            IntentSlots::Cancel(cancel) => {
                let event_id = cancel.event_id.as_deref().ok_or_else(|| invalid("event"))?;
                let mut event = self.find_active(event_id)?;
                event.status = Some("cancelled".to_string());
                self.replace(event.clone());
                Ok(ExecutionOutcome {
                    summary: replies::cancelled(&title_of(&event), &describe_when(&event, tz)),
                    event_id: Some(event.id),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::dialogue::{CancelSlots, CreateSlots, EventChanges, UpdateSlots};
    use chrono::{NaiveDate, NaiveTime, TimeZone};

    fn tz() -> Tz {
        "America/Argentina/Buenos_Aires".parse().unwrap()
    }

    fn ctx() -> TurnContext {
        let now = tz()
            .with_ymd_and_hms(2025, 3, 12, 9, 0, 0)
            .unwrap()
            .with_timezone(&Utc);
        TurnContext::new(tz(), now)
    }

    fn identity() -> Identity {
        Identity::new("5491112345678").unwrap()
    }

    fn at(day: u32, h: u32) -> DateTime<Utc> {
        tz().with_ymd_and_hms(2025, 3, day, h, 0, 0)
            .unwrap()
            .with_timezone(&Utc)
    }

    fn timed(id: &str, title: &str, day: u32, h: u32) -> CalendarEvent {
        CalendarEvent {
            id: id.into(),
            title: Some(title.into()),
            status: Some("confirmed".into()),
            start: EventTime::DateTime(at(day, h)),
            end: EventTime::DateTime(at(day, h + 1)),
        }
    }

    #[tokio::test]
    async fn lists_overlapping_events_in_start_order() {
        let calendar = InMemoryCalendar::new()
            .with_event(timed("b", "Tarde", 13, 15))
            .with_event(timed("a", "Mañana", 13, 9))
            .with_event(timed("c", "Otro día", 14, 9));

        let events = calendar
            .list_events(&identity(), at(13, 0), at(14, 0), tz())
            .await
            .unwrap();

        let ids: Vec<&str> = events.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(calendar.list_call_count(), 1);
    }

    #[tokio::test]
    async fn all_day_events_are_listed_for_their_day() {
        let day = NaiveDate::from_ymd_opt(2025, 3, 13).unwrap();
        let calendar = InMemoryCalendar::new().with_event(CalendarEvent {
            id: "holiday".into(),
            title: Some("Feriado".into()),
            status: None,
            start: EventTime::Date(day),
            end: EventTime::Date(day.succ_opt().unwrap()),
        });

        let events = calendar
            .list_events(&identity(), at(13, 0), at(14, 0), tz())
            .await
            .unwrap();

        assert_eq!(events.len(), 1);
    }

    #[tokio::test]
    async fn injected_failure_is_consumed_once() {
        let calendar = InMemoryCalendar::new().fail_next_with(CalendarError::Timeout);

        let first = calendar
            .list_events(&identity(), at(13, 0), at(14, 0), tz())
            .await;
        let second = calendar
            .list_events(&identity(), at(13, 0), at(14, 0), tz())
            .await;

        assert_eq!(first, Err(CalendarError::Timeout));
        assert!(second.is_ok());
    }

    #[tokio::test]
    async fn create_adds_event_and_summarises() {
        let calendar = InMemoryCalendar::new();
        let slots = IntentSlots::Create(CreateSlots {
            title: Some("Dentista".into()),
            day: NaiveDate::from_ymd_opt(2025, 3, 14),
            start_time: NaiveTime::from_hms_opt(15, 0, 0),
            duration_minutes: Some(60),
            ..Default::default()
        });

        let outcome = calendar.execute(&identity(), &slots, &ctx()).await.unwrap();

        assert_eq!(outcome.summary, "Listo, agendé «Dentista» el vie 14/03 de 15:00 a 16:00 ✅");
        assert_eq!(calendar.events().len(), 1);
        assert_eq!(calendar.executions().len(), 1);
    }

    #[tokio::test]
    async fn update_moves_event_keeping_length() {
        let calendar = InMemoryCalendar::new().with_event(timed("a", "Daily", 13, 10));
        let slots = IntentSlots::Update(UpdateSlots {
            event_id: Some("a".into()),
            changes: EventChanges {
                start_time: NaiveTime::from_hms_opt(17, 0, 0),
                ..Default::default()
            },
            ..Default::default()
        });

        let outcome = calendar.execute(&identity(), &slots, &ctx()).await.unwrap();

        assert_eq!(outcome.summary, "Listo, actualicé «Daily»: queda el jue 13/03 de 17:00 a 18:00 ✅");
        assert_eq!(calendar.events()[0].start, EventTime::DateTime(at(13, 17)));
    }

    #[tokio::test]
    async fn cancel_marks_event_cancelled() {
        let calendar = InMemoryCalendar::new().with_event(timed("a", "Daily", 13, 10));
        let slots = IntentSlots::Cancel(CancelSlots {
            event_id: Some("a".into()),
            ..Default::default()
        });

        calendar.execute(&identity(), &slots, &ctx()).await.unwrap();

        assert!(calendar.events()[0].is_cancelled());
        let again = calendar.execute(&identity(), &slots, &ctx()).await;
        assert_eq!(again, Err(CalendarError::NotFound("a".into())));
    }
}
