//! Typed slots per intent and the fill-missing-only merge policy.
//!
//! Merging never overwrites a value that is already present and non-empty.
//! Re-applying the same proposal is therefore a no-op, which is what makes a
//! retried turn safe.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use super::temporal::default_day_for;
use super::{DialogueError, Intent};

fn fill<T>(slot: &mut Option<T>, value: Option<T>) {
    if slot.is_none() {
        *slot = value;
    }
}

fn has_text(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|s| !s.trim().is_empty())
}

fn fill_text(slot: &mut Option<String>, value: Option<String>) {
    if has_text(slot) {
        return;
    }
    if let Some(value) = value.filter(|v| !v.trim().is_empty()) {
        *slot = Some(value);
    }
}

/// Parameters for creating an event.
///
/// `day` may stay empty: a start time alone means today, or tomorrow once
/// that time has passed (see [`CreateSlots::time_span`]).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateSlots {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<NaiveTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<NaiveTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<u32>,
}

impl CreateSlots {
    pub fn has_title(&self) -> bool {
        has_text(&self.title)
    }

    pub fn has_end_or_duration(&self) -> bool {
        self.end_time.is_some() || self.duration_minutes.is_some()
    }

    /// Local start and end of the event, if enough is known.
    ///
    /// An end time earlier than the start is taken to be on the next day.
    pub fn time_span(&self, now_local: NaiveDateTime) -> Option<(NaiveDateTime, NaiveDateTime)> {
        let start_time = self.start_time?;
        let day = self
            .day
            .unwrap_or_else(|| default_day_for(start_time, now_local));
        let start = day.and_time(start_time);

        let end = match (self.end_time, self.duration_minutes) {
            (Some(end_time), _) => {
                let end = day.and_time(end_time);
                if end <= start {
                    end + Duration::days(1)
                } else {
                    end
                }
            }
            (None, Some(minutes)) => start + Duration::minutes(i64::from(minutes)),
            (None, None) => return None,
        };
        Some((start, end))
    }

    fn merge_missing(&mut self, proposal: CreateSlots) {
        fill_text(&mut self.title, proposal.title);
        fill(&mut self.day, proposal.day);
        fill(&mut self.start_time, proposal.start_time);
        fill(&mut self.end_time, proposal.end_time);
        fill(&mut self.duration_minutes, proposal.duration_minutes);
    }
}

/// Instant range of an availability query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuerySlots {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range_start: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range_end: Option<DateTime<Utc>>,
}

impl QuerySlots {
    /// An end that would not come after the start stays missing.
    fn merge_missing(&mut self, proposal: QuerySlots) {
        fill(&mut self.range_start, proposal.range_start);
        fill(&mut self.range_end, proposal.range_end);
        if let (Some(start), Some(end)) = (self.range_start, self.range_end) {
            if end <= start {
                self.range_end = None;
            }
        }
    }
}

/// What identifies the existing event an UPDATE or CANCEL acts on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionCriteria {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl SelectionCriteria {
    pub fn is_empty(&self) -> bool {
        self.date.is_none() && !has_text(&self.hint)
    }

    fn merge_missing(&mut self, proposal: SelectionCriteria) {
        fill(&mut self.date, proposal.date);
        fill_text(&mut self.hint, proposal.hint);
    }
}

/// Change-set of an UPDATE, merged key by key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventChanges {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<NaiveTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<u32>,
}

impl EventChanges {
    pub fn is_empty(&self) -> bool {
        !has_text(&self.title)
            && self.date.is_none()
            && self.start_time.is_none()
            && self.duration_minutes.is_none()
    }

    pub fn changes_schedule(&self) -> bool {
        self.date.is_some() || self.start_time.is_some() || self.duration_minutes.is_some()
    }

    /// Applies the schedule part of the change-set to a local event span.
    ///
    /// A new date keeps the time of day, a new start time keeps the date,
    /// and the original length is kept unless a new duration is given.
    pub fn reschedule(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> (NaiveDateTime, NaiveDateTime) {
        let length = match self.duration_minutes {
            Some(minutes) => Duration::minutes(i64::from(minutes)),
            None => end - start,
        };
        let date = self.date.unwrap_or(start.date());
        let time = self.start_time.unwrap_or(start.time());
        let new_start = date.and_time(time);
        (new_start, new_start + length)
    }

    fn merge_missing(&mut self, proposal: EventChanges) {
        fill_text(&mut self.title, proposal.title);
        fill(&mut self.date, proposal.date);
        fill(&mut self.start_time, proposal.start_time);
        fill(&mut self.duration_minutes, proposal.duration_minutes);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateSlots {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    #[serde(default)]
    pub criteria: SelectionCriteria,
    #[serde(default)]
    pub changes: EventChanges,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelSlots {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    #[serde(default)]
    pub criteria: SelectionCriteria,
}

/// Slots of the active task, one variant per intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "intent", content = "slots", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntentSlots {
    Create(CreateSlots),
    QueryAvailability(QuerySlots),
    Update(UpdateSlots),
    Cancel(CancelSlots),
}

impl IntentSlots {
    /// Empty slots for a freshly started intent.
    pub fn empty(intent: Intent) -> Self {
        match intent {
            Intent::Create => IntentSlots::Create(CreateSlots::default()),
            Intent::QueryAvailability => IntentSlots::QueryAvailability(QuerySlots::default()),
            Intent::Update => IntentSlots::Update(UpdateSlots::default()),
            Intent::Cancel => IntentSlots::Cancel(CancelSlots::default()),
        }
    }

    pub fn intent(&self) -> Intent {
        match self {
            IntentSlots::Create(_) => Intent::Create,
            IntentSlots::QueryAvailability(_) => Intent::QueryAvailability,
            IntentSlots::Update(_) => Intent::Update,
            IntentSlots::Cancel(_) => Intent::Cancel,
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == IntentSlots::empty(self.intent())
    }

    /// Fills missing values from `proposal`, which must be for the same intent.
    pub fn merge_missing(&mut self, proposal: IntentSlots) -> Result<(), DialogueError> {
        match (self, proposal) {
            (IntentSlots::Create(current), IntentSlots::Create(p)) => current.merge_missing(p),
            (IntentSlots::QueryAvailability(current), IntentSlots::QueryAvailability(p)) => {
                current.merge_missing(p)
            }
            (IntentSlots::Update(current), IntentSlots::Update(p)) => {
                fill_text(&mut current.event_id, p.event_id);
                current.criteria.merge_missing(p.criteria);
                current.changes.merge_missing(p.changes);
            }
            (IntentSlots::Cancel(current), IntentSlots::Cancel(p)) => {
                fill_text(&mut current.event_id, p.event_id);
                current.criteria.merge_missing(p.criteria);
            }
            (current, p) => {
                return Err(DialogueError::SlotsMismatch {
                    current: current.intent(),
                    proposed: p.intent(),
                })
            }
        }
        Ok(())
    }

    /// Fills missing selection criteria. No-op for intents without a target event.
    pub fn merge_criteria(&mut self, criteria: SelectionCriteria) {
        if let Some(current) = self.criteria_mut() {
            current.merge_missing(criteria);
        }
    }

    /// Fills missing change-set keys. No-op outside UPDATE.
    pub fn merge_changes(&mut self, changes: EventChanges) {
        if let IntentSlots::Update(slots) = self {
            slots.changes.merge_missing(changes);
        }
    }

    pub fn event_id(&self) -> Option<&str> {
        let id = match self {
            IntentSlots::Update(s) => s.event_id.as_deref(),
            IntentSlots::Cancel(s) => s.event_id.as_deref(),
            _ => None,
        };
        id.filter(|id| !id.is_empty())
    }

    /// Records the event chosen by the resolver or by the user.
    pub fn set_event_id(&mut self, event_id: impl Into<String>) -> Result<(), DialogueError> {
        match self {
            IntentSlots::Update(s) => s.event_id = Some(event_id.into()),
            IntentSlots::Cancel(s) => s.event_id = Some(event_id.into()),
            other => {
                return Err(DialogueError::SlotsMismatch {
                    current: other.intent(),
                    proposed: Intent::Update,
                })
            }
        }
        Ok(())
    }

    pub fn criteria(&self) -> Option<&SelectionCriteria> {
        match self {
            IntentSlots::Update(s) => Some(&s.criteria),
            IntentSlots::Cancel(s) => Some(&s.criteria),
            _ => None,
        }
    }

    fn criteria_mut(&mut self) -> Option<&mut SelectionCriteria> {
        match self {
            IntentSlots::Update(s) => Some(&mut s.criteria),
            IntentSlots::Cancel(s) => Some(&mut s.criteria),
            _ => None,
        }
    }

    /// Drops criteria that matched nothing so a later turn can supply new ones.
    pub fn clear_criteria(&mut self) {
        if let Some(criteria) = self.criteria_mut() {
            *criteria = SelectionCriteria::default();
        }
    }

    pub fn changes(&self) -> Option<&EventChanges> {
        match self {
            IntentSlots::Update(s) => Some(&s.changes),
            _ => None,
        }
    }
}
