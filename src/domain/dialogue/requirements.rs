//! Minimum fields an intent needs before it can be executed.

use super::IntentSlots;

/// A requirement that is still unmet, named the way the user sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MissingField {
    Title,
    Start,
    EndOrDuration,
    RangeStart,
    RangeEnd,
    Event,
    Changes,
}

impl MissingField {
    pub fn label(&self) -> &'static str {
        match self {
            MissingField::Title => "titulo",
            MissingField::Start => "inicio",
            MissingField::EndOrDuration => "fin o duracion",
            MissingField::RangeStart => "desde",
            MissingField::RangeEnd => "hasta",
            MissingField::Event => "evento",
            MissingField::Changes => "cambios",
        }
    }
}

/// Unmet requirements of `slots`, in the order they are asked for.
///
/// An empty result means the task is ready to execute.
pub fn missing_fields(slots: &IntentSlots) -> Vec<MissingField> {
    let mut missing = Vec::new();
    match slots {
        IntentSlots::Create(s) => {
            if s.start_time.is_none() {
                missing.push(MissingField::Start);
            }
            if !s.has_end_or_duration() {
                missing.push(MissingField::EndOrDuration);
            }
            if !s.has_title() {
                missing.push(MissingField::Title);
            }
        }
        IntentSlots::QueryAvailability(s) => {
            if s.range_start.is_none() {
                missing.push(MissingField::RangeStart);
            }
            if s.range_end.is_none() {
                missing.push(MissingField::RangeEnd);
            }
        }
        IntentSlots::Update(s) => {
            if slots.event_id().is_none() {
                missing.push(MissingField::Event);
            }
            if s.changes.is_empty() {
                missing.push(MissingField::Changes);
            }
        }
        IntentSlots::Cancel(_) => {
            if slots.event_id().is_none() {
                missing.push(MissingField::Event);
            }
        }
    }
    missing
}
