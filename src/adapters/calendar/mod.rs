//! Calendar adapters.
//!
//! - `InMemoryCalendar` - configurable fake for tests and local development
//! - `GoogleCalendarClient` - Google Calendar v3 REST client

mod google;
mod in_memory;

pub use google::{GoogleCalendarClient, GoogleCalendarConfig};
pub use in_memory::{ExecutedAction, InMemoryCalendar};

use chrono::{NaiveDateTime, NaiveTime};
use chrono_tz::Tz;

use crate::domain::dialogue::replies;
use crate::ports::{CalendarEvent, EventTime};

/// Local wall-clock view of an event time; whole days start at midnight.
fn local_time(time: &EventTime, tz: Tz) -> NaiveDateTime {
    match time {
        EventTime::DateTime(instant) => instant.with_timezone(&tz).naive_local(),
        EventTime::Date(date) => date.and_time(NaiveTime::MIN),
    }
}

/// Local start and end of an event.
fn local_span(event: &CalendarEvent, tz: Tz) -> (NaiveDateTime, NaiveDateTime) {
    (local_time(&event.start, tz), local_time(&event.end, tz))
}

fn title_of(event: &CalendarEvent) -> String {
    event
        .title
        .clone()
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(replies::untitled_event)
}

/// Short description of when an event happens, for summaries.
fn describe_when(event: &CalendarEvent, tz: Tz) -> String {
    match event.start {
        EventTime::Date(date) => format!("{}, {}", replies::format_day(date), replies::ALL_DAY),
        EventTime::DateTime(_) => replies::format_moment(local_time(&event.start, tz)),
    }
}
