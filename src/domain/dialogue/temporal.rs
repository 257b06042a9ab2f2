//! Spanish date, time and duration expressions.
//!
//! [`scan`] works on normalized text (see [`super::normalize`]) and reports
//! every mention together with its byte span, so callers can both read the
//! values and cut the surrounding text (titles, hints) around them.
//! Overlapping matches are settled by priority: durations, then dates, then
//! time ranges, then single times.

use chrono::{
    DateTime, Datelike, Duration, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone,
    Timelike, Utc, Weekday,
};
use chrono_tz::Tz;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::ops::Range;

/// Whether a date identifies the existing event or its new placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateRole {
    Source,
    Target,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateMention {
    pub date: NaiveDate,
    pub role: DateRole,
    pub span: Range<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeRole {
    Start,
    End,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeMention {
    pub time: NaiveTime,
    pub role: TimeRole,
    pub span: Range<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DurationMention {
    pub minutes: u32,
    pub span: Range<usize>,
}

/// Part of the day named without a clock time ("a la tarde").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayPeriod {
    Morning,
    Afternoon,
    Evening,
}

impl DayPeriod {
    /// Local hour window `[from, to)` covered by the period.
    pub fn hours(&self) -> (u32, u32) {
        match self {
            DayPeriod::Morning => (8, 12),
            DayPeriod::Afternoon => (13, 19),
            DayPeriod::Evening => (19, 23),
        }
    }

    fn from_word(word: &str) -> Option<Self> {
        match word {
            "manana" => Some(DayPeriod::Morning),
            "tarde" => Some(DayPeriod::Afternoon),
            "noche" => Some(DayPeriod::Evening),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeekMention {
    This,
    Next,
}

/// Everything temporal found in one message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemporalScan {
    pub dates: Vec<DateMention>,
    pub times: Vec<TimeMention>,
    pub durations: Vec<DurationMention>,
    pub period: Option<DayPeriod>,
    pub week: Option<WeekMention>,
    spans: Vec<Range<usize>>,
}

impl TemporalScan {
    /// True when the message carries no temporal content at all.
    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.dates.first().map(|d| d.date)
    }

    pub fn date_with_role(&self, role: DateRole) -> Option<NaiveDate> {
        self.dates.iter().find(|d| d.role == role).map(|d| d.date)
    }

    pub fn start_time(&self) -> Option<NaiveTime> {
        self.times
            .iter()
            .find(|t| t.role == TimeRole::Start)
            .map(|t| t.time)
    }

    pub fn end_time(&self) -> Option<NaiveTime> {
        self.times
            .iter()
            .find(|t| t.role == TimeRole::End)
            .map(|t| t.time)
    }

    /// Last start time mentioned; for "de las 10 a las 11" style updates the
    /// new value is the one said last.
    pub fn last_start_time(&self) -> Option<NaiveTime> {
        self.times
            .iter()
            .rev()
            .find(|t| t.role == TimeRole::Start)
            .map(|t| t.time)
    }

    pub fn duration_minutes(&self) -> Option<u32> {
        self.durations.first().map(|d| d.minutes)
    }

    /// Byte offset of the first temporal mention at or after `pos`.
    pub fn next_mention_from(&self, pos: usize) -> Option<usize> {
        self.spans
            .iter()
            .filter(|s| s.start >= pos)
            .map(|s| s.start)
            .min()
    }

    /// True when `pos` falls inside any mention.
    pub fn covers(&self, pos: usize) -> bool {
        self.spans.iter().any(|s| s.contains(&pos))
    }
}

#[derive(Default)]
struct Claims(Vec<Range<usize>>);

impl Claims {
    fn claim(&mut self, span: &Range<usize>) -> bool {
        if self
            .0
            .iter()
            .any(|r| r.start < span.end && span.start < r.end)
        {
            return false;
        }
        self.0.push(span.clone());
        true
    }
}

fn re(pattern: &str) -> Regex {
    Regex::new(pattern).expect("temporal pattern must compile")
}

static DURATION: Lazy<Regex> = Lazy::new(|| {
    re(r"\b(?:por |durante )?(\d{1,3}|una?|media) (horas?|minutos?|mins?)\b( y media\b)?")
});
static HOUR_AND_HALF: Lazy<Regex> = Lazy::new(|| re(r"\b(?:por |durante )?hora y media\b"));

static RELATIVE_DAY: Lazy<Regex> = Lazy::new(|| re(r"\b(pasado manana|manana|hoy)\b"));
static WEEKDAY: Lazy<Regex> = Lazy::new(|| {
    re(r"\b(?:el proximo |el |este |proximo )?(lunes|martes|miercoles|jueves|viernes|sabado|domingo)(?: que viene| proximo)?\b")
});
static MONTH_DATE: Lazy<Regex> = Lazy::new(|| {
    re(r"\b(\d{1,2}) de (enero|febrero|marzo|abril|mayo|junio|julio|agosto|septiembre|setiembre|octubre|noviembre|diciembre)(?: (?:de |del )?(\d{4}))?\b")
});
static ISO_DATE: Lazy<Regex> = Lazy::new(|| re(r"\b(\d{4})-(\d{1,2})-(\d{1,2})\b"));
static NUMERIC_DATE: Lazy<Regex> =
    Lazy::new(|| re(r"\b(\d{1,2})/(\d{1,2})(?:/(\d{2}|\d{4}))?\b"));
static DAY_OF_MONTH: Lazy<Regex> = Lazy::new(|| re(r"\b(?:el dia|dia|el) (\d{1,2})\b"));

static TIME_RANGE: Lazy<Regex> = Lazy::new(|| {
    re(r"\b(?:de|desde|entre)(?: las?)? (\d{1,2}|una)(?:[:.](\d{2}))?(?: ?(hs|h|am|pm))? (?:a|hasta|y)(?: las?)? (\d{1,2}|una)(?:[:.](\d{2}))?(?: ?(hs|h|am|pm))?(?: (?:de la|a la|por la|en la) (manana|tarde|noche))?\b")
});
static SINGLE_TIME: Lazy<Regex> = Lazy::new(|| {
    re(r"\b(?:(desde|hasta|a|para) )?las? (\d{1,2}|una)(?:[:.](\d{2}))?(?: ?(hs|h|am|pm))?(?: (y media|y cuarto|menos cuarto))?(?: (?:de la|a la|por la|en la) (manana|tarde|noche))?\b")
});
static CLOCK_TIME: Lazy<Regex> =
    Lazy::new(|| re(r"\b(\d{1,2}):(\d{2})(?: ?(hs|h|am|pm))?\b"));
static SUFFIXED_HOUR: Lazy<Regex> = Lazy::new(|| re(r"\b(\d{1,2}) ?(hs|h|am|pm)\b"));
static MIDDAY: Lazy<Regex> = Lazy::new(|| re(r"\b(?:al |a )?mediodia\b"));

static PERIOD: Lazy<Regex> =
    Lazy::new(|| re(r"\b(?:a la|por la|de la|en la|esta) (manana|tarde|noche)\b"));
static WEEK: Lazy<Regex> = Lazy::new(|| {
    re(r"\b(esta semana|la semana que viene|la proxima semana|proxima semana)\b")
});

const TARGET_MARKERS: &[&str] = &["al", "para", "hasta", "a"];
const ROLE_FILLERS: &[&str] = &["el", "dia", "este", "proximo"];

/// Scans normalized text for temporal expressions relative to `today`.
pub fn scan(text: &str, today: NaiveDate) -> TemporalScan {
    let mut claims = Claims::default();
    let mut out = TemporalScan::default();

    scan_durations(text, &mut claims, &mut out);
    scan_dates(text, today, &mut claims, &mut out);
    scan_time_ranges(text, &mut claims, &mut out);
    scan_single_times(text, &mut claims, &mut out);

    for m in WEEK.find_iter(text) {
        if claims.claim(&m.range()) && out.week.is_none() {
            out.week = Some(if m.as_str() == "esta semana" {
                WeekMention::This
            } else {
                WeekMention::Next
            });
        }
    }

    for caps in PERIOD.captures_iter(text) {
        let whole = group_span(&caps);
        if claims.claim(&whole) && out.period.is_none() {
            out.period = caps.get(1).and_then(|m| DayPeriod::from_word(m.as_str()));
        }
    }

    out.dates.sort_by_key(|d| d.span.start);
    out.times.sort_by_key(|t| t.span.start);
    out.durations.sort_by_key(|d| d.span.start);
    out.spans = claims.0;
    out.spans.sort_by_key(|s| s.start);
    out
}

fn group_span(caps: &Captures<'_>) -> Range<usize> {
    caps.get(0).map(|m| m.range()).unwrap_or(0..0)
}

fn scan_durations(text: &str, claims: &mut Claims, out: &mut TemporalScan) {
    for caps in DURATION.captures_iter(text) {
        let span = group_span(&caps);
        let qty = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
        let unit = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
        let plus_half = caps.get(3).is_some();

        let minutes = if unit.starts_with("hora") {
            match qty {
                "media" => Some(30),
                "un" | "una" => Some(60),
                digits => digits.parse::<u32>().ok().map(|h| h * 60),
            }
            .map(|m| if plus_half { m + 30 } else { m })
        } else {
            match qty {
                "media" => None,
                "un" | "una" => Some(1),
                digits => digits.parse::<u32>().ok(),
            }
        };

        if let Some(minutes) = minutes.filter(|m| *m > 0) {
            if claims.claim(&span) {
                out.durations.push(DurationMention { minutes, span });
            }
        }
    }

    for m in HOUR_AND_HALF.find_iter(text) {
        let span = m.range();
        if claims.claim(&span) {
            out.durations.push(DurationMention { minutes: 90, span });
        }
    }
}

fn scan_dates(text: &str, today: NaiveDate, claims: &mut Claims, out: &mut TemporalScan) {
    let mut push = |date: Option<NaiveDate>, span: Range<usize>, out: &mut TemporalScan| {
        if let Some(date) = date {
            if claims.claim(&span) {
                let role = role_before(text, span.start);
                out.dates.push(DateMention { date, role, span });
            }
        }
    };

    for caps in RELATIVE_DAY.captures_iter(text) {
        let span = group_span(&caps);
        let word = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
        let before = &text[..span.start];
        if word == "manana" && (before.ends_with("la ") || before.ends_with("esta ")) {
            continue;
        }
        let offset = match word {
            "hoy" => 0,
            "manana" => 1,
            _ => 2,
        };
        push(Some(today + Duration::days(offset)), span, out);
    }

    for caps in WEEKDAY.captures_iter(text) {
        let span = group_span(&caps);
        let date = caps
            .get(1)
            .and_then(|m| weekday_from_word(m.as_str()))
            .map(|wd| next_weekday(today, wd));
        push(date, span, out);
    }

    for caps in MONTH_DATE.captures_iter(text) {
        let span = group_span(&caps);
        let day = caps.get(1).and_then(|m| m.as_str().parse::<u32>().ok());
        let month = caps.get(2).and_then(|m| month_from_word(m.as_str()));
        let year = caps.get(3).and_then(|m| m.as_str().parse::<i32>().ok());
        let date = match (day, month) {
            (Some(d), Some(m)) => resolve_day_month(today, d, m, year),
            _ => None,
        };
        push(date, span, out);
    }

    for caps in ISO_DATE.captures_iter(text) {
        let span = group_span(&caps);
        let parts: Vec<Option<u32>> = (1..=3)
            .map(|i| caps.get(i).and_then(|m| m.as_str().parse::<u32>().ok()))
            .collect();
        let date = match parts.as_slice() {
            [Some(y), Some(m), Some(d)] => NaiveDate::from_ymd_opt(*y as i32, *m, *d),
            _ => None,
        };
        push(date, span, out);
    }

    for caps in NUMERIC_DATE.captures_iter(text) {
        let span = group_span(&caps);
        let day = caps.get(1).and_then(|m| m.as_str().parse::<u32>().ok());
        let month = caps.get(2).and_then(|m| m.as_str().parse::<u32>().ok());
        let year = caps.get(3).and_then(|m| m.as_str().parse::<i32>().ok()).map(|y| {
            if y < 100 {
                2000 + y
            } else {
                y
            }
        });
        let date = match (day, month) {
            (Some(d), Some(m)) => resolve_day_month(today, d, m, year),
            _ => None,
        };
        push(date, span, out);
    }

    for caps in DAY_OF_MONTH.captures_iter(text) {
        let span = group_span(&caps);
        if matches!(text[span.end..].chars().next(), Some(':') | Some('/') | Some('.')) {
            continue;
        }
        let date = caps
            .get(1)
            .and_then(|m| m.as_str().parse::<u32>().ok())
            .and_then(|d| next_day_of_month(today, d));
        push(date, span, out);
    }
}

fn scan_time_ranges(text: &str, claims: &mut Claims, out: &mut TemporalScan) {
    for caps in TIME_RANGE.captures_iter(text) {
        let span = group_span(&caps);
        let text_of = |i: usize| caps.get(i).map(|m| m.as_str());
        let period = text_of(7);
        let start_suffix = text_of(3);
        let end_suffix = text_of(6);

        let start = text_of(1).and_then(|h| build_time(h, text_of(2), start_suffix, period, None));
        let end_qualified = end_suffix.is_some() || period.is_some();
        let end = text_of(4).and_then(|h| build_time(h, text_of(5), end_suffix, period, None));

        let (Some(start), Some(mut end)) = (start, end) else {
            continue;
        };
        if end <= start && !end_qualified {
            let later = end + Duration::hours(12);
            if later > start && later.hour() >= 12 {
                end = later;
            }
        }
        if end <= start {
            continue;
        }

        if claims.claim(&span) {
            out.times.push(TimeMention {
                time: start,
                role: TimeRole::Start,
                span: span.clone(),
            });
            out.times.push(TimeMention {
                time: end,
                role: TimeRole::End,
                span,
            });
        }
    }
}

fn scan_single_times(text: &str, claims: &mut Claims, out: &mut TemporalScan) {
    for caps in SINGLE_TIME.captures_iter(text) {
        let span = group_span(&caps);
        let text_of = |i: usize| caps.get(i).map(|m| m.as_str());
        let role = if text_of(1) == Some("hasta") {
            TimeRole::End
        } else {
            TimeRole::Start
        };
        let time = text_of(2)
            .and_then(|h| build_time(h, text_of(3), text_of(4), text_of(6), text_of(5)));
        if let Some(time) = time {
            if claims.claim(&span) {
                out.times.push(TimeMention { time, role, span });
            }
        }
    }

    for caps in CLOCK_TIME.captures_iter(text) {
        let span = group_span(&caps);
        let text_of = |i: usize| caps.get(i).map(|m| m.as_str());
        let time = text_of(1).and_then(|h| build_time(h, text_of(2), text_of(3), None, None));
        if let Some(time) = time {
            if claims.claim(&span) {
                let role = bare_time_role(text, span.start);
                out.times.push(TimeMention { time, role, span });
            }
        }
    }

    for caps in SUFFIXED_HOUR.captures_iter(text) {
        let span = group_span(&caps);
        let text_of = |i: usize| caps.get(i).map(|m| m.as_str());
        let time = text_of(1).and_then(|h| build_time(h, None, text_of(2), None, None));
        if let Some(time) = time {
            if claims.claim(&span) {
                let role = bare_time_role(text, span.start);
                out.times.push(TimeMention { time, role, span });
            }
        }
    }

    let Some(noon) = NaiveTime::from_hms_opt(12, 0, 0) else {
        return;
    };
    for m in MIDDAY.find_iter(text) {
        let span = m.range();
        if claims.claim(&span) {
            let role = bare_time_role(text, span.start);
            out.times.push(TimeMention {
                time: noon,
                role,
                span,
            });
        }
    }
}

fn bare_time_role(text: &str, start: usize) -> TimeRole {
    match previous_word(text, start) {
        Some("hasta") => TimeRole::End,
        _ => TimeRole::Start,
    }
}

fn previous_word(text: &str, start: usize) -> Option<&str> {
    text[..start]
        .split_whitespace()
        .last()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
}

fn role_before(text: &str, start: usize) -> DateRole {
    let words = text[..start]
        .split_whitespace()
        .rev()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()));

    for word in words {
        if ROLE_FILLERS.contains(&word) {
            continue;
        }
        return if TARGET_MARKERS.contains(&word) {
            DateRole::Target
        } else {
            DateRole::Source
        };
    }
    DateRole::Source
}

/// Builds a clock time applying Spanish meridiem conventions.
///
/// An explicit `pm`/"de la tarde"/"de la noche" moves morning hours to the
/// afternoon, `am`/"de la manana" keeps them (and maps 12 to 0), and an
/// unqualified hour between 1 and 7 is read as afternoon.
fn build_time(
    hour: &str,
    minute: Option<&str>,
    suffix: Option<&str>,
    period: Option<&str>,
    fraction: Option<&str>,
) -> Option<NaiveTime> {
    let hour = if hour == "una" {
        1
    } else {
        hour.parse::<u32>().ok()?
    };
    let mut minute = match minute {
        Some(m) => m.parse::<u32>().ok()?,
        None => 0,
    };

    let pm = suffix == Some("pm") || matches!(period, Some("tarde") | Some("noche"));
    let am = suffix == Some("am") || period == Some("manana");
    let mut hour = if hour > 23 {
        return None;
    } else if pm {
        if hour < 12 {
            hour + 12
        } else {
            hour
        }
    } else if am {
        if hour == 12 {
            0
        } else {
            hour
        }
    } else if (1..=7).contains(&hour) {
        hour + 12
    } else {
        hour
    };

    match fraction {
        Some("y media") => minute = 30,
        Some("y cuarto") => minute = 15,
        Some("menos cuarto") => {
            hour = hour.checked_sub(1)?;
            minute = 45;
        }
        _ => {}
    }

    if hour > 23 {
        return None;
    }
    NaiveTime::from_hms_opt(hour, minute, 0)
}

fn weekday_from_word(word: &str) -> Option<Weekday> {
    match word {
        "lunes" => Some(Weekday::Mon),
        "martes" => Some(Weekday::Tue),
        "miercoles" => Some(Weekday::Wed),
        "jueves" => Some(Weekday::Thu),
        "viernes" => Some(Weekday::Fri),
        "sabado" => Some(Weekday::Sat),
        "domingo" => Some(Weekday::Sun),
        _ => None,
    }
}

fn month_from_word(word: &str) -> Option<u32> {
    let month = match word {
        "enero" => 1,
        "febrero" => 2,
        "marzo" => 3,
        "abril" => 4,
        "mayo" => 5,
        "junio" => 6,
        "julio" => 7,
        "agosto" => 8,
        "septiembre" | "setiembre" => 9,
        "octubre" => 10,
        "noviembre" => 11,
        "diciembre" => 12,
        _ => return None,
    };
    Some(month)
}

/// Next occurrence of `weekday` strictly after `today`.
pub fn next_weekday(today: NaiveDate, weekday: Weekday) -> NaiveDate {
    let current = today.weekday().num_days_from_monday() as i64;
    let target = weekday.num_days_from_monday() as i64;
    let mut diff = (target - current).rem_euclid(7);
    if diff == 0 {
        diff = 7;
    }
    today + Duration::days(diff)
}

fn resolve_day_month(today: NaiveDate, day: u32, month: u32, year: Option<i32>) -> Option<NaiveDate> {
    match year {
        Some(year) => NaiveDate::from_ymd_opt(year, month, day),
        None => {
            let this_year = NaiveDate::from_ymd_opt(today.year(), month, day);
            match this_year {
                Some(date) if date >= today => Some(date),
                _ => NaiveDate::from_ymd_opt(today.year() + 1, month, day),
            }
        }
    }
}

fn next_day_of_month(today: NaiveDate, day: u32) -> Option<NaiveDate> {
    let (mut year, mut month) = (today.year(), today.month());
    for _ in 0..13 {
        if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
            if date >= today {
                return Some(date);
            }
        }
        month += 1;
        if month > 12 {
            month = 1;
            year += 1;
        }
    }
    None
}

/// Local calendar date of `now` in `tz`.
pub fn local_today(tz: Tz, now: DateTime<Utc>) -> NaiveDate {
    now.with_timezone(&tz).date_naive()
}

/// Local wall-clock time of `now` in `tz`.
pub fn local_now(tz: Tz, now: DateTime<Utc>) -> NaiveDateTime {
    now.with_timezone(&tz).naive_local()
}

/// Day a bare clock time refers to: today, or tomorrow once it has passed.
pub fn default_day_for(time: NaiveTime, now_local: NaiveDateTime) -> NaiveDate {
    let today = now_local.date();
    if time <= now_local.time() {
        today + Duration::days(1)
    } else {
        today
    }
}

/// Converts a local wall-clock moment to UTC.
///
/// Ambiguous moments (DST fall-back) resolve to the earliest instant;
/// moments skipped by a DST gap have no instant and return `None`.
pub fn local_to_utc(tz: Tz, date: NaiveDate, time: NaiveTime) -> Option<DateTime<Utc>> {
    match tz.from_local_datetime(&date.and_time(time)) {
        LocalResult::Single(dt) => Some(dt.with_timezone(&Utc)),
        LocalResult::Ambiguous(earliest, _) => Some(earliest.with_timezone(&Utc)),
        LocalResult::None => None,
    }
}

fn start_of_day(tz: Tz, date: NaiveDate) -> Option<DateTime<Utc>> {
    // Some zones start DST at midnight, so the day begins at 01:00.
    (0..=1)
        .filter_map(|h| NaiveTime::from_hms_opt(h, 0, 0))
        .find_map(|t| local_to_utc(tz, date, t))
}

/// UTC bounds of the local day `[00:00, 24:00)`.
pub fn day_window(tz: Tz, date: NaiveDate) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let start = start_of_day(tz, date)?;
    let end = start_of_day(tz, date.succ_opt()?)?;
    Some((start, end))
}

#[cfg(test)]
mod tests {
    use super::*;

    // A Wednesday.
    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 12).unwrap()
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn relative_day_with_time() {
        let scan = scan("manana a las 10", today());
        assert_eq!(scan.first_date(), Some(d(2025, 3, 13)));
        assert_eq!(scan.start_time(), Some(t(10, 0)));
        assert_eq!(scan.end_time(), None);
    }

    #[test]
    fn pasado_manana() {
        assert_eq!(scan("pasado manana", today()).first_date(), Some(d(2025, 3, 14)));
    }

    #[test]
    fn morning_qualifier_is_not_tomorrow() {
        let scan = scan("a las 10 de la manana", today());
        assert!(scan.dates.is_empty());
        assert_eq!(scan.start_time(), Some(t(10, 0)));
    }

    #[test]
    fn weekday_with_afternoon_qualifier() {
        let scan = scan("el viernes a las 3 de la tarde", today());
        assert_eq!(scan.first_date(), Some(d(2025, 3, 14)));
        assert_eq!(scan.start_time(), Some(t(15, 0)));
    }

    #[test]
    fn same_weekday_means_next_week() {
        assert_eq!(scan("el miercoles", today()).first_date(), Some(d(2025, 3, 19)));
    }

    #[test]
    fn unqualified_early_hours_are_afternoon() {
        assert_eq!(scan("a las 5", today()).start_time(), Some(t(17, 0)));
        assert_eq!(scan("a las 9", today()).start_time(), Some(t(9, 0)));
        assert_eq!(scan("a la una", today()).start_time(), Some(t(13, 0)));
    }

    #[test]
    fn half_and_quarter_hours() {
        assert_eq!(scan("a las 10 y media", today()).start_time(), Some(t(10, 30)));
        assert_eq!(scan("a las 9 y cuarto", today()).start_time(), Some(t(9, 15)));
        assert_eq!(scan("a las 10:45", today()).start_time(), Some(t(10, 45)));
    }

    #[test]
    fn time_range() {
        let scan = scan("de 10 a 12", today());
        assert_eq!(scan.start_time(), Some(t(10, 0)));
        assert_eq!(scan.end_time(), Some(t(12, 0)));
    }

    #[test]
    fn evening_range_keeps_end_after_start() {
        let scan = scan("entre las 7 y las 9", today());
        assert_eq!(scan.start_time(), Some(t(19, 0)));
        assert_eq!(scan.end_time(), Some(t(21, 0)));
    }

    #[test]
    fn until_is_end_time() {
        let scan = scan("hasta las 12", today());
        assert_eq!(scan.start_time(), None);
        assert_eq!(scan.end_time(), Some(t(12, 0)));
    }

    #[test]
    fn named_month_rolls_forward_when_past() {
        assert_eq!(scan("el 15 de marzo", today()).first_date(), Some(d(2025, 3, 15)));
        assert_eq!(scan("el 10 de marzo", today()).first_date(), Some(d(2026, 3, 10)));
        assert_eq!(
            scan("el 10 de marzo de 2027", today()).first_date(),
            Some(d(2027, 3, 10))
        );
    }

    #[test]
    fn numeric_dates() {
        assert_eq!(scan("el 20/3", today()).first_date(), Some(d(2025, 3, 20)));
        assert_eq!(scan("el 1/2", today()).first_date(), Some(d(2026, 2, 1)));
        assert_eq!(scan("2025-04-01", today()).first_date(), Some(d(2025, 4, 1)));
    }

    #[test]
    fn durations() {
        assert_eq!(scan("por una hora", today()).duration_minutes(), Some(60));
        assert_eq!(scan("hora y media", today()).duration_minutes(), Some(90));
        assert_eq!(scan("media hora", today()).duration_minutes(), Some(30));
        assert_eq!(scan("2 horas y media", today()).duration_minutes(), Some(150));
        assert_eq!(scan("45 minutos", today()).duration_minutes(), Some(45));
    }

    #[test]
    fn date_roles_follow_prepositions() {
        let scan = scan("mover la reunion del lunes para el martes", today());
        assert_eq!(scan.date_with_role(DateRole::Source), Some(d(2025, 3, 17)));
        assert_eq!(scan.date_with_role(DateRole::Target), Some(d(2025, 3, 18)));
    }

    #[test]
    fn week_and_period_mentions() {
        let scan = scan("estoy libre esta semana", today());
        assert_eq!(scan.week, Some(WeekMention::This));
        let scan = super::scan("el viernes a la tarde", today());
        assert_eq!(scan.period, Some(DayPeriod::Afternoon));
    }

    #[test]
    fn plain_text_has_no_mentions() {
        let scan = scan("reunion con el equipo de ventas", today());
        assert!(scan.is_empty());
    }

    #[test]
    fn spans_allow_cutting_text() {
        let text = "reunion con ana manana a las 10";
        let scan = scan(text, today());
        let cut = scan.next_mention_from(0).unwrap();
        assert_eq!(&text[..cut], "reunion con ana ");
        assert!(scan.covers(cut));
    }

    #[test]
    fn converts_buenos_aires_to_utc() {
        let tz: Tz = "America/Argentina/Buenos_Aires".parse().unwrap();
        let utc = local_to_utc(tz, d(2025, 3, 13), t(10, 0)).unwrap();
        assert_eq!(utc.hour(), 13);
    }

    #[test]
    fn day_window_spans_local_day() {
        let tz: Tz = "America/Argentina/Buenos_Aires".parse().unwrap();
        let (start, end) = day_window(tz, d(2025, 3, 13)).unwrap();
        assert_eq!(start.to_rfc3339(), "2025-03-13T03:00:00+00:00");
        assert_eq!(end - start, Duration::hours(24));
    }

    #[test]
    fn bare_time_defaults_to_next_occurrence() {
        let now = d(2025, 3, 12).and_time(t(11, 0));
        assert_eq!(default_day_for(t(15, 0), now), d(2025, 3, 12));
        assert_eq!(default_day_for(t(9, 0), now), d(2025, 3, 13));
    }
}
