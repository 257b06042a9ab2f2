//! Slot extraction: message text to structured slot proposals.
//!
//! Extraction is a pure transform. It never looks events up and never
//! touches storage; the orchestrator decides what to do with the result.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use chrono_tz::Tz;
use once_cell::sync::Lazy;
use regex::Regex;
use std::ops::Range;

use super::intent::{IntentClassifier, KeywordIntentClassifier};
use super::normalize::FoldedText;
use super::slots::{CreateSlots, EventChanges, IntentSlots, QuerySlots, SelectionCriteria};
use super::temporal::{
    self, day_window, default_day_for, local_to_utc, next_weekday, DateRole, TemporalScan,
    WeekMention,
};
use super::Intent;

const MAX_TITLE_CHARS: usize = 120;

/// Clock and timezone a turn is interpreted and executed in.
#[derive(Debug, Clone, Copy)]
pub struct TurnContext {
    pub timezone: Tz,
    pub now: DateTime<Utc>,
}

impl TurnContext {
    pub fn new(timezone: Tz, now: DateTime<Utc>) -> Self {
        Self { timezone, now }
    }

    pub fn today(&self) -> NaiveDate {
        temporal::local_today(self.timezone, self.now)
    }

    pub fn now_local(&self) -> NaiveDateTime {
        temporal::local_now(self.timezone, self.now)
    }
}

/// Result of one extraction.
///
/// `criteria` and `changes` are `None` for intents that do not use them,
/// and also when the text carried nothing for them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub proposed: IntentSlots,
    pub criteria: Option<SelectionCriteria>,
    pub changes: Option<EventChanges>,
}

impl Extraction {
    fn only(proposed: IntentSlots) -> Self {
        Self {
            proposed,
            criteria: None,
            changes: None,
        }
    }
}

/// Turns message text into slot proposals for an intent.
pub trait SlotExtractor: Send + Sync {
    /// Extracts proposals from `text`.
    ///
    /// `current` are the slots already collected for the task; extractors
    /// may read them to interpret follow-up messages but must not assume
    /// their proposals win (merging is fill-missing-only).
    fn extract(
        &self,
        intent: Intent,
        text: &str,
        current: Option<&IntentSlots>,
        ctx: &TurnContext,
    ) -> Extraction;
}

fn re(pattern: &str) -> Regex {
    Regex::new(pattern).expect("extractor pattern must compile")
}

static QUOTED: Lazy<Regex> = Lazy::new(|| re(r#"["“«]([^"”»]{1,120})["”»]"#));

static TITLE_MARKER: Lazy<Regex> = Lazy::new(|| {
    re(r"\b(?:con (?:el )?(?:titulo|nombre)|titulo|titulado|nombre|asunto|(?:evento|reunion|cita) llamad[oa]|que se llame)\s*:?\s+(?:de |es )?")
});

static NOUN_PHRASE: Lazy<Regex> = Lazy::new(|| {
    re(r"\b(?:reunion|llamada|videollamada|cita|turno|almuerzo|cena|desayuno|clase|entrevista|visita|consulta|sesion|evento|call|meet|partido|cumpleanos|charla|presentacion) (?:con|de|sobre|para|del|en|al) ")
});

static RENAME_MARKER: Lazy<Regex> = Lazy::new(|| {
    re(r"\b(?:renombr\w*(?: (?:a|como))?|(?:titulo|nombre) (?:a|por|como)|que se llame|ponele(?: de (?:titulo|nombre))?)\s+")
});

static CLAUSE_END: Lazy<Regex> = Lazy::new(|| re(r"[,.;!?]|\bpor favor\b|\bporfa\b"));

const TRAILING_FILLERS: &[&str] = &[
    "el", "la", "los", "las", "a", "al", "de", "del", "para", "por", "en", "y", "que", "desde",
    "hasta", "entre", "un", "una", "este", "esta",
];

/// Regex and vocabulary based extractor for Spanish messages.
#[derive(Debug, Clone, Default)]
pub struct RuleBasedSlotExtractor {
    classifier: KeywordIntentClassifier,
}

impl RuleBasedSlotExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    fn extract_create(
        &self,
        text: &str,
        folded: &FoldedText<'_>,
        scan: &TemporalScan,
        current: Option<&IntentSlots>,
    ) -> Extraction {
        let mut title = quoted(text)
            .or_else(|| marked_phrase(folded, scan, &TITLE_MARKER))
            .or_else(|| noun_phrase(folded, scan).map(|range| clean_title(folded.original(range))))
            .filter(|t| !t.is_empty());

        // A follow-up that is neither temporal nor an intent is the title.
        let follow_up = current.is_some_and(|slots| !slots.is_empty());
        let title_missing = matches!(current, Some(IntentSlots::Create(c)) if !c.has_title());
        if title.is_none()
            && follow_up
            && title_missing
            && scan.is_empty()
            && self.classifier.classify(text).is_none()
        {
            title = Some(clean_title(text)).filter(|t| !t.is_empty());
        }

        Extraction::only(IntentSlots::Create(CreateSlots {
            title,
            day: scan.first_date(),
            start_time: scan.start_time(),
            end_time: scan.end_time(),
            duration_minutes: scan.duration_minutes(),
        }))
    }

    fn extract_query(&self, scan: &TemporalScan, ctx: &TurnContext) -> Extraction {
        let tz = ctx.timezone;
        let now_local = ctx.now_local();
        let to_utc = |date: NaiveDate, time: NaiveTime| local_to_utc(tz, date, time);
        let hour = |h: u32| NaiveTime::from_hms_opt(h, 0, 0);

        let mut slots = QuerySlots::default();

        if let Some(week) = scan.week.filter(|_| scan.dates.is_empty()) {
            let next_monday = next_weekday(ctx.today(), chrono::Weekday::Mon);
            let (from, until) = match week {
                WeekMention::This => (Some(ctx.now), day_window(tz, next_monday).map(|w| w.0)),
                WeekMention::Next => (
                    day_window(tz, next_monday).map(|w| w.0),
                    day_window(tz, next_monday + Duration::days(7)).map(|w| w.0),
                ),
            };
            slots.range_start = from;
            slots.range_end = until;
            return Extraction::only(IntentSlots::QueryAvailability(slots));
        }

        let start = scan.start_time();
        let end = scan.end_time();
        let date = scan.first_date().or_else(|| {
            start
                .or(end)
                .map(|t| default_day_for(t, now_local))
                .or_else(|| scan.period.map(|_| ctx.today()))
        });
        let Some(date) = date else {
            return Extraction::only(IntentSlots::QueryAvailability(slots));
        };

        match (start, end) {
            (Some(s), Some(e)) => {
                slots.range_start = to_utc(date, s);
                slots.range_end = to_utc(date, e);
            }
            (Some(s), None) => {
                let minutes = i64::from(scan.duration_minutes().unwrap_or(60));
                let from = date.and_time(s);
                let until = from + Duration::minutes(minutes);
                slots.range_start = to_utc(from.date(), from.time());
                slots.range_end = to_utc(until.date(), until.time());
            }
            (None, Some(e)) => {
                slots.range_start = if date == ctx.today() {
                    Some(ctx.now)
                } else {
                    day_window(tz, date).map(|w| w.0)
                };
                slots.range_end = to_utc(date, e);
            }
            (None, None) => match scan.period {
                Some(period) => {
                    let (from, to) = period.hours();
                    slots.range_start = hour(from).and_then(|t| to_utc(date, t));
                    slots.range_end = hour(to).and_then(|t| to_utc(date, t));
                }
                None => {
                    let window = day_window(tz, date);
                    slots.range_start = window.map(|w| w.0);
                    slots.range_end = window.map(|w| w.1);
                }
            },
        }

        // An end at or before the start is asked for again.
        if let (Some(from), Some(until)) = (slots.range_start, slots.range_end) {
            if until <= from {
                slots.range_end = None;
            }
        }

        Extraction::only(IntentSlots::QueryAvailability(slots))
    }

    fn extract_update(
        &self,
        text: &str,
        folded: &FoldedText<'_>,
        scan: &TemporalScan,
        current: Option<&IntentSlots>,
    ) -> Extraction {
        let event_known = current.is_some_and(|slots| {
            slots.event_id().is_some() || slots.criteria().is_some_and(|c| !c.is_empty())
        });

        let rename = RENAME_MARKER.find(folded.as_str());
        let new_title = marked_phrase(folded, scan, &RENAME_MARKER);

        let hint = match rename {
            Some(marker) => quoted_before(text, folded.source_offset(marker.start())),
            None => quoted(text),
        }
        .map(|q| temporal_free_hint(&q))
        .or_else(|| noun_phrase(folded, scan).map(|range| folded.as_str()[range].trim().to_string()))
        .filter(|h| !h.is_empty());

        let source = scan.date_with_role(DateRole::Source);
        let target = scan.date_with_role(DateRole::Target);

        let criteria = if event_known {
            SelectionCriteria::default()
        } else {
            SelectionCriteria { date: source, hint }
        };

        let new_date = match (target, event_known) {
            (Some(target), _) => Some(target),
            (None, true) => source,
            (None, false) => None,
        };

        let start = scan.last_start_time();
        let duration = scan.duration_minutes().or_else(|| {
            match (scan.start_time(), scan.end_time()) {
                (Some(s), Some(e)) if e > s => u32::try_from((e - s).num_minutes()).ok(),
                _ => None,
            }
        });

        let changes = EventChanges {
            title: new_title,
            date: new_date,
            start_time: start,
            duration_minutes: duration,
        };

        Extraction {
            proposed: IntentSlots::empty(Intent::Update),
            criteria: Some(criteria).filter(|c| !c.is_empty()),
            changes: Some(changes).filter(|c| !c.is_empty()),
        }
    }

    fn extract_cancel(&self, text: &str, folded: &FoldedText<'_>, scan: &TemporalScan) -> Extraction {
        let hint = quoted(text)
            .map(|q| temporal_free_hint(&q))
            .or_else(|| noun_phrase(folded, scan).map(|range| folded.as_str()[range].trim().to_string()))
            .filter(|h| !h.is_empty());

        let criteria = SelectionCriteria {
            date: scan.first_date(),
            hint,
        };

        Extraction {
            proposed: IntentSlots::empty(Intent::Cancel),
            criteria: Some(criteria).filter(|c| !c.is_empty()),
            changes: None,
        }
    }
}

impl SlotExtractor for RuleBasedSlotExtractor {
    fn extract(
        &self,
        intent: Intent,
        text: &str,
        current: Option<&IntentSlots>,
        ctx: &TurnContext,
    ) -> Extraction {
        let folded = FoldedText::new(text);
        let scan = temporal::scan(folded.as_str(), ctx.today());

        match intent {
            Intent::Create => self.extract_create(text, &folded, &scan, current),
            Intent::QueryAvailability => self.extract_query(&scan, ctx),
            Intent::Update => self.extract_update(text, &folded, &scan, current),
            Intent::Cancel => self.extract_cancel(text, &folded, &scan),
        }
    }
}

fn quoted(text: &str) -> Option<String> {
    QUOTED
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| clean_title(m.as_str()))
        .filter(|t| !t.is_empty())
}

fn quoted_before(text: &str, limit: usize) -> Option<String> {
    QUOTED
        .captures_iter(text)
        .filter(|caps| caps.get(0).is_some_and(|m| m.end() <= limit))
        .find_map(|caps| caps.get(1))
        .map(|m| clean_title(m.as_str()))
        .filter(|t| !t.is_empty())
}

fn temporal_free_hint(text: &str) -> String {
    super::normalize::normalize(text)
}

/// Folded range from `from` up to the end of the clause it starts.
///
/// The clause ends at the next temporal mention, punctuation or the end of
/// the text; trailing prepositions and articles are dropped.
fn clause_from(folded: &FoldedText<'_>, scan: &TemporalScan, from: usize) -> Range<usize> {
    let text = folded.as_str();
    let mut end = text.len();
    if let Some(pos) = scan.next_mention_from(from) {
        end = end.min(pos);
    }
    if let Some(m) = CLAUSE_END.find_at(text, from) {
        end = end.min(m.start());
    }

    let mut range = from..end.max(from);
    loop {
        let segment = text[range.clone()].trim_end();
        let trimmed_len = segment.len();
        let last_word_start = segment.rfind(' ').map(|i| i + 1).unwrap_or(0);
        let last_word = &segment[last_word_start..];
        if !segment.is_empty() && TRAILING_FILLERS.contains(&last_word) {
            range.end = range.start + last_word_start;
            continue;
        }
        range.end = range.start + trimmed_len;
        return range;
    }
}

fn marked_phrase(folded: &FoldedText<'_>, scan: &TemporalScan, marker: &Regex) -> Option<String> {
    let found = marker.find(folded.as_str())?;
    let rest = folded.original(found.end()..folded.as_str().len());
    if rest.starts_with(|c: char| matches!(c, '"' | '“' | '«')) {
        return quoted(rest);
    }
    let range = clause_from(folded, scan, found.end());
    if range.is_empty() {
        return None;
    }
    Some(clean_title(folded.original(range))).filter(|t| !t.is_empty())
}

/// "reunion con ana", "almuerzo de trabajo": an event noun with a connector
/// and at least one word of its own before the clause ends.
fn noun_phrase(folded: &FoldedText<'_>, scan: &TemporalScan) -> Option<Range<usize>> {
    let found = NOUN_PHRASE
        .find_iter(folded.as_str())
        .find(|m| !scan.covers(m.start()))?;
    let tail = clause_from(folded, scan, found.end());
    if tail.is_empty() {
        return None;
    }
    Some(found.start()..tail.end)
}

fn clean_title(raw: &str) -> String {
    let trimmed = raw.trim_matches(|c: char| {
        c.is_whitespace() || matches!(c, ',' | '.' | ';' | ':' | '!' | '?' | '¿' | '¡' | '"' | '\'' | '“' | '”' | '«' | '»')
    });
    let collapsed = trimmed.split_whitespace().collect::<Vec<_>>().join(" ");
    let limited: String = collapsed.chars().take(MAX_TITLE_CHARS).collect();

    let mut chars = limited.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
