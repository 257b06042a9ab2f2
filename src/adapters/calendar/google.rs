//! Google Calendar v3 client - implements both calendar ports over REST.
//!
//! # Configuration
//!
//! ```ignore
//! let config = GoogleCalendarConfig::new()
//!     .with_calendar_id("primary")
//!     .with_timeout(Duration::from_secs(8));
//!
//! let client = GoogleCalendarClient::new(config, token_source)?;
//! ```
//!
//! Access tokens come from an [`AccessTokenSource`] on every call, so the
//! client itself holds no per-identity state.
//!
//! # Actions
//!
//! | Intent | Calls |
//! |--------|-------|
//! | CREATE | `events.insert` |
//! | QUERY_AVAILABILITY | `freeBusy.query` |
//! | UPDATE | `events.get` then `events.patch` |
//! | CANCEL | `events.get` then `events.delete` |

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use chrono_tz::Tz;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use super::{describe_when, local_span, title_of};
use crate::domain::dialogue::{replies, IntentSlots, TurnContext};
use crate::domain::foundation::Identity;
use crate::ports::{
    AccessTokenSource, CalendarError, CalendarEvent, CalendarExecutor, CalendarReader, EventTime,
    ExecutionOutcome,
};

const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/calendar/v3";
const PAGE_SIZE: &str = "250";
const MAX_PAGES: usize = 4;

/// Configuration for the Google Calendar client.
#[derive(Debug, Clone)]
pub struct GoogleCalendarConfig {
    /// API root (default: https://www.googleapis.com/calendar/v3).
    pub base_url: String,
    /// Calendar acted on (default: "primary").
    pub calendar_id: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for GoogleCalendarConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            calendar_id: "primary".to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

impl GoogleCalendarConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_calendar_id(mut self, calendar_id: impl Into<String>) -> Self {
        self.calendar_id = calendar_id.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Google Calendar REST client.
pub struct GoogleCalendarClient {
    config: GoogleCalendarConfig,
    client: Client,
    tokens: Arc<dyn AccessTokenSource>,
}

impl GoogleCalendarClient {
    /// Creates a client with its own connection pool.
    ///
    /// # Errors
    /// Returns `CalendarError::Unavailable` if the HTTP client cannot be built
    /// or the base URL does not parse
    pub fn new(
        config: GoogleCalendarConfig,
        tokens: Arc<dyn AccessTokenSource>,
    ) -> Result<Self, CalendarError> {
        Url::parse(&config.base_url)
            .map_err(|e| CalendarError::Unavailable(format!("invalid base url: {}", e)))?;
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| CalendarError::Unavailable(e.to_string()))?;

        Ok(Self {
            config,
            client,
            tokens,
        })
    }

    /// `{base}/{segments...}` with each segment percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, CalendarError> {
        let mut url = Url::parse(&self.config.base_url)
            .map_err(|e| CalendarError::Unavailable(format!("invalid base url: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| CalendarError::Unavailable("base url cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn events_url(&self) -> Result<Url, CalendarError> {
        self.endpoint(&["calendars", &self.config.calendar_id, "events"])
    }

    fn event_url(&self, event_id: &str) -> Result<Url, CalendarError> {
        self.endpoint(&["calendars", &self.config.calendar_id, "events", event_id])
    }

    async fn request(
        &self,
        identity: &Identity,
        method: Method,
        url: Url,
    ) -> Result<RequestBuilder, CalendarError> {
        let token = self
            .tokens
            .access_token(identity)
            .await
            .map_err(|e| CalendarError::Unauthorized(e.to_string()))?;
        Ok(self
            .client
            .request(method, url)
            .bearer_auth(token.expose_secret()))
    }

    async fn send(builder: RequestBuilder) -> Result<Response, CalendarError> {
        let response = builder.send().await.map_err(transport_error)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(status_error(status, &body))
    }

    async fn json<T: DeserializeOwned>(response: Response) -> Result<T, CalendarError> {
        response
            .json::<T>()
            .await
            .map_err(|e| CalendarError::Unavailable(format!("unreadable response: {}", e)))
    }

    async fn get_event(
        &self,
        identity: &Identity,
        event_id: &str,
    ) -> Result<CalendarEvent, CalendarError> {
        let builder = self
            .request(identity, Method::GET, self.event_url(event_id)?)
            .await?;
        let event: GoogleEvent = Self::json(Self::send(builder).await?).await?;
        let event = event.into_domain()?;
        if event.is_cancelled() {
            return Err(CalendarError::NotFound(event_id.to_string()));
        }
        Ok(event)
    }

    async fn insert(
        &self,
        identity: &Identity,
        body: &EventWrite,
    ) -> Result<CalendarEvent, CalendarError> {
        let builder = self
            .request(identity, Method::POST, self.events_url()?)
            .await?
            .json(body);
        let event: GoogleEvent = Self::json(Self::send(builder).await?).await?;
        event.into_domain()
    }

    async fn patch(
        &self,
        identity: &Identity,
        event_id: &str,
        body: &EventWrite,
    ) -> Result<CalendarEvent, CalendarError> {
        let builder = self
            .request(identity, Method::PATCH, self.event_url(event_id)?)
            .await?
            .json(body);
        let event: GoogleEvent = Self::json(Self::send(builder).await?).await?;
        event.into_domain()
    }

    async fn delete(&self, identity: &Identity, event_id: &str) -> Result<(), CalendarError> {
        let builder = self
            .request(identity, Method::DELETE, self.event_url(event_id)?)
            .await?;
        Self::send(builder).await?;
        Ok(())
    }

    async fn busy_intervals(
        &self,
        identity: &Identity,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
        tz: Tz,
    ) -> Result<Vec<(NaiveDateTime, NaiveDateTime)>, CalendarError> {
        let body = FreeBusyRequest {
            time_min: rfc3339(from),
            time_max: rfc3339(until),
            time_zone: tz.name().to_string(),
            items: vec![FreeBusyItem {
                id: self.config.calendar_id.clone(),
            }],
        };
        let builder = self
            .request(identity, Method::POST, self.endpoint(&["freeBusy"])?)
            .await?
            .json(&body);
        let response: FreeBusyResponse = Self::json(Self::send(builder).await?).await?;
        response.busy_for(&self.config.calendar_id, tz)
    }
}

#[async_trait]
impl CalendarReader for GoogleCalendarClient {
    async fn list_events(
        &self,
        identity: &Identity,
        time_min: DateTime<Utc>,
        time_max: DateTime<Utc>,
        timezone: Tz,
    ) -> Result<Vec<CalendarEvent>, CalendarError> {
        let mut events = Vec::new();
        let mut page_token: Option<String> = None;

        for _ in 0..MAX_PAGES {
            let mut url = self.events_url()?;
            {
                let mut query = url.query_pairs_mut();
                query
                    .append_pair("timeMin", &rfc3339(time_min))
                    .append_pair("timeMax", &rfc3339(time_max))
                    .append_pair("singleEvents", "true")
                    .append_pair("orderBy", "startTime")
                    .append_pair("timeZone", timezone.name())
                    .append_pair("maxResults", PAGE_SIZE);
                if let Some(token) = &page_token {
                    query.append_pair("pageToken", token);
                }
            }

            let builder = self.request(identity, Method::GET, url).await?;
            let page: EventList = Self::json(Self::send(builder).await?).await?;
            for item in page.items {
                match item.into_domain() {
                    Ok(event) => events.push(event),
                    Err(e) => tracing::debug!(error = %e, "Skipping unreadable calendar event"),
                }
            }

            page_token = page.next_page_token;
            if page_token.is_none() {
                break;
            }
        }

        Ok(events)
    }
}

#[async_trait]
impl CalendarExecutor for GoogleCalendarClient {
    async fn execute(
        &self,
        identity: &Identity,
        slots: &IntentSlots,
        ctx: &TurnContext,
    ) -> Result<ExecutionOutcome, CalendarError> {
        let tz = ctx.timezone;
        let invalid = |what: &str| CalendarError::Rejected(format!("invalid {}", what));

        match slots {
            IntentSlots::Create(create) => {
                let (start, end) = create
                    .time_span(ctx.now_local())
                    .ok_or_else(|| invalid("time span"))?;
                let title = create.title.clone().unwrap_or_else(replies::untitled_event);
                let body = EventWrite {
                    summary: Some(title.clone()),
                    start: Some(WriteTime::local(start, tz)),
                    end: Some(WriteTime::local(end, tz)),
                };
                let created = self.insert(identity, &body).await?;
                tracing::info!(event_id = %created.id, "Calendar event created");
                Ok(ExecutionOutcome {
                    summary: replies::created(&title, start, end),
                    event_id: Some(created.id),
                })
            }
            IntentSlots::QueryAvailability(query) => {
                let (from, until) = query
                    .range_start
                    .zip(query.range_end)
                    .ok_or_else(|| invalid("range"))?;
                let busy = self.busy_intervals(identity, from, until, tz).await?;
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
                let current = self.get_event(identity, event_id).await?;
                let old_title = title_of(&current);
                let changes = &update.changes;

                let mut body = EventWrite {
                    summary: changes.title.clone().filter(|t| !t.trim().is_empty()),
                    start: None,
                    end: None,
                };
                if changes.changes_schedule() {
                    let (start, end) = local_span(&current, tz);
                    let (new_start, new_end) = changes.reschedule(start, end);
                    body.start = Some(WriteTime::local(new_start, tz));
                    body.end = Some(WriteTime::local(new_end, tz));
                }

                let updated = self.patch(identity, event_id, &body).await?;
                tracing::info!(event_id = %updated.id, "Calendar event updated");

                let new_title = title_of(&updated);
                let summary = if changes.changes_schedule() {
                    let (start, end) = local_span(&updated, tz);
                    replies::updated(&new_title, start, end)
                } else {
                    replies::renamed(&old_title, &new_title)
                };
                Ok(ExecutionOutcome {
                    summary,
                    event_id: Some(updated.id),
                })
            }
            IntentSlots::Cancel(cancel) => {
                let event_id = cancel.event_id.as_deref().ok_or_else(|| invalid("event"))?;
                let current = self.get_event(identity, event_id).await?;
                self.delete(identity, event_id).await?;
                tracing::info!(event_id = %event_id, "Calendar event deleted");
                Ok(ExecutionOutcome {
                    summary: replies::cancelled(&title_of(&current), &describe_when(&current, tz)),
                    event_id: Some(current.id),
                })
            }
        }
    }
}

fn rfc3339(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn transport_error(error: reqwest::Error) -> CalendarError {
    if error.is_timeout() {
        CalendarError::Timeout
    } else {
        CalendarError::Unavailable(error.to_string())
    }
}

/// Maps a non-success status to a calendar error.
fn status_error(status: StatusCode, body: &str) -> CalendarError {
    let message = error_message(body);
    match status.as_u16() {
        404 | 410 => CalendarError::NotFound(message),
        401 | 403 => CalendarError::Unauthorized(message),
        408 => CalendarError::Timeout,
        429 | 500..=599 => CalendarError::Unavailable(format!("{}: {}", status, message)),
        _ => CalendarError::Rejected(message),
    }
}

/// Google's `error.message`, or the raw body when it is not JSON.
fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .and_then(|envelope| envelope.error.message)
        .unwrap_or_else(|| body.trim().to_string())
}

// === Wire types ===

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventList {
    #[serde(default)]
    items: Vec<GoogleEvent>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleEvent {
    id: String,
    summary: Option<String>,
    status: Option<String>,
    start: Option<GoogleEventTime>,
    end: Option<GoogleEventTime>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleEventTime {
    date_time: Option<DateTime<FixedOffset>>,
    date: Option<NaiveDate>,
}

impl GoogleEventTime {
    fn into_domain(self) -> Option<EventTime> {
        match (self.date_time, self.date) {
            (Some(instant), _) => Some(EventTime::DateTime(instant.with_timezone(&Utc))),
            (None, Some(date)) => Some(EventTime::Date(date)),
            (None, None) => None,
        }
    }
}

impl GoogleEvent {
    fn into_domain(self) -> Result<CalendarEvent, CalendarError> {
        let missing = |what: &str| {
            CalendarError::Rejected(format!("event {} has no {}", self.id, what))
        };
        let start = self
            .start
            .and_then(GoogleEventTime::into_domain)
            .ok_or_else(|| missing("start"))?;
        let end = self
            .end
            .and_then(GoogleEventTime::into_domain)
            .ok_or_else(|| missing("end"))?;

        Ok(CalendarEvent {
            id: self.id,
            title: self.summary,
            status: self.status,
            start,
            end,
        })
    }
}

/// Body of an insert or patch; absent fields are left untouched.
#[derive(Debug, Serialize)]
struct EventWrite {
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    start: Option<WriteTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    end: Option<WriteTime>,
}

/// Local wall-clock time plus zone; Google resolves DST itself.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WriteTime {
    date_time: String,
    time_zone: String,
}

impl WriteTime {
    fn local(moment: NaiveDateTime, tz: Tz) -> Self {
        Self {
            date_time: moment.format("%Y-%m-%dT%H:%M:%S").to_string(),
            time_zone: tz.name().to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FreeBusyRequest {
    time_min: String,
    time_max: String,
    time_zone: String,
    items: Vec<FreeBusyItem>,
}

#[derive(Debug, Serialize)]
struct FreeBusyItem {
    id: String,
}

#[derive(Debug, Deserialize)]
struct FreeBusyResponse {
    #[serde(default)]
    calendars: HashMap<String, FreeBusyCalendar>,
}

#[derive(Debug, Deserialize)]
struct FreeBusyCalendar {
    #[serde(default)]
    busy: Vec<BusyInterval>,
    #[serde(default)]
    errors: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct BusyInterval {
    start: DateTime<FixedOffset>,
    end: DateTime<FixedOffset>,
}

impl FreeBusyResponse {
    fn busy_for(
        mut self,
        calendar_id: &str,
        tz: Tz,
    ) -> Result<Vec<(NaiveDateTime, NaiveDateTime)>, CalendarError> {
        let calendar = self.calendars.remove(calendar_id).ok_or_else(|| {
            CalendarError::Rejected(format!("no availability for calendar {}", calendar_id))
        })?;
        if !calendar.errors.is_empty() {
            return Err(CalendarError::Rejected(format!(
                "availability errors for calendar {}",
                calendar_id
            )));
        }
        Ok(calendar
            .busy
            .into_iter()
            .map(|b| {
                (
                    b.start.with_timezone(&tz).naive_local(),
                    b.end.with_timezone(&tz).naive_local(),
                )
            })
            .collect())
    }
}
