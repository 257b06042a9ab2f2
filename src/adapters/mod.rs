//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the domain to external systems:
//! - `storage` - Conversation state (in-memory, PostgreSQL)
//! - `calendar` - Google Calendar client and an in-memory fake
//! - `whatsapp` - Outbound messages through the WhatsApp Cloud API
//! - `access` - Calendar authorization from stored Google credentials
//! - `cooldown` - Consent-link anti-spam window (in-memory, Redis)
//! - `http` - WhatsApp webhook endpoints

pub mod access;
pub mod calendar;
pub mod cooldown;
pub mod http;
pub mod storage;
pub mod whatsapp;

pub use access::{InMemoryAccessGate, PostgresCredentialGate};
pub use calendar::{GoogleCalendarClient, GoogleCalendarConfig, InMemoryCalendar};
pub use cooldown::{InMemoryLinkCooldown, RedisLinkCooldown};
pub use http::{app_router, WebhookAppState};
pub use storage::{InMemoryStateStore, PostgresStateStore};
pub use whatsapp::{RecordingSender, WhatsAppCloudSender, WhatsAppConfig};
