//! WhatsApp adapters.
//!
//! - `WhatsAppCloudSender` - Meta Graph API text messages
//! - `RecordingSender` - captures outbound messages for tests

mod cloud_sender;
mod recording;

pub use cloud_sender::{normalize_recipient, WhatsAppCloudSender, WhatsAppConfig};
pub use recording::{RecordingSender, SentMessage};
