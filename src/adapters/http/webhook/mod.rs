//! HTTP adapter for the WhatsApp Cloud API webhook.
//!
//! - `GET /webhook` - Subscription verification
//! - `POST /webhook` - Inbound messages
//! - `GET /health` - Liveness

pub mod dto;
pub mod handlers;
pub mod routes;
pub mod signature;

pub use handlers::WebhookAppState;
pub use routes::{app_router, webhook_routes};
pub use signature::{signature_header, verify_signature, SignatureError, SIGNATURE_HEADER};
