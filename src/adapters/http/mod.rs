//! HTTP adapters - inbound endpoints.

pub mod webhook;

// Re-export key types for convenience
pub use webhook::{app_router, webhook_routes, WebhookAppState};
