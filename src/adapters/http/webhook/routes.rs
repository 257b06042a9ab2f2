//! Axum router configuration for the WhatsApp webhook.

use std::time::Duration;

use axum::{routing::get, Router};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use super::handlers::{health, receive_webhook, verify_webhook, WebhookAppState};

/// Create the webhook router.
///
/// # Routes
/// - `GET /webhook` - Meta verification handshake
/// - `POST /webhook` - Inbound notifications (signature verified when configured)
pub fn webhook_routes() -> Router<WebhookAppState> {
    Router::new().route("/webhook", get(verify_webhook).post(receive_webhook))
}

/// Create the complete application router.
///
/// Adds `GET /health`, request tracing and a per-request timeout.
pub fn app_router(state: WebhookAppState, request_timeout: Duration) -> Router {
    Router::new()
        .route("/health", get(health))
        .merge(webhook_routes())
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(request_timeout))
        .with_state(state)
}
