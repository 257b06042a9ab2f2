//! HTTP handlers for the WhatsApp webhook.
//!
//! These handlers connect Axum routes to the inbound message handler.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Json, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use secrecy::{ExposeSecret, Secret};
use subtle::ConstantTimeEq;
use tracing::Instrument;
use uuid::Uuid;

use crate::application::handlers::inbound::{ReceiveMessageCommand, ReceiveMessageHandler};
use crate::domain::foundation::Identity;

use super::dto::{HealthResponse, VerifyQuery, WebhookPayload};
use super::signature::{verify_signature, SIGNATURE_HEADER};

// ════════════════════════════════════════════════════════════════════════════════
// Application State
// ════════════════════════════════════════════════════════════════════════════════

/// Shared state of the webhook routes.
#[derive(Clone)]
pub struct WebhookAppState {
    pub inbound: Arc<ReceiveMessageHandler>,
    pub verify_token: Secret<String>,
    /// Enables `X-Hub-Signature-256` checks when set.
    pub app_secret: Option<Secret<String>>,
    /// Origin for consent links; derived from the request when unset.
    pub public_base_url: Option<String>,
}

impl WebhookAppState {
    pub fn new(inbound: Arc<ReceiveMessageHandler>, verify_token: Secret<String>) -> Self {
        Self {
            inbound,
            verify_token,
            app_secret: None,
            public_base_url: None,
        }
    }

    pub fn with_app_secret(mut self, app_secret: Secret<String>) -> Self {
        self.app_secret = Some(app_secret);
        self
    }

    pub fn with_public_base_url(mut self, url: impl Into<String>) -> Self {
        self.public_base_url = Some(url.into());
        self
    }

    fn base_url(&self, headers: &HeaderMap) -> String {
        if let Some(url) = &self.public_base_url {
            return url.trim_end_matches('/').to_string();
        }
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(|v| v.split(',').next().unwrap_or(v).trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let scheme = header("x-forwarded-proto").unwrap_or_else(|| "http".to_string());
        let host = header("x-forwarded-host")
            .or_else(|| header("host"))
            .unwrap_or_else(|| "localhost".to_string());
        format!("{}://{}", scheme, host)
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Handlers
// ════════════════════════════════════════════════════════════════════════════════

/// GET /webhook - Meta subscription handshake
pub async fn verify_webhook(
    State(state): State<WebhookAppState>,
    Query(query): Query<VerifyQuery>,
) -> Response {
    let token_matches = query.verify_token.as_deref().is_some_and(|token| {
        token
            .as_bytes()
            .ct_eq(state.verify_token.expose_secret().as_bytes())
            .into()
    });

    if query.mode.as_deref() == Some("subscribe") && token_matches {
        tracing::info!("Webhook subscription verified");
        return (StatusCode::OK, query.challenge.unwrap_or_default()).into_response();
    }

    tracing::warn!(mode = ?query.mode, "Webhook verification rejected");
    StatusCode::FORBIDDEN.into_response()
}

/// POST /webhook - Inbound notification
///
/// Answers 200 for everything that passed the signature check, including
/// payloads it cannot use, so Meta does not redeliver them. A started turn
/// always runs to completion, even if this request is dropped.
pub async fn receive_webhook(
    State(state): State<WebhookAppState>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    if let Some(secret) = &state.app_secret {
        let header = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());
        if let Err(e) = verify_signature(secret, &body, header) {
            tracing::warn!(error = %e, "Webhook signature rejected");
            return StatusCode::UNAUTHORIZED;
        }
    }

    let payload: WebhookPayload = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::warn!(error = %e, "Ignoring unparseable webhook payload");
            return StatusCode::OK;
        }
    };

    let Some(message) = payload.first_message() else {
        tracing::debug!("Webhook without inbound message");
        return StatusCode::OK;
    };

    let identity = match Identity::new(&message.from) {
        Ok(identity) => identity,
        Err(e) => {
            tracing::warn!(error = %e, "Ignoring message with invalid sender");
            return StatusCode::OK;
        }
    };

    let correlation_id = Uuid::new_v4();
    let command = ReceiveMessageCommand {
        identity: identity.clone(),
        text: message.body,
        received_at: Utc::now(),
        base_url: state.base_url(&headers),
    };
    // The turn runs in its own task so a dropped request (client gone,
    // request timeout) cannot stop it between the calendar write and the
    // state save.
    let inbound = Arc::clone(&state.inbound);
    let turn = tokio::spawn(
        async move { inbound.handle(command).await }
            .instrument(tracing::info_span!("inbound_message", %correlation_id)),
    );

    match turn.await {
        Ok(delivery) => tracing::info!(
            identity = %identity,
            reply = ?delivery.kind,
            sent = delivery.sent,
            "Inbound message handled"
        ),
        Err(e) => tracing::error!(
            identity = %identity,
            %correlation_id,
            error = %e,
            "Inbound message task failed"
        ),
    }
    StatusCode::OK
}

/// GET /health - Liveness
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}
