//! Integration tests for the webhook HTTP endpoints.
//!
//! These tests drive the full axum router with `tower::ServiceExt::oneshot`:
//! 1. The Meta verification handshake
//! 2. Signature checks on notifications
//! 3. Message handling through to the recorded outbound reply
//! 4. Turns that outlive the request timeout

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use chrono::{DateTime, Utc};
use axum::http::{Request, StatusCode};
use axum::Router;
use secrecy::Secret;
use serde_json::json;
use tower::ServiceExt;

use agenda_assistant::adapters::access::InMemoryAccessGate;
use agenda_assistant::adapters::calendar::InMemoryCalendar;
use agenda_assistant::adapters::cooldown::InMemoryLinkCooldown;
use agenda_assistant::adapters::http::webhook::{signature_header, SIGNATURE_HEADER};
use agenda_assistant::adapters::http::{app_router, WebhookAppState};
use agenda_assistant::adapters::storage::InMemoryStateStore;
use agenda_assistant::adapters::whatsapp::RecordingSender;
use agenda_assistant::application::handlers::dialogue::{
    EventResolver, HandleTurnHandler, ResolverConfig, TurnConfig,
};
use agenda_assistant::application::handlers::inbound::{InboundConfig, ReceiveMessageHandler};
use agenda_assistant::domain::dialogue::{
    replies, ConversationState, KeywordIntentClassifier, RuleBasedSlotExtractor,
};
use agenda_assistant::domain::foundation::Identity;
use agenda_assistant::ports::{
    AccessDecision, ConsentReason, ConversationStateStore, StateStoreError,
};

// =============================================================================
// Test Infrastructure
// =============================================================================

const APP_SECRET: &str = "app-secret";
const SENDER: &str = "5491112345678";

fn app_secret() -> Secret<String> {
    Secret::new(APP_SECRET.to_string())
}

fn build_app(gate: InMemoryAccessGate, sender: RecordingSender) -> Router {
    build_app_with(
        gate,
        sender,
        Arc::new(InMemoryStateStore::new()),
        InMemoryCalendar::new(),
        Duration::from_secs(30),
    )
}

fn build_app_with(
    gate: InMemoryAccessGate,
    sender: RecordingSender,
    store: Arc<dyn ConversationStateStore>,
    calendar: InMemoryCalendar,
    request_timeout: Duration,
) -> Router {
    let turns = HandleTurnHandler::new(
        store,
        Arc::new(KeywordIntentClassifier::new()),
        Arc::new(RuleBasedSlotExtractor::new()),
        EventResolver::new(Arc::new(calendar.clone()), ResolverConfig::default()),
        Arc::new(calendar),
        TurnConfig::default(),
    );
    let inbound = ReceiveMessageHandler::new(
        Arc::new(gate),
        Arc::new(InMemoryLinkCooldown::new()),
        Arc::new(turns),
        Arc::new(sender),
        InboundConfig::default(),
    );
    let state = WebhookAppState::new(Arc::new(inbound), Secret::new("verify-me".to_string()))
        .with_app_secret(app_secret());

    app_router(state, request_timeout)
}

/// Delegates to an in-memory store; every save after the first is slowed
/// down by `delay`.
#[derive(Clone)]
struct SlowSaveStore {
    inner: InMemoryStateStore,
    saves: Arc<AtomicUsize>,
    delay: Duration,
}

impl SlowSaveStore {
    fn new(inner: InMemoryStateStore, delay: Duration) -> Self {
        Self {
            inner,
            saves: Arc::new(AtomicUsize::new(0)),
            delay,
        }
    }
}

#[async_trait]
impl ConversationStateStore for SlowSaveStore {
    async fn load(
        &self,
        identity: &Identity,
        now: DateTime<Utc>,
    ) -> Result<ConversationState, StateStoreError> {
        self.inner.load(identity, now).await
    }

    async fn save(
        &self,
        state: &ConversationState,
        now: DateTime<Utc>,
    ) -> Result<i64, StateStoreError> {
        if self.saves.fetch_add(1, Ordering::SeqCst) > 0 {
            tokio::time::sleep(self.delay).await;
        }
        self.inner.save(state, now).await
    }
}

fn message_payload(text: &str) -> Vec<u8> {
    json!({
        "object": "whatsapp_business_account",
        "entry": [{
            "id": "WABA",
            "changes": [{
                "field": "messages",
                "value": {
                    "messaging_product": "whatsapp",
                    "messages": [{
                        "from": SENDER,
                        "id": "wamid.1",
                        "type": "text",
                        "text": { "body": text }
                    }]
                }
            }]
        }]
    })
    .to_string()
    .into_bytes()
}

fn signed_post(body: Vec<u8>) -> Request<Body> {
    let signature = signature_header(&app_secret(), &body).unwrap();
    Request::builder()
        .method("POST")
        .uri("/webhook")
        .header("content-type", "application/json")
        .header(SIGNATURE_HEADER, signature)
        .body(Body::from(body))
        .unwrap()
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

// =============================================================================
// Health and verification
// =============================================================================

#[tokio::test]
async fn health_is_ok() {
    let app = build_app(InMemoryAccessGate::granting(), RecordingSender::new());

    let response = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("\"status\":\"ok\""));
}

#[tokio::test]
async fn verification_echoes_challenge() {
    let app = build_app(InMemoryAccessGate::granting(), RecordingSender::new());

    let response = app
        .oneshot(
            Request::get("/webhook?hub.mode=subscribe&hub.verify_token=verify-me&hub.challenge=1158201444")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "1158201444");
}

#[tokio::test]
async fn verification_with_wrong_token_is_forbidden() {
    let app = build_app(InMemoryAccessGate::granting(), RecordingSender::new());

    let response = app
        .oneshot(
            Request::get("/webhook?hub.mode=subscribe&hub.verify_token=nope&hub.challenge=1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

// =============================================================================
// Notifications
// =============================================================================

#[tokio::test]
async fn signed_message_gets_a_reply() {
    let sender = RecordingSender::new();
    let app = build_app(InMemoryAccessGate::granting(), sender.clone());

    let response = app.oneshot(signed_post(message_payload("hola"))).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let sent = sender.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to.as_str(), SENDER);
    assert_eq!(sent[0].body, replies::ask_intent());
}

#[tokio::test]
async fn bad_signature_is_unauthorized() {
    let sender = RecordingSender::new();
    let app = build_app(InMemoryAccessGate::granting(), sender.clone());

    let request = Request::builder()
        .method("POST")
        .uri("/webhook")
        .header(SIGNATURE_HEADER, "sha256=00ff")
        .body(Body::from(message_payload("hola")))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(sender.sent().is_empty());
}

#[tokio::test]
async fn missing_signature_is_unauthorized() {
    let app = build_app(InMemoryAccessGate::granting(), RecordingSender::new());

    let request = Request::builder()
        .method("POST")
        .uri("/webhook")
        .body(Body::from(message_payload("hola")))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn status_callback_is_acknowledged_and_ignored() {
    let sender = RecordingSender::new();
    let app = build_app(InMemoryAccessGate::granting(), sender.clone());
    let body = json!({
        "entry": [{"changes": [{"value": {"statuses": [{"status": "read"}]}}]}]
    })
    .to_string()
    .into_bytes();

    let response = app.oneshot(signed_post(body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(sender.sent().is_empty());
}

#[tokio::test]
async fn unparseable_payload_is_acknowledged() {
    let sender = RecordingSender::new();
    let app = build_app(InMemoryAccessGate::granting(), sender.clone());

    let response = app
        .oneshot(signed_post(b"not json".to_vec()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(sender.sent().is_empty());
}

#[tokio::test]
async fn consent_link_uses_forwarded_origin() {
    let sender = RecordingSender::new();
    let gate = InMemoryAccessGate::with_default(AccessDecision::SendConsentLink {
        reason: ConsentReason::NoCredentials,
    });
    let app = build_app(gate, sender.clone());

    let mut request = signed_post(message_payload("hola"));
    let headers = request.headers_mut();
    headers.insert("host", "internal:8080".parse().unwrap());
    headers.insert("x-forwarded-proto", "https".parse().unwrap());
    headers.insert("x-forwarded-host", "bot.example.com".parse().unwrap());
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = sender.last_body().unwrap();
    assert!(body.contains(
        "https://bot.example.com/auth/google/start?phone=5491112345678&force_consent=0&select_account=0"
    ));
}

// =============================================================================
// Request timeout
// =============================================================================

#[tokio::test]
async fn turn_outlives_request_timeout_and_is_not_repeated() {
    let sender = RecordingSender::new();
    let calendar = InMemoryCalendar::new();
    let memory = InMemoryStateStore::new();
    let store = SlowSaveStore::new(memory.clone(), Duration::from_millis(400));
    let app = build_app_with(
        InMemoryAccessGate::granting(),
        sender.clone(),
        Arc::new(store),
        calendar.clone(),
        Duration::from_millis(200),
    );

    let first = app
        .clone()
        .oneshot(signed_post(message_payload(
            "quiero agendar una reunión mañana a las 10 por una hora",
        )))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    // The calendar write succeeds, then the save outlasts the request.
    let second = app
        .clone()
        .oneshot(signed_post(message_payload("Dentista")))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::REQUEST_TIMEOUT);

    tokio::time::sleep(Duration::from_millis(600)).await;

    assert_eq!(calendar.events().len(), 1);
    let identity = Identity::new(SENDER).unwrap();
    assert!(memory.get(&identity).await.unwrap().is_blank());
    assert_eq!(sender.sent().len(), 2);
    assert!(sender.last_body().unwrap().contains("Dentista"));

    // Meta redelivers the timed-out notification.
    let redelivered = app
        .oneshot(signed_post(message_payload("Dentista")))
        .await
        .unwrap();
    assert_eq!(redelivered.status(), StatusCode::OK);
    assert_eq!(calendar.events().len(), 1);
}
