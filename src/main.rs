//! agenda-assistant - WhatsApp webhook server.
//!
//! Reads configuration from `AGENDA_ASSISTANT__*` environment variables
//! (see `config::AppConfig`), wires the PostgreSQL, Redis, Google Calendar
//! and WhatsApp adapters and serves the webhook router.

use std::error::Error;
use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use agenda_assistant::adapters::http::{app_router, WebhookAppState};
use agenda_assistant::adapters::{
    GoogleCalendarClient, GoogleCalendarConfig, PostgresCredentialGate, PostgresStateStore,
    RedisLinkCooldown, WhatsAppCloudSender, WhatsAppConfig,
};
use agenda_assistant::application::handlers::{
    EventResolver, HandleTurnHandler, InboundConfig, ReceiveMessageHandler, ResolverConfig,
    TurnConfig,
};
use agenda_assistant::config::AppConfig;
use agenda_assistant::domain::dialogue::{KeywordIntentClassifier, RuleBasedSlotExtractor};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let config = AppConfig::load()?;
    init_tracing(&config);
    config.validate()?;

    let timezone = config.dialogue.tz()?;
    let collaborator_timeout = config.dialogue.collaborator_timeout();

    // PostgreSQL: conversation state and stored Google credentials
    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .acquire_timeout(config.database.connect_timeout())
        .connect(&config.database.url)
        .await?;
    tracing::info!("Connected to database");

    if config.database.run_migrations {
        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!("Migrations applied");
    }

    // Redis: consent-link cooldown shared between instances
    let redis = redis::Client::open(config.redis.url.as_str())?;
    let redis_conn = tokio::time::timeout(
        config.redis.timeout(),
        redis.get_multiplexed_tokio_connection(),
    )
    .await??;
    tracing::info!("Connected to Redis");

    let credentials = Arc::new(PostgresCredentialGate::new(pool.clone()));

    let calendar = Arc::new(GoogleCalendarClient::new(
        GoogleCalendarConfig::new()
            .with_base_url(config.google.calendar_api_base.clone())
            .with_calendar_id(config.google.calendar_id.clone())
            .with_timeout(collaborator_timeout),
        credentials.clone(),
    )?);

    let sender = Arc::new(WhatsAppCloudSender::new(
        WhatsAppConfig::new(
            config.whatsapp.access_token.clone(),
            config.whatsapp.phone_number_id.clone(),
        )
        .with_graph_api_base(config.whatsapp.graph_api_base.clone())
        .with_graph_api_version(config.whatsapp.graph_api_version.clone()),
    )?);

    let resolver = EventResolver::new(
        calendar.clone(),
        ResolverConfig {
            max_candidates: config.dialogue.max_candidates,
            hint_lookahead_days: config.dialogue.hint_lookahead_days,
            timeout: collaborator_timeout,
        },
    );

    let turns = HandleTurnHandler::new(
        Arc::new(PostgresStateStore::new(pool)),
        Arc::new(KeywordIntentClassifier::new()),
        Arc::new(RuleBasedSlotExtractor::new()),
        resolver,
        calendar,
        TurnConfig {
            timezone,
            collaborator_timeout,
        },
    );

    let inbound = ReceiveMessageHandler::new(
        credentials,
        Arc::new(
            RedisLinkCooldown::new(redis_conn).with_key_prefix(config.redis.key_prefix.clone()),
        ),
        Arc::new(turns),
        sender,
        InboundConfig {
            consent_path: config.google.consent_path.clone(),
            link_cooldown: config.dialogue.link_cooldown(),
            gate_timeout: collaborator_timeout,
        },
    );

    let mut state = WebhookAppState::new(Arc::new(inbound), config.whatsapp.verify_token.clone());
    if config.whatsapp.verifies_signatures() {
        if let Some(secret) = config.whatsapp.app_secret.clone() {
            state = state.with_app_secret(secret);
        }
    } else {
        tracing::warn!("whatsapp.app_secret not set; webhook signatures are not checked");
    }
    if let Some(url) = config.server.public_base_url.clone() {
        state = state.with_public_base_url(url);
    }

    let app = app_router(state, config.server.request_timeout());

    let addr = config.server.socket_addr()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(
        %addr,
        environment = ?config.server.environment,
        timezone = %timezone,
        "agenda-assistant listening"
    );

    axum::serve(listener, app).await?;
    Ok(())
}

/// JSON logs in production, human-readable output elsewhere.
fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.server.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    if config.is_production() {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
