//! Typed settings for the assistant.
//!
//! Everything comes from `AGENDA_ASSISTANT__<SECTION>__<KEY>` environment
//! variables (a `.env` file is read first when present), for example
//! `AGENDA_ASSISTANT__DIALOGUE__TIMEZONE=Europe/Madrid`.
//!
//! ```no_run
//! use agenda_assistant::config::AppConfig;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::load()?;
//! config.validate()?;
//! println!("{:?}", config.server.socket_addr()?);
//! # Ok(())
//! # }
//! ```

mod dialogue;
mod error;
mod google;
mod server;
mod storage;
mod whatsapp;

pub use dialogue::DialogueConfig;
pub use error::{ConfigError, ValidationError};
pub use google::GoogleConfig;
pub use server::{Environment, ServerConfig};
pub use storage::{DatabaseConfig, RedisConfig};
pub use whatsapp::WhatsAppSettings;

use serde::Deserialize;

const ENV_PREFIX: &str = "AGENDA_ASSISTANT";

/// All settings, one field per section.
///
/// `database`, `redis` and `whatsapp` have required keys; the other sections
/// fall back to defaults entirely.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,

    pub database: DatabaseConfig,

    pub redis: RedisConfig,

    #[serde(default)]
    pub dialogue: DialogueConfig,

    pub whatsapp: WhatsAppSettings,

    #[serde(default)]
    pub google: GoogleConfig,
}

impl AppConfig {
    /// Reads `.env` (if any) and the process environment.
    ///
    /// # Errors
    ///
    /// `ConfigError::LoadError` when a required key is missing or a value
    /// does not parse. Range and format checks happen in [`AppConfig::validate`].
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix(ENV_PREFIX)
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Checks every section, stopping at the first problem.
    ///
    /// The request timeout must also cover a whole turn, so the HTTP layer
    /// never answers Meta with a timeout while a turn is still running.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.server.validate()?;
        self.database.validate()?;
        self.redis.validate()?;
        self.dialogue.validate()?;
        self.whatsapp.validate()?;
        self.google.validate()?;

        let turn = self.dialogue.turn_budget_secs();
        if self.server.request_timeout_secs < turn {
            return Err(ValidationError::RequestTimeoutBelowTurnBudget {
                request: self.server.request_timeout_secs,
                turn,
            });
        }
        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.server.is_production()
    }
}
