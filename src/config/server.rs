//! Server configuration

use serde::Deserialize;
use std::net::SocketAddr;
use std::time::Duration;

use super::error::{ensure_range, ensure_url, ValidationError};

/// HTTP listener and deployment settings
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub environment: Environment,

    /// `EnvFilter` directive used when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Upper bound on one webhook request, turn included
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Public origin consent links are built on.
    /// Derived from each webhook request when unset.
    pub public_base_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ValidationError> {
        let addr = format!("{}:{}", self.host, self.port);
        addr.parse()
            .map_err(|_| ValidationError::InvalidBindAddress(addr))
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        ensure_range("server.port", self.port.into(), 1, u16::MAX.into())?;
        self.socket_addr()?;
        ensure_range("server.request_timeout_secs", self.request_timeout_secs, 1, 300)?;

        if let Some(raw) = &self.public_base_url {
            let url = ensure_url(
                "SERVER__PUBLIC_BASE_URL",
                "server.public_base_url",
                raw,
                &["http", "https"],
            )?;
            // Meta and Google both refuse plain-http callbacks.
            if self.is_production() && url.scheme() != "https" {
                return Err(ValidationError::PublicUrlMustBeHttps);
            }
        }
        Ok(())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            environment: Environment::default(),
            log_level: default_log_level(),
            request_timeout_secs: default_request_timeout(),
            public_base_url: None,
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info,agenda_assistant=debug,sqlx=warn".to_string()
}

fn default_request_timeout() -> u64 {
    60
}
