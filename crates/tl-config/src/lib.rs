//! # tl-config
//!
//! Process configuration for Threadline, read from an optional `.env` file
//! and the environment.
//!
//! | Variable                          | Default | Meaning                         |
//! |-----------------------------------|---------|---------------------------------|
//! | `DATABASE_URL`                    | unset   | store connection string         |
//! | `THREADLINE_MAX_CONNECTIONS`      | 5       | pool size                       |
//! | `THREADLINE_ACQUIRE_TIMEOUT_SECS` | 30      | wait for a pooled connection    |

use std::time::Duration;

use config::{Config, Environment};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    database_url: Option<String>,
    max_connections: u32,
    acquire_timeout_secs: u64,
}

/// Resolved configuration. The connection string is held as a secret and
/// never printed.
#[derive(Debug)]
pub struct AppConfig {
    pub database_url: Option<SecretString>,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

impl AppConfig {
    /// Loads `.env` (if present) and then the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(path) => debug!(path = %path.display(), "loaded .env file"),
            Err(e) if e.not_found() => {}
            Err(e) => warn!(error = %e, "ignoring unreadable .env file"),
        }

        let mut builder = Self::defaults()?;
        if let Ok(url) = std::env::var("DATABASE_URL") {
            builder = builder.set_default("database_url", url)?;
        }

        let cfg = builder
            .add_source(Environment::with_prefix("THREADLINE").try_parsing(true))
            .build()?;
        Self::from_config(cfg)
    }

    /// Builder pre-populated with every default.
    pub fn defaults() -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        Ok(Config::builder()
            .set_default("max_connections", i64::from(DEFAULT_MAX_CONNECTIONS))?
            .set_default("acquire_timeout_secs", DEFAULT_ACQUIRE_TIMEOUT_SECS as i64)?)
    }

    pub fn from_config(cfg: Config) -> Result<Self, ConfigError> {
        let raw: RawConfig = cfg.try_deserialize()?;

        let database_url = raw
            .database_url
            .filter(|url| !url.trim().is_empty())
            .map(SecretString::from);
        if database_url.is_none() {
            warn!("DATABASE_URL not set; store operations will fail until it is provided");
        }

        Ok(Self {
            database_url,
            max_connections: raw.max_connections.max(1),
            acquire_timeout: Duration::from_secs(raw.acquire_timeout_secs),
        })
    }

    pub fn database_url(&self) -> Option<&str> {
        self.database_url.as_ref().map(|url| url.expose_secret())
    }
}
