//! Connection manager.
//!
//! One `Database` lives for the whole process. The pool is opened on the
//! first `ensure_connected` call and reused afterwards; concurrent first
//! calls wait on the same `OnceCell` instead of racing.

use std::str::FromStr;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tl_core::error::AppError;
use tokio::sync::OnceCell;
use tracing::{debug, error, info, warn};

use crate::schema::create_schema;

#[derive(Debug, Clone)]
pub struct DatabaseOptions {
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

impl Default for DatabaseOptions {
    fn default() -> Self {
        Self {
            max_connections: 5,
            acquire_timeout: Duration::from_secs(30),
        }
    }
}

pub struct Database {
    url: Option<SecretString>,
    options: DatabaseOptions,
    pool: OnceCell<SqlitePool>,
}

impl Database {
    pub fn new(url: Option<SecretString>, options: DatabaseOptions) -> Self {
        Self {
            url,
            options,
            pool: OnceCell::new(),
        }
    }

    /// Shorthand with default pool options.
    pub fn from_url(url: &str) -> Self {
        Self::new(Some(SecretString::from(url.to_owned())), DatabaseOptions::default())
    }

    pub fn is_connected(&self) -> bool {
        self.pool.initialized()
    }

    /// Opens the pool on first use. A missing URL or a failed connect is
    /// logged and left for the next store call to report.
    pub async fn ensure_connected(&self) {
        let Some(url) = self.url.as_ref() else {
            warn!("DATABASE_URL not found; skipping connection");
            return;
        };
        if self.pool.initialized() {
            debug!("already connected to the database");
            return;
        }

        if let Err(e) = self
            .pool
            .get_or_try_init(|| self.open(url.expose_secret()))
            .await
        {
            error!(error = %e, "failed to connect to the database");
        }
    }

    pub fn pool(&self) -> Result<&SqlitePool, AppError> {
        self.pool.get().ok_or(AppError::NotConnected)
    }

    async fn open(&self, url: &str) -> anyhow::Result<SqlitePool> {
        let connect = SqliteConnectOptions::from_str(url)?.create_if_missing(true);

        // An in-memory database disappears with its last connection.
        let in_memory = url.contains(":memory:") || url.contains("mode=memory");
        let pool_options = SqlitePoolOptions::new().acquire_timeout(self.options.acquire_timeout);
        let pool_options = if in_memory {
            pool_options
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            pool_options.max_connections(self.options.max_connections)
        };

        let pool = pool_options.connect_with(connect).await?;
        create_schema(&pool).await?;

        info!(in_memory, "connected to the database");
        Ok(pool)
    }
}
