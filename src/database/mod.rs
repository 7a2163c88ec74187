use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::defaults::DEFAULT_MAX_CONNECTIONS;
use crate::errors::{EtlError, EtlResult};

/// Connection pool to one SQLite store
#[derive(Clone)]
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    pub fn pool(&self) -> Pool<Sqlite> {
        self.pool.clone()
    }

    /// Connect to `url`, creating the database file if it doesn't exist yet.
    pub async fn connect(url: &str, max_connections: Option<u32>) -> EtlResult<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| EtlError::configuration(format!("invalid database url '{url}': {e}")))?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.unwrap_or(DEFAULT_MAX_CONNECTIONS))
            .acquire_timeout(Duration::from_secs(5))
            .connect_with(options)
            .await
            .map_err(|e| EtlError::connection(format!("failed to connect to {url}: {e}")))?;

        info!("Connected to database {}", url);
        Ok(Self { pool })
    }

    /// Private in-memory store. A single connection that never expires keeps
    /// the data alive for the lifetime of the pool.
    pub async fn in_memory() -> EtlResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| EtlError::configuration(e.to_string()))?;

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| EtlError::connection(format!("failed to open in-memory database: {e}")))?;

        debug!("Opened in-memory database");
        Ok(Self { pool })
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
