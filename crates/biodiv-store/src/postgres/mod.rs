//! PostgreSQL/PostGIS adapter

pub mod config;
pub mod executor;
pub mod lookup;

pub use config::{ConfigError, PoolConfig, PostgresConfig};

use biodiv_core::error::{BiodivError, Result};
use sqlx::{postgres::PgPoolOptions, Executor, PgPool};

/// PostgreSQL adapter for the observation database
pub struct PostgresStore {
    pool: PgPool,
    config: PostgresConfig,
}

impl PostgresStore {
    /// Connect with the given configuration and check the connection
    pub async fn new(config: PostgresConfig) -> Result<Self> {
        config.validate().map_err(|e| BiodivError::ConfigInvalid {
            key: "database_url".to_string(),
            reason: e.to_string(),
        })?;

        let statement_timeout = config.statement_timeout;
        let pool = PgPoolOptions::new()
            .min_connections(config.pool.min_connections)
            .max_connections(config.pool.max_connections)
            .acquire_timeout(config.pool.acquire_timeout)
            .idle_timeout(config.pool.idle_timeout)
            .after_connect(move |conn, _meta| {
                Box::pin(async move {
                    if let Some(timeout) = statement_timeout {
                        let sql = format!("SET statement_timeout = {}", timeout.as_millis());
                        conn.execute(sql.as_str()).await?;
                    }
                    Ok(())
                })
            })
            .connect(&config.database_url)
            .await
            .map_err(|e| db_error("Failed to connect to database", e))?;

        let store = Self { pool, config };
        store.health_check().await?;
        tracing::info!("Connected to {}", store.config.redacted_url());
        Ok(store)
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Get a reference to the configuration
    pub fn config(&self) -> &PostgresConfig {
        &self.config
    }

    /// Perform a health check on the database connection
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| db_error("Health check failed", e))?;
        Ok(())
    }

    /// PostGIS version string, failing when the extension is missing
    pub async fn postgis_version(&self) -> Result<String> {
        sqlx::query_scalar::<_, String>("SELECT postgis_lib_version()")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| db_error("PostGIS is not available", e))
    }
}

/// Map a driver error to the domain error, keeping the raw text in the log
pub(crate) fn db_error(context: &str, e: sqlx::Error) -> BiodivError {
    tracing::debug!("{}: {:?}", context, e);
    BiodivError::Database(format!("{}: {}", context, e))
}
