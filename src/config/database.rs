//! PostgreSQL/TimescaleDB connection configuration: pool sizing and the
//! retention window applied to the price-observation hypertables.
//!
//! Version dependencies:
//! - sqlx = { version = "0.7", features = ["postgres", "runtime-tokio-rustls"] }

use serde::Deserialize;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;
use std::time::Duration;
use tracing::{info, instrument};

const DEFAULT_POOL_SIZE: u32 = 10;
const MIN_POOL_SIZE: u32 = 1;
const MAX_POOL_SIZE: u32 = 50;
const DEFAULT_TIMEOUT_SECONDS: u64 = 30;
const DEFAULT_IDLE_TIMEOUT_SECONDS: u64 = 600;
const DEFAULT_RETENTION_DAYS: u32 = 90;

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub database: String,
    pub pool_size: u32,
    pub timeout_seconds: u64,
    /// How long raw price observations are kept in the hypertable before a
    /// retention policy drops the chunk. Continuous aggregates are kept
    /// indefinitely and are out of scope for this config.
    pub retention_days: u32,
}

impl DatabaseConfig {
    pub fn new() -> Self {
        Self {
            host: String::new(),
            port: 5432,
            username: String::new(),
            password: String::new(),
            database: String::new(),
            pool_size: DEFAULT_POOL_SIZE,
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            retention_days: DEFAULT_RETENTION_DAYS,
        }
    }

    #[instrument(skip(self))]
    pub fn validate_config(&self) -> Result<(), String> {
        if self.host.is_empty() || self.username.is_empty() || self.database.is_empty() {
            return Err("Missing required database configuration".to_string());
        }
        if self.pool_size < MIN_POOL_SIZE || self.pool_size > MAX_POOL_SIZE {
            return Err(format!(
                "Pool size must be between {MIN_POOL_SIZE} and {MAX_POOL_SIZE}"
            ));
        }
        if self.retention_days == 0 {
            return Err("retention_days must be at least 1".to_string());
        }
        Ok(())
    }

    pub fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.username)
            .password(&self.password)
            .database(&self.database)
    }

    #[instrument(skip(self))]
    pub async fn build_pool(&self) -> Result<PgPool, sqlx::Error> {
        PgPoolOptions::new()
            .max_connections(self.pool_size)
            .acquire_timeout(Duration::from_secs(self.timeout_seconds))
            .idle_timeout(Duration::from_secs(DEFAULT_IDLE_TIMEOUT_SECONDS))
            .connect_with(self.connect_options())
            .await
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl DatabaseConfig {
    pub fn from_env() -> Result<Self, String> {
        let mut config = Self::new();
        config.host = std::env::var("DATABASE_HOST").map_err(|_| "DATABASE_HOST not set")?;
        config.port = std::env::var("DATABASE_PORT")
            .unwrap_or_else(|_| "5432".to_string())
            .parse()
            .map_err(|_| "invalid DATABASE_PORT")?;
        config.username = std::env::var("DATABASE_USER").map_err(|_| "DATABASE_USER not set")?;
        config.password = std::env::var("DATABASE_PASSWORD").unwrap_or_default();
        config.database = std::env::var("DATABASE_NAME").map_err(|_| "DATABASE_NAME not set")?;
        config.pool_size = std::env::var("DATABASE_POOL_SIZE")
            .unwrap_or_else(|_| DEFAULT_POOL_SIZE.to_string())
            .parse()
            .map_err(|_| "invalid DATABASE_POOL_SIZE")?;
        config.retention_days = std::env::var("PRICE_RETENTION_DAYS")
            .unwrap_or_else(|_| DEFAULT_RETENTION_DAYS.to_string())
            .parse()
            .map_err(|_| "invalid PRICE_RETENTION_DAYS")?;
        config.validate_config()?;
        Ok(config)
    }
}

#[instrument(skip(config))]
pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool, String> {
    config.validate_config()?;
    let pool = config
        .build_pool()
        .await
        .map_err(|e| format!("failed to create connection pool: {e}"))?;
    info!(pool_size = config.pool_size, "database connection pool initialized");
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> DatabaseConfig {
        let mut config = DatabaseConfig::new();
        config.host = "localhost".to_string();
        config.username = "user".to_string();
        config.database = "testdb".to_string();
        config
    }

    #[test]
    fn rejects_missing_fields() {
        assert!(DatabaseConfig::new().validate_config().is_err());
    }

    #[test]
    fn pool_size_bounds_are_enforced() {
        let mut config = valid_config();
        config.pool_size = MAX_POOL_SIZE + 1;
        assert!(config.validate_config().is_err());

        config.pool_size = DEFAULT_POOL_SIZE;
        assert!(config.validate_config().is_ok());
    }

    #[test]
    fn rejects_zero_retention() {
        let mut config = valid_config();
        config.retention_days = 0;
        assert!(config.validate_config().is_err());
    }
}
