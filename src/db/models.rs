//! Schema definitions for the ingestion core's tables, and the idempotent
//! schema-init routine run once at startup (§6.2).
//!
//! Version dependencies:
//! - sqlx = { version = "0.7", features = ["postgres"] }
//! - thiserror = "1.0"

use sqlx::{Pool, Postgres};
use thiserror::Error;
use tracing::instrument;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("schema initialization failed: {0}")]
    SchemaError(String),
}

/// Creates every table the core depends on if it doesn't already exist,
/// registers `market_prices`/`bazaar_prices` as TimescaleDB hypertables,
/// and applies the weekly chunking + retention policy from
/// `DatabaseConfig::retention_days`. Safe to run on every startup.
#[instrument(skip(pool))]
pub async fn initialize_database_schema(pool: &Pool<Postgres>, retention_days: u32) -> Result<(), DatabaseError> {
    sqlx::query("CREATE EXTENSION IF NOT EXISTS timescaledb")
        .execute(pool)
        .await
        .map_err(|e| DatabaseError::SchemaError(e.to_string()))?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS items (
            id BIGINT PRIMARY KEY,
            name TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            item_type TEXT NOT NULL,
            circulation BIGINT NOT NULL,
            is_tracked BOOLEAN NOT NULL,
            last_market_price BIGINT,
            last_bazaar_price BIGINT,
            last_updated_at TIMESTAMPTZ
        );
        CREATE INDEX IF NOT EXISTS idx_items_is_tracked ON items (is_tracked) WHERE is_tracked;
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| DatabaseError::SchemaError(e.to_string()))?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS market_prices (
            time TIMESTAMPTZ NOT NULL,
            item_id BIGINT NOT NULL,
            price BIGINT NOT NULL,
            quantity BIGINT NOT NULL
        );
        SELECT create_hypertable('market_prices', 'time',
            chunk_time_interval => INTERVAL '1 week',
            if_not_exists => TRUE
        );
        CREATE INDEX IF NOT EXISTS idx_market_prices_item_time ON market_prices (item_id, time DESC);
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| DatabaseError::SchemaError(e.to_string()))?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS bazaar_prices (
            time TIMESTAMPTZ NOT NULL,
            item_id BIGINT NOT NULL,
            price BIGINT NOT NULL,
            quantity BIGINT NOT NULL,
            seller_id BIGINT
        );
        SELECT create_hypertable('bazaar_prices', 'time',
            chunk_time_interval => INTERVAL '1 week',
            if_not_exists => TRUE
        );
        CREATE INDEX IF NOT EXISTS idx_bazaar_prices_item_time ON bazaar_prices (item_id, time DESC);
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| DatabaseError::SchemaError(e.to_string()))?;

    sqlx::query(&format!(
        "SELECT add_retention_policy('market_prices', INTERVAL '{days} days', if_not_exists => TRUE)",
        days = retention_days
    ))
    .execute(pool)
    .await
    .map_err(|e| DatabaseError::SchemaError(e.to_string()))?;

    sqlx::query(&format!(
        "SELECT add_retention_policy('bazaar_prices', INTERVAL '{days} days', if_not_exists => TRUE)",
        days = retention_days
    ))
    .execute(pool)
    .await
    .map_err(|e| DatabaseError::SchemaError(e.to_string()))?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS api_keys (
            id BIGSERIAL PRIMARY KEY,
            encrypted_key BYTEA NOT NULL,
            label TEXT NOT NULL,
            is_active BOOLEAN NOT NULL DEFAULT TRUE,
            usage_count BIGINT NOT NULL DEFAULT 0,
            error_count INTEGER NOT NULL DEFAULT 0,
            last_used_at TIMESTAMPTZ
        );
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| DatabaseError::SchemaError(e.to_string()))?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id BIGINT PRIMARY KEY
        );
        CREATE TABLE IF NOT EXISTS user_watchlists (
            user_id BIGINT NOT NULL,
            item_id BIGINT NOT NULL,
            PRIMARY KEY (user_id, item_id)
        );
        CREATE TABLE IF NOT EXISTS user_alerts (
            user_id BIGINT NOT NULL,
            item_id BIGINT NOT NULL,
            price_above BIGINT,
            price_below BIGINT,
            change_percent DOUBLE PRECISION,
            PRIMARY KEY (user_id, item_id)
        );
        CREATE TABLE IF NOT EXISTS alert_states (
            item_id BIGINT NOT NULL,
            user_id BIGINT NOT NULL,
            last_hash TEXT NOT NULL,
            last_triggered_at TIMESTAMPTZ NOT NULL,
            PRIMARY KEY (item_id, user_id)
        );
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| DatabaseError::SchemaError(e.to_string()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_error_formats_message() {
        let err = DatabaseError::SchemaError("boom".to_string());
        assert_eq!(err.to_string(), "schema initialization failed: boom");
    }
}
