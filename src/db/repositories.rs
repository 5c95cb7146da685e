//! Postgres/TimescaleDB-backed implementation of `crate::store::Store`.
//!
//! Version dependencies:
//! - sqlx = { version = "0.7", features = ["postgres", "chrono"] }
//! - async-trait = "0.1"

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use tracing::instrument;

use crate::models::credential::ApiCredential;
use crate::models::item::{Item, ItemCatalogEntry};
use crate::models::observation::{PriceObservation, PriceSource};
use crate::models::watch::{AlertState, UserAlert};
use crate::store::{Store, StoreError};
use crate::utils::crypto::EncryptedKey;

pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn row_to_item(row: &sqlx::postgres::PgRow) -> Item {
    Item {
        id: row.get("id"),
        name: row.get("name"),
        description: row.get("description"),
        item_type: row.get("item_type"),
        circulation: row.get("circulation"),
        is_tracked: row.get("is_tracked"),
        last_market_price: row.get("last_market_price"),
        last_bazaar_price: row.get("last_bazaar_price"),
        last_updated_at: row.get("last_updated_at"),
    }
}

#[async_trait]
impl Store for PostgresStore {
    #[instrument(skip(self, observation))]
    async fn insert_observation(&self, observation: &PriceObservation) -> Result<(), StoreError> {
        match observation.source {
            PriceSource::Market => {
                sqlx::query(
                    "INSERT INTO market_prices (time, item_id, price, quantity) VALUES ($1, $2, $3, $4)",
                )
                .bind(observation.time)
                .bind(observation.item_id)
                .bind(observation.price)
                .bind(observation.quantity)
                .execute(&self.pool)
                .await?;
            }
            PriceSource::Bazaar => {
                sqlx::query(
                    "INSERT INTO bazaar_prices (time, item_id, price, quantity, seller_id) VALUES ($1, $2, $3, $4, $5)",
                )
                .bind(observation.time)
                .bind(observation.item_id)
                .bind(observation.price)
                .bind(observation.quantity)
                .bind(observation.seller_id)
                .execute(&self.pool)
                .await?;
            }
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn update_item_price_cache(
        &self,
        item_id: i64,
        source: PriceSource,
        price: Option<i64>,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let column = match source {
            PriceSource::Market => "last_market_price",
            PriceSource::Bazaar => "last_bazaar_price",
        };
        if let Some(price) = price.filter(|p| *p > 0) {
            let query = format!("UPDATE items SET {column} = $1, last_updated_at = $2 WHERE id = $3");
            sqlx::query(&query)
                .bind(price)
                .bind(at)
                .bind(item_id)
                .execute(&self.pool)
                .await?;
        } else {
            self.touch_item(item_id, at).await?;
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn touch_item(&self, item_id: i64, at: DateTime<Utc>) -> Result<(), StoreError> {
        sqlx::query("UPDATE items SET last_updated_at = $1 WHERE id = $2")
            .bind(at)
            .bind(item_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn cached_price(&self, item_id: i64, source: PriceSource) -> Result<Option<i64>, StoreError> {
        let column = match source {
            PriceSource::Market => "last_market_price",
            PriceSource::Bazaar => "last_bazaar_price",
        };
        let query = format!("SELECT {column} AS price FROM items WHERE id = $1");
        let row = sqlx::query(&query).bind(item_id).fetch_optional(&self.pool).await?;
        Ok(row.and_then(|r| r.get::<Option<i64>, _>("price")))
    }

    #[instrument(skip(self))]
    async fn watched_items(&self) -> Result<Vec<i64>, StoreError> {
        let rows = sqlx::query("SELECT DISTINCT item_id FROM user_watchlists")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|r| r.get("item_id")).collect())
    }

    #[instrument(skip(self, exclude))]
    async fn stale_tracked_items(
        &self,
        exclude: &[i64],
        staleness: chrono::Duration,
        limit: usize,
    ) -> Result<Vec<i64>, StoreError> {
        let cutoff = Utc::now() - staleness;
        let rows = sqlx::query(
            r#"
            SELECT id FROM items
            WHERE is_tracked
              AND NOT (id = ANY($1))
              AND (last_updated_at IS NULL OR last_updated_at < $2)
            ORDER BY last_updated_at ASC NULLS FIRST
            LIMIT $3
            "#,
        )
        .bind(exclude)
        .bind(cutoff)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|r| r.get("id")).collect())
    }

    #[instrument(skip(self))]
    async fn next_crawl_candidate(&self) -> Result<Option<Item>, StoreError> {
        let row = sqlx::query(
            r#"
            WITH watched AS (
                SELECT DISTINCT item_id FROM user_watchlists
            ),
            candidates AS (
                SELECT i.id, i.name, i.description, i.item_type, i.circulation, i.is_tracked,
                       i.last_market_price, i.last_bazaar_price, i.last_updated_at, 1 AS priority
                FROM items i
                JOIN watched w ON w.item_id = i.id
                WHERE i.last_updated_at IS NULL OR i.last_updated_at < now() - INTERVAL '60 seconds'

                UNION ALL

                SELECT i.id, i.name, i.description, i.item_type, i.circulation, i.is_tracked,
                       i.last_market_price, i.last_bazaar_price, i.last_updated_at, 2 AS priority
                FROM items i
                WHERE i.is_tracked
                  AND i.circulation > 10000
                  AND NOT EXISTS (SELECT 1 FROM watched w WHERE w.item_id = i.id)
                  AND (i.last_updated_at IS NULL OR i.last_updated_at < now() - INTERVAL '1 hour')

                UNION ALL

                SELECT i.id, i.name, i.description, i.item_type, i.circulation, i.is_tracked,
                       i.last_market_price, i.last_bazaar_price, i.last_updated_at, 3 AS priority
                FROM items i
                WHERE i.is_tracked
                  AND i.circulation <= 10000
                  AND NOT EXISTS (SELECT 1 FROM watched w WHERE w.item_id = i.id)
                  AND (i.last_updated_at IS NULL OR i.last_updated_at < now() - INTERVAL '24 hours')
            )
            SELECT id, name, description, item_type, circulation, is_tracked,
                   last_market_price, last_bazaar_price, last_updated_at
            FROM candidates
            ORDER BY priority ASC, last_updated_at ASC NULLS FIRST
            LIMIT 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(row_to_item))
    }

    #[instrument(skip(self))]
    async fn item_name(&self, item_id: i64) -> Result<Option<String>, StoreError> {
        let row = sqlx::query("SELECT name FROM items WHERE id = $1")
            .bind(item_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get("name")))
    }

    #[instrument(skip(self))]
    async fn alerts_for_item(&self, item_id: i64) -> Result<Vec<UserAlert>, StoreError> {
        let rows = sqlx::query(
            "SELECT user_id, item_id, price_above, price_below, change_percent FROM user_alerts WHERE item_id = $1",
        )
        .bind(item_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| UserAlert {
                user_id: r.get("user_id"),
                item_id: r.get("item_id"),
                price_above: r.get("price_above"),
                price_below: r.get("price_below"),
                change_percent: r.get("change_percent"),
            })
            .collect())
    }

    #[instrument(skip(self))]
    async fn alert_state(&self, item_id: i64, user_id: i64) -> Result<Option<AlertState>, StoreError> {
        let row = sqlx::query(
            "SELECT item_id, user_id, last_hash, last_triggered_at FROM alert_states WHERE item_id = $1 AND user_id = $2",
        )
        .bind(item_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| AlertState {
            item_id: r.get("item_id"),
            user_id: r.get("user_id"),
            last_hash: r.get("last_hash"),
            last_triggered_at: r.get("last_triggered_at"),
        }))
    }

    #[instrument(skip(self, state))]
    async fn upsert_alert_state(&self, state: &AlertState) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO alert_states (item_id, user_id, last_hash, last_triggered_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (item_id, user_id)
            DO UPDATE SET last_hash = EXCLUDED.last_hash, last_triggered_at = EXCLUDED.last_triggered_at
            "#,
        )
        .bind(state.item_id)
        .bind(state.user_id)
        .bind(&state.last_hash)
        .bind(state.last_triggered_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    #[instrument(skip(self, entries))]
    async fn upsert_catalog(&self, entries: &[ItemCatalogEntry]) -> Result<(), StoreError> {
        for entry in entries {
            let is_tracked_on_insert = entry.circulation > 0;
            sqlx::query(
                r#"
                INSERT INTO items (id, name, description, item_type, circulation, is_tracked, last_market_price)
                VALUES ($1, $2, $3, $4, $5, $6, NULLIF($7, 0))
                ON CONFLICT (id) DO UPDATE SET
                    name = EXCLUDED.name,
                    description = EXCLUDED.description,
                    item_type = EXCLUDED.item_type,
                    circulation = EXCLUDED.circulation,
                    last_market_price = CASE WHEN EXCLUDED.last_market_price > 0
                        THEN EXCLUDED.last_market_price ELSE items.last_market_price END,
                    is_tracked = CASE WHEN EXCLUDED.circulation = 0 THEN FALSE ELSE items.is_tracked END
                "#,
            )
            .bind(entry.id)
            .bind(&entry.name)
            .bind(&entry.description)
            .bind(&entry.item_type)
            .bind(entry.circulation)
            .bind(is_tracked_on_insert)
            .bind(entry.market_value)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn active_credentials(&self) -> Result<Vec<ApiCredential>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, encrypted_key, label, is_active, usage_count, error_count, last_used_at FROM api_keys WHERE is_active",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| ApiCredential {
                id: r.get("id"),
                encrypted_key: EncryptedKey(r.get("encrypted_key")),
                label: r.get("label"),
                is_active: r.get("is_active"),
                usage_count: r.get::<i64, _>("usage_count") as u64,
                error_count: r.get::<i32, _>("error_count") as u32,
                last_used_at: r.get("last_used_at"),
            })
            .collect())
    }

    #[instrument(skip(self, credential))]
    async fn record_credential_outcome(&self, credential: &ApiCredential) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE api_keys
            SET is_active = $1, usage_count = $2, error_count = $3, last_used_at = $4
            WHERE id = $5
            "#,
        )
        .bind(credential.is_active)
        .bind(credential.usage_count as i64)
        .bind(credential.error_count as i32)
        .bind(credential.last_used_at)
        .bind(credential.id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
