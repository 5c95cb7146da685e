//! The narrow persistence contract the workers depend on (§4.8), expressed
//! as an `async_trait` so they can be exercised against an in-memory fake
//! in tests. The Postgres-backed implementation lives in `crate::db`.
//!
//! Version dependencies:
//! - async-trait = "0.1"
//! - chrono = "0.4"

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::credential::ApiCredential;
use crate::models::item::{Item, ItemCatalogEntry};
use crate::models::observation::{PriceObservation, PriceSource};
use crate::models::watch::{AlertState, UserAlert};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("record not found: {0}")]
    NotFound(String),
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Appends one immutable row to `market_prices` or `bazaar_prices`,
    /// per `observation.source`.
    async fn insert_observation(&self, observation: &PriceObservation) -> Result<(), StoreError>;

    /// Updates `items.last_market_price`/`last_bazaar_price`/
    /// `last_updated_at` for one item. `price` is only applied when
    /// `Some` and positive — callers decide whether a zero/absent result
    /// should still advance `last_updated_at`.
    async fn update_item_price_cache(
        &self,
        item_id: i64,
        source: PriceSource,
        price: Option<i64>,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Just bumps `last_updated_at`, used on a successful fetch that
    /// returned no listings (§4.4 outcome 2).
    async fn touch_item(&self, item_id: i64, at: DateTime<Utc>) -> Result<(), StoreError>;

    /// The cached price for `item_id`/`source`, used by AlertEvaluator as
    /// the `last_cached` baseline for `change_percent` triggers.
    async fn cached_price(&self, item_id: i64, source: PriceSource) -> Result<Option<i64>, StoreError>;

    /// BazaarPoller Phase 1 (§4.4): items with at least one active watch.
    /// Cooldown filtering happens in-process against `ItemHealthMap`, not
    /// here — cooldown state is never persisted.
    async fn watched_items(&self) -> Result<Vec<i64>, StoreError>;

    /// BazaarPoller Phase 2 (§4.4): up to `limit` tracked, non-watched
    /// items stale by more than `staleness`, oldest (and nulls) first.
    async fn stale_tracked_items(
        &self,
        exclude: &[i64],
        staleness: chrono::Duration,
        limit: usize,
    ) -> Result<Vec<i64>, StoreError>;

    /// BackgroundCrawler's single-slot priority pick (§4.5): the highest
    /// priority candidate across the three tiers, or `None` if nothing
    /// qualifies.
    async fn next_crawl_candidate(&self) -> Result<Option<Item>, StoreError>;

    async fn item_name(&self, item_id: i64) -> Result<Option<String>, StoreError>;

    async fn alerts_for_item(&self, item_id: i64) -> Result<Vec<UserAlert>, StoreError>;

    async fn alert_state(&self, item_id: i64, user_id: i64) -> Result<Option<AlertState>, StoreError>;

    async fn upsert_alert_state(&self, state: &AlertState) -> Result<(), StoreError>;

    /// CatalogSync's bulk upsert (§4.7).
    async fn upsert_catalog(&self, entries: &[ItemCatalogEntry]) -> Result<(), StoreError>;

    async fn active_credentials(&self) -> Result<Vec<ApiCredential>, StoreError>;

    async fn record_credential_outcome(&self, credential: &ApiCredential) -> Result<(), StoreError>;
}
