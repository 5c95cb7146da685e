//! In-memory `Store` and scripted `UpstreamClient` fakes shared by the
//! integration tests under `tests/`. No network, no database — these
//! stand in for the trait seams a real suite would point at Postgres and
//! `wiremock`.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use item_price_ingestor::models::{
    AlertState, ApiCredential, Item, ItemCatalogEntry, PriceObservation, PriceSource, UserAlert,
};
use item_price_ingestor::store::{Store, StoreError};
use item_price_ingestor::upstream::types::ExternalBazaarListing;
use item_price_ingestor::upstream::{MarketFetch, UpstreamClient, UpstreamError};

#[derive(Default)]
pub struct InMemoryStore {
    pub items: Mutex<HashMap<i64, Item>>,
    pub observations: Mutex<Vec<PriceObservation>>,
    pub cached_prices: Mutex<HashMap<(i64, PriceSourceKey), i64>>,
    pub watched: Mutex<HashSet<i64>>,
    pub alerts: Mutex<HashMap<i64, Vec<UserAlert>>>,
    pub alert_states: Mutex<HashMap<(i64, i64), AlertState>>,
    pub credentials: Mutex<Vec<ApiCredential>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PriceSourceKey {
    Market,
    Bazaar,
}

impl From<PriceSource> for PriceSourceKey {
    fn from(s: PriceSource) -> Self {
        match s {
            PriceSource::Market => PriceSourceKey::Market,
            PriceSource::Bazaar => PriceSourceKey::Bazaar,
        }
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_item(&self, item: Item) {
        self.items.lock().unwrap().insert(item.id, item);
    }

    pub fn seed_watch(&self, item_id: i64) {
        self.watched.lock().unwrap().insert(item_id);
    }

    pub fn seed_alert(&self, alert: UserAlert) {
        self.alerts.lock().unwrap().entry(alert.item_id).or_default().push(alert);
    }

    pub fn observation_count(&self, source: PriceSource) -> usize {
        self.observations.lock().unwrap().iter().filter(|o| o.source == source).count()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn insert_observation(&self, observation: &PriceObservation) -> Result<(), StoreError> {
        self.observations.lock().unwrap().push(observation.clone());
        Ok(())
    }

    async fn update_item_price_cache(
        &self,
        item_id: i64,
        source: PriceSource,
        price: Option<i64>,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        if let Some(price) = price {
            if price > 0 {
                self.cached_prices.lock().unwrap().insert((item_id, source.into()), price);
            }
        }
        if let Some(item) = self.items.lock().unwrap().get_mut(&item_id) {
            item.last_updated_at = Some(at);
            match source {
                PriceSource::Market => {
                    if let Some(p) = price.filter(|p| *p > 0) {
                        item.last_market_price = Some(p);
                    }
                }
                PriceSource::Bazaar => {
                    if let Some(p) = price.filter(|p| *p > 0) {
                        item.last_bazaar_price = Some(p);
                    }
                }
            }
        }
        Ok(())
    }

    async fn touch_item(&self, item_id: i64, at: DateTime<Utc>) -> Result<(), StoreError> {
        if let Some(item) = self.items.lock().unwrap().get_mut(&item_id) {
            item.last_updated_at = Some(at);
        }
        Ok(())
    }

    async fn cached_price(&self, item_id: i64, source: PriceSource) -> Result<Option<i64>, StoreError> {
        Ok(self.cached_prices.lock().unwrap().get(&(item_id, source.into())).copied())
    }

    async fn watched_items(&self) -> Result<Vec<i64>, StoreError> {
        Ok(self.watched.lock().unwrap().iter().copied().collect())
    }

    async fn stale_tracked_items(
        &self,
        exclude: &[i64],
        staleness: chrono::Duration,
        limit: usize,
    ) -> Result<Vec<i64>, StoreError> {
        let cutoff = Utc::now() - staleness;
        let exclude: HashSet<i64> = exclude.iter().copied().collect();
        let items = self.items.lock().unwrap();
        let mut candidates: Vec<&Item> = items
            .values()
            .filter(|i| i.is_tracked && !exclude.contains(&i.id))
            .filter(|i| i.last_updated_at.map(|t| t < cutoff).unwrap_or(true))
            .collect();
        candidates.sort_by_key(|i| i.last_updated_at);
        Ok(candidates.into_iter().take(limit).map(|i| i.id).collect())
    }

    async fn next_crawl_candidate(&self) -> Result<Option<Item>, StoreError> {
        let items = self.items.lock().unwrap();
        let watched = self.watched.lock().unwrap();

        let mut tiered: Vec<(u8, &Item)> = items
            .values()
            .filter(|i| i.is_tracked)
            .map(|i| {
                let tier = if watched.contains(&i.id) {
                    1
                } else if i.is_high_circulation() {
                    2
                } else {
                    3
                };
                (tier, i)
            })
            .collect();
        tiered.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.last_updated_at.cmp(&b.1.last_updated_at)));
        Ok(tiered.into_iter().next().map(|(_, i)| i.clone()))
    }

    async fn item_name(&self, item_id: i64) -> Result<Option<String>, StoreError> {
        Ok(self.items.lock().unwrap().get(&item_id).map(|i| i.name.clone()))
    }

    async fn alerts_for_item(&self, item_id: i64) -> Result<Vec<UserAlert>, StoreError> {
        Ok(self.alerts.lock().unwrap().get(&item_id).cloned().unwrap_or_default())
    }

    async fn alert_state(&self, item_id: i64, user_id: i64) -> Result<Option<AlertState>, StoreError> {
        Ok(self.alert_states.lock().unwrap().get(&(item_id, user_id)).cloned())
    }

    async fn upsert_alert_state(&self, state: &AlertState) -> Result<(), StoreError> {
        self.alert_states.lock().unwrap().insert((state.item_id, state.user_id), state.clone());
        Ok(())
    }

    async fn upsert_catalog(&self, entries: &[ItemCatalogEntry]) -> Result<(), StoreError> {
        let mut items = self.items.lock().unwrap();
        for entry in entries {
            items
                .entry(entry.id)
                .and_modify(|existing| {
                    existing.name = entry.name.clone();
                    existing.description = entry.description.clone();
                    existing.item_type = entry.item_type.clone();
                    existing.circulation = entry.circulation;
                    if entry.circulation == 0 {
                        existing.is_tracked = false;
                    }
                })
                .or_insert_with(|| Item {
                    id: entry.id,
                    name: entry.name.clone(),
                    description: entry.description.clone(),
                    item_type: entry.item_type.clone(),
                    circulation: entry.circulation,
                    is_tracked: entry.circulation > 0,
                    last_market_price: None,
                    last_bazaar_price: None,
                    last_updated_at: None,
                });
        }
        Ok(())
    }

    async fn active_credentials(&self) -> Result<Vec<ApiCredential>, StoreError> {
        Ok(self.credentials.lock().unwrap().iter().filter(|c| c.is_active).cloned().collect())
    }

    async fn record_credential_outcome(&self, credential: &ApiCredential) -> Result<(), StoreError> {
        if let Some(existing) = self.credentials.lock().unwrap().iter_mut().find(|c| c.id == credential.id) {
            *existing = credential.clone();
        }
        Ok(())
    }
}

/// Scripted upstream responses, keyed by item id. Any item without a
/// queued response falls back to a default single-listing success so
/// scheduling tests don't need to script every target.
#[derive(Default)]
pub struct ScriptedUpstreamClient {
    pub catalog: Mutex<HashMap<i64, ItemCatalogEntry>>,
    pub market_responses: Mutex<HashMap<i64, VecDeque<Result<MarketFetch, UpstreamError>>>>,
    pub bazaar_responses: Mutex<HashMap<i64, VecDeque<Result<Vec<ExternalBazaarListing>, UpstreamError>>>>,
    pub bazaar_calls: Mutex<Vec<i64>>,
}

impl ScriptedUpstreamClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_bazaar(&self, item_id: i64, result: Result<Vec<ExternalBazaarListing>, UpstreamError>) {
        self.bazaar_responses.lock().unwrap().entry(item_id).or_default().push_back(result);
    }

    pub fn queue_market(&self, item_id: i64, result: Result<MarketFetch, UpstreamError>) {
        self.market_responses.lock().unwrap().entry(item_id).or_default().push_back(result);
    }
}

#[async_trait]
impl UpstreamClient for ScriptedUpstreamClient {
    async fn fetch_catalog(
        &self,
        _token: &CancellationToken,
    ) -> Result<HashMap<i64, ItemCatalogEntry>, UpstreamError> {
        Ok(self.catalog.lock().unwrap().clone())
    }

    async fn fetch_market(
        &self,
        item_id: i64,
        _credential: &str,
        _token: &CancellationToken,
    ) -> Result<MarketFetch, UpstreamError> {
        let mut responses = self.market_responses.lock().unwrap();
        match responses.get_mut(&item_id).and_then(VecDeque::pop_front) {
            Some(result) => result,
            None => Ok(MarketFetch::default()),
        }
    }

    async fn fetch_bazaar_external(
        &self,
        item_id: i64,
        _token: &CancellationToken,
    ) -> Result<Vec<ExternalBazaarListing>, UpstreamError> {
        self.bazaar_calls.lock().unwrap().push(item_id);
        let mut responses = self.bazaar_responses.lock().unwrap();
        match responses.get_mut(&item_id).and_then(VecDeque::pop_front) {
            Some(result) => result,
            None => Ok(vec![ExternalBazaarListing { price: 100, quantity: 1, seller_id: 1 }]),
        }
    }
}

pub fn tracked_item(id: i64, circulation: i64) -> Item {
    Item {
        id,
        name: format!("item-{id}"),
        description: String::new(),
        item_type: "Misc".to_string(),
        circulation,
        is_tracked: true,
        last_market_price: None,
        last_bazaar_price: None,
        last_updated_at: None,
    }
}
