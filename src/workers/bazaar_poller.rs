//! The bazaar scheduler (§4.4): each tick splits a shared rate budget
//! between watched items (Phase 1) and stale tracked items (Phase 2), and
//! fans fetches out across a bounded semaphore.
//!
//! Version dependencies:
//! - tokio = "1.28"
//! - tokio-util = "0.7"

use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::item_health::ItemHealthMap;
use crate::models::observation::{PriceObservation, PriceSource};
use crate::models::watch::PriceUpdate;
use crate::store::Store;
use crate::upstream::types::ExternalBazaarListing;
use crate::upstream::UpstreamClient;
use crate::utils::metrics::MetricsCollector;
use crate::utils::time::current_timestamp;

const STALENESS_MINUTES: i64 = 5;
const FETCH_SOURCE: &str = "bazaar";

pub struct BazaarPoller {
    store: Arc<dyn Store>,
    upstream: Arc<dyn UpstreamClient>,
    item_health: Arc<ItemHealthMap>,
    alert_tx: mpsc::Sender<PriceUpdate>,
    interval: Duration,
    bazaar_rate_limit: u32,
    max_concurrent: usize,
    metrics: MetricsCollector,
    token: CancellationToken,
}

impl BazaarPoller {
    pub fn new(
        store: Arc<dyn Store>,
        upstream: Arc<dyn UpstreamClient>,
        item_health: Arc<ItemHealthMap>,
        alert_tx: mpsc::Sender<PriceUpdate>,
        interval: Duration,
        bazaar_rate_limit: u32,
        max_concurrent: usize,
        token: CancellationToken,
    ) -> Self {
        let metrics = MetricsCollector::new().expect("metrics registry initialization cannot fail");
        Self { store, upstream, item_health, alert_tx, interval, bazaar_rate_limit, max_concurrent, metrics, token }
    }

    fn tick_budget(&self) -> usize {
        let per_second = self.bazaar_rate_limit as f64 / 60.0;
        (per_second * self.interval.as_secs_f64()).floor().max(0.0) as usize
    }

    #[instrument(skip(self), name = "bazaar_poller")]
    pub async fn run(self: Arc<Self>) {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.token.cancelled() => {
                    info!("bazaar poller shutting down");
                    return;
                }
                _ = ticker.tick() => {
                    self.clone().run_tick().await;
                }
            }
        }
    }

    /// One scheduling tick: Phase 1 (watched, not in cooldown) then Phase 2
    /// (stale tracked items) up to the remaining budget. Exposed `pub` so
    /// integration tests can drive a single tick against fakes without the
    /// real ticker loop.
    pub async fn run_tick(self: Arc<Self>) {
        let budget = self.tick_budget();

        let watched = match self.store.watched_items().await {
            Ok(items) => items,
            Err(e) => {
                error!(error = %e, "failed to load watched items");
                return;
            }
        };
        let watched: Vec<i64> = watched.into_iter().filter(|id| !self.item_health.in_cooldown(*id)).collect();
        let phase1_issued = watched.len();

        let remaining = budget.saturating_sub(phase1_issued);
        let stale = if remaining > 0 {
            match self
                .store
                .stale_tracked_items(&watched, chrono::Duration::minutes(STALENESS_MINUTES), remaining)
                .await
            {
                Ok(items) => items,
                Err(e) => {
                    error!(error = %e, "failed to load stale tracked items");
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        debug!(budget, watched = phase1_issued, stale = stale.len(), "bazaar poller tick");

        let targets: Vec<i64> = watched.into_iter().chain(stale).collect();
        if targets.is_empty() {
            return;
        }

        let semaphore = Arc::new(Semaphore::new(self.max_concurrent.max(1)));
        let mut tasks = JoinSet::new();

        for item_id in targets {
            let this = self.clone();
            let permit = semaphore.clone();
            tasks.spawn(async move {
                let _permit = permit.acquire_owned().await.expect("semaphore not closed");
                this.fetch_one(item_id).await;
            });
        }

        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                warn!(error = %e, "bazaar fetch task panicked");
            }
        }
    }

    async fn fetch_one(&self, item_id: i64) {
        let started = Instant::now();
        match self.upstream.fetch_bazaar_external(item_id, &self.token).await {
            Ok(listings) if !listings.is_empty() => {
                self.metrics.record_fetch(FETCH_SOURCE, "success", started.elapsed().as_secs_f64());
                self.handle_listings(item_id, listings).await;
            }
            Ok(_) => {
                self.metrics.record_fetch(FETCH_SOURCE, "empty", started.elapsed().as_secs_f64());
                if let Err(e) = self.store.touch_item(item_id, current_timestamp()).await {
                    error!(item_id, error = %e, "failed to touch item after empty bazaar response");
                }
            }
            Err(e) => {
                self.metrics.record_fetch(FETCH_SOURCE, "failure", started.elapsed().as_secs_f64());
                debug!(item_id, error = %e, "bazaar fetch failed");
                self.item_health.record_failure(item_id);
            }
        }
    }

    async fn handle_listings(&self, item_id: i64, listings: Vec<ExternalBazaarListing>) {
        let minimum = minimum_listing(&listings);
        let now = current_timestamp();

        let observation = match PriceObservation::new(
            now,
            item_id,
            PriceSource::Bazaar,
            minimum.price,
            minimum.quantity,
            Some(minimum.seller_id),
        ) {
            Ok(obs) => obs,
            Err(e) => {
                warn!(item_id, error = %e, "bazaar listing failed observation validation");
                return;
            }
        };

        if let Err(e) = self.store.insert_observation(&observation).await {
            error!(item_id, error = %e, "failed to persist bazaar observation");
            return;
        }

        let previous_price = self.store.cached_price(item_id, PriceSource::Bazaar).await.ok().flatten();

        if let Err(e) = self
            .store
            .update_item_price_cache(item_id, PriceSource::Bazaar, Some(minimum.price), now)
            .await
        {
            error!(item_id, error = %e, "failed to update item price cache");
        }
        self.item_health.record_success(item_id);

        let item_name = self.store.item_name(item_id).await.ok().flatten().unwrap_or_default();
        let update = PriceUpdate {
            item_id,
            item_name,
            price: minimum.price,
            source: PriceSource::Bazaar,
            quantity: minimum.quantity,
            seller_id: Some(minimum.seller_id),
            listing_id: None,
            previous_price,
        };
        if self.alert_tx.send(update).await.is_err() {
            warn!(item_id, "alert evaluator channel closed, dropping price update");
        }
    }
}

/// Smallest `price` wins; on a tie the earlier entry in the response wins
/// (§4.4).
fn minimum_listing(listings: &[ExternalBazaarListing]) -> &ExternalBazaarListing {
    let mut best = &listings[0];
    for listing in &listings[1..] {
        if listing.price < best.price {
            best = listing;
        }
    }
    best
}
