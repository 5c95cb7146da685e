//! Single-slot official-API crawl (§4.5): picks one item per tick by
//! priority tier, deliberately cheap to stay well under the per-key
//! budget.
//!
//! Version dependencies:
//! - tokio = "1.28"
//! - tokio-util = "0.7"

use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::error::FailureClass;
use crate::key_manager::KeyManager;
use crate::models::item::Item;
use crate::models::observation::{PriceObservation, PriceSource};
use crate::models::watch::PriceUpdate;
use crate::store::Store;
use crate::upstream::types::MarketSection;
use crate::upstream::{MarketFetch, UpstreamClient};
use crate::utils::metrics::MetricsCollector;
use crate::utils::time::current_timestamp;

const FETCH_SOURCE: &str = "background_crawler";

pub struct BackgroundCrawler {
    store: Arc<dyn Store>,
    upstream: Arc<dyn UpstreamClient>,
    key_manager: Arc<KeyManager>,
    alert_tx: mpsc::Sender<PriceUpdate>,
    interval: Duration,
    metrics: MetricsCollector,
    token: CancellationToken,
}

impl BackgroundCrawler {
    pub fn new(
        store: Arc<dyn Store>,
        upstream: Arc<dyn UpstreamClient>,
        key_manager: Arc<KeyManager>,
        alert_tx: mpsc::Sender<PriceUpdate>,
        interval: Duration,
        token: CancellationToken,
    ) -> Self {
        let metrics = MetricsCollector::new().expect("metrics registry initialization cannot fail");
        Self { store, upstream, key_manager, alert_tx, interval, metrics, token }
    }

    #[instrument(skip(self), name = "background_crawler")]
    pub async fn run(self) {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.token.cancelled() => {
                    info!("background crawler shutting down");
                    return;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.run_tick().await {
                        error!(error = %e, "background crawl tick failed");
                    }
                }
            }
        }
    }

    /// One scheduling tick: picks a single crawl candidate and fetches it.
    /// Exposed `pub` so integration tests can drive a tick against fakes.
    pub async fn run_tick(&self) -> anyhow::Result<()> {
        let candidate = match self.store.next_crawl_candidate().await? {
            Some(item) => item,
            None => {
                debug!("no crawl candidate this tick");
                return Ok(());
            }
        };

        let credential = match self.key_manager.next() {
            Ok(Some((id, plaintext))) => Some((Some(id), plaintext)),
            Ok(None) => self.key_manager.static_fallback_key().map(|k| (None, k.to_string())),
            Err(e) => {
                warn!(error = %e, "key manager decryption failed");
                None
            }
        };

        let Some((credential_id, credential)) = credential else {
            warn!(item_id = candidate.id, "no credential available for crawl");
            return Ok(());
        };

        let started = Instant::now();
        match self.upstream.fetch_market(candidate.id, &credential, &self.token).await {
            Ok(fetch) => {
                self.metrics.record_fetch(FETCH_SOURCE, "success", started.elapsed().as_secs_f64());
                if let Some(id) = credential_id {
                    self.key_manager.record(id, true).await;
                }
                self.handle_fetch(&candidate, fetch).await?;
            }
            Err(e) => {
                self.metrics.record_fetch(FETCH_SOURCE, "failure", started.elapsed().as_secs_f64());
                if let Some(id) = credential_id {
                    if e.class() == FailureClass::Credential {
                        self.key_manager.mark_invalid(id).await;
                    } else {
                        self.key_manager.record(id, false).await;
                    }
                }
                debug!(item_id = candidate.id, error = %e, "background crawl fetch failed");
            }
        }

        Ok(())
    }

    async fn handle_fetch(&self, item: &Item, fetch: MarketFetch) -> anyhow::Result<()> {
        let now = current_timestamp();

        let market_min = self.persist_section(item, PriceSource::Market, fetch.market_section).await?;
        let bazaar_min = self.persist_section(item, PriceSource::Bazaar, fetch.bazaar_section).await?;

        let market_previous = self.store.cached_price(item.id, PriceSource::Market).await.ok().flatten();
        let bazaar_previous = self.store.cached_price(item.id, PriceSource::Bazaar).await.ok().flatten();

        self.store
            .update_item_price_cache(item.id, PriceSource::Market, market_min.as_ref().map(|m| m.0), now)
            .await?;
        self.store
            .update_item_price_cache(item.id, PriceSource::Bazaar, bazaar_min.as_ref().map(|m| m.0), now)
            .await?;
        self.store.touch_item(item.id, now).await?;

        for (price, quantity, seller_id, source, previous_price) in [
            market_min.map(|(p, q, s)| (p, q, s, PriceSource::Market, market_previous)),
            bazaar_min.map(|(p, q, s)| (p, q, s, PriceSource::Bazaar, bazaar_previous)),
        ]
        .into_iter()
        .flatten()
        {
            let update = PriceUpdate {
                item_id: item.id,
                item_name: item.name.clone(),
                price,
                source,
                quantity,
                seller_id,
                listing_id: None,
                previous_price,
            };
            if self.alert_tx.send(update).await.is_err() {
                warn!(item_id = item.id, "alert evaluator channel closed, dropping price update");
            }
        }

        Ok(())
    }

    /// Persists the cheapest listing in `section` (if any) and returns
    /// `(price, quantity, seller_id)` for the caller to use in the
    /// item-cache update and the outbound PriceUpdate.
    async fn persist_section(
        &self,
        item: &Item,
        source: PriceSource,
        section: Option<MarketSection>,
    ) -> anyhow::Result<Option<(i64, i64, Option<i64>)>> {
        let Some(section) = section else { return Ok(None) };
        let Some(listing) = minimum_listing(&section.listings) else { return Ok(None) };

        let observation = PriceObservation::new(
            current_timestamp(),
            item.id,
            source,
            listing.price,
            listing.quantity,
            listing.user_id,
        )?;
        self.store.insert_observation(&observation).await?;

        Ok(Some((listing.price, listing.quantity, listing.user_id)))
    }
}

fn minimum_listing(listings: &[crate::upstream::types::MarketListing]) -> Option<&crate::upstream::types::MarketListing> {
    listings.iter().fold(None, |best, listing| match best {
        None => Some(listing),
        Some(current) if listing.price < current.price => Some(listing),
        Some(current) => Some(current),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upstream::types::MarketListing;

    fn listing(price: i64, user_id: Option<i64>) -> MarketListing {
        MarketListing { id: 1, price, quantity: 1, user_id }
    }

    #[test]
    fn empty_listings_yield_none() {
        assert!(minimum_listing(&[]).is_none());
    }

    #[test]
    fn picks_the_cheapest_listing() {
        let listings = vec![listing(300, Some(1)), listing(100, Some(2)), listing(200, Some(3))];
        assert_eq!(minimum_listing(&listings).unwrap().user_id, Some(2));
    }
}
