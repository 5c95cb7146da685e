//! Fetches the full upstream catalog at startup and every `global_sync_interval`
//! thereafter, upserting every entry (§4.7).
//!
//! Version dependencies:
//! - tokio = "1.28"
//! - tokio-util = "0.7"

use std::sync::Arc;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument};

use crate::store::Store;
use crate::upstream::UpstreamClient;
use crate::utils::metrics::MetricsCollector;

pub struct CatalogSync {
    store: Arc<dyn Store>,
    upstream: Arc<dyn UpstreamClient>,
    interval: Duration,
    metrics: MetricsCollector,
    token: CancellationToken,
}

impl CatalogSync {
    pub fn new(store: Arc<dyn Store>, upstream: Arc<dyn UpstreamClient>, interval: Duration, token: CancellationToken) -> Self {
        let metrics = MetricsCollector::new().expect("metrics registry initialization cannot fail");
        Self { store, upstream, interval, metrics, token }
    }

    #[instrument(skip(self), name = "catalog_sync")]
    pub async fn run(self) {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.token.cancelled() => {
                    info!("catalog sync shutting down");
                    return;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.sync_once().await {
                        error!(error = %e, "catalog sync failed");
                    }
                }
            }
        }
    }

    /// One catalog fetch-and-upsert cycle. Exposed `pub` so integration
    /// tests can drive a sync against fakes without the real ticker loop.
    pub async fn sync_once(&self) -> anyhow::Result<()> {
        let catalog = self.upstream.fetch_catalog(&self.token).await?;
        let entries: Vec<_> = catalog.into_values().collect();
        info!(count = entries.len(), "fetched catalog");
        self.store.upsert_catalog(&entries).await?;
        self.metrics.record_catalog_rows("upsert", entries.len() as u64);
        Ok(())
    }
}
