//! Assembles the four background workers into one runnable core: the
//! `RateLimiter`s, `KeyManager`, `UpstreamClient`, `Store`, and
//! `ItemHealthMap` documented in the system overview.
//!
//! Version: 0.1.0

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

pub mod config;
pub mod db;
pub mod error;
pub mod item_health;
pub mod key_manager;
pub mod models;
pub mod rate_limiter;
pub mod store;
pub mod upstream;
pub mod utils;
pub mod workers;

pub use error::IngestionError;
pub use item_health::ItemHealthMap;
pub use key_manager::KeyManager;
pub use models::watch::OutboundAlert;
pub use rate_limiter::RateLimiter;
pub use store::Store;
pub use upstream::UpstreamClient;

use config::environment::EnvironmentConfig;
use workers::{AlertEvaluator, BackgroundCrawler, BazaarPoller, CatalogSync};

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);
const PRICE_UPDATE_CHANNEL_CAPACITY: usize = 1024;

/// Owns the root `CancellationToken` and the `JoinSet` every worker task
/// runs in. Constructed once per process; calling `start` twice would spawn
/// a second set of workers sharing the same token, which is never what a
/// caller wants.
pub struct IngestionCore {
    store: Arc<dyn Store>,
    upstream: Arc<dyn UpstreamClient>,
    item_health: Arc<ItemHealthMap>,
    key_manager: Arc<KeyManager>,
    environment: EnvironmentConfig,
    alert_sink: mpsc::Sender<OutboundAlert>,
    root_token: CancellationToken,
    tasks: Mutex<JoinSet<()>>,
}

impl IngestionCore {
    pub fn new(
        store: Arc<dyn Store>,
        upstream: Arc<dyn UpstreamClient>,
        item_health: Arc<ItemHealthMap>,
        key_manager: Arc<KeyManager>,
        environment: EnvironmentConfig,
        alert_sink: mpsc::Sender<OutboundAlert>,
    ) -> Self {
        Self {
            store,
            upstream,
            item_health,
            key_manager,
            environment,
            alert_sink,
            root_token: CancellationToken::new(),
            tasks: Mutex::new(JoinSet::new()),
        }
    }

    /// Spawns CatalogSync, BazaarPoller, BackgroundCrawler, and
    /// AlertEvaluator, each as its own `tokio::task` holding a child of the
    /// root cancellation token.
    #[instrument(skip(self))]
    pub async fn start(&self) {
        let (price_tx, price_rx) = mpsc::channel(PRICE_UPDATE_CHANNEL_CAPACITY);

        let catalog_sync = CatalogSync::new(
            self.store.clone(),
            self.upstream.clone(),
            self.environment.global_sync_interval,
            self.root_token.child_token(),
        );

        let bazaar_poller = Arc::new(BazaarPoller::new(
            self.store.clone(),
            self.upstream.clone(),
            self.item_health.clone(),
            price_tx.clone(),
            self.environment.bazaar_poll_interval,
            self.environment.bazaar_rate_limit,
            self.environment.max_concurrent_fetches,
            self.root_token.child_token(),
        ));

        let background_crawler = BackgroundCrawler::new(
            self.store.clone(),
            self.upstream.clone(),
            self.key_manager.clone(),
            price_tx.clone(),
            self.environment.background_crawl_interval,
            self.root_token.child_token(),
        );

        let alert_evaluator = AlertEvaluator::new(
            self.store.clone(),
            price_rx,
            self.alert_sink.clone(),
            self.environment.alert_cooldown,
            self.environment.price_threshold,
            self.root_token.child_token(),
        );

        // Drop our copy so the channel closes once every worker holding a
        // sender clone exits, letting AlertEvaluator's `recv` loop end.
        drop(price_tx);

        let mut tasks = self.tasks.lock().await;
        tasks.spawn(catalog_sync.run());
        tasks.spawn(bazaar_poller.run());
        tasks.spawn(background_crawler.run());
        tasks.spawn(alert_evaluator.run());

        info!("ingestion core started");
    }

    /// Cancels the root token and waits up to 30s for every worker to
    /// drain; aborts whatever remains after the timeout.
    #[instrument(skip(self))]
    pub async fn shutdown(&self) {
        self.root_token.cancel();
        let mut tasks = self.tasks.lock().await;

        let drain = async {
            while let Some(result) = tasks.join_next().await {
                if let Err(e) = result {
                    warn!(error = %e, "worker task panicked during shutdown");
                }
            }
        };

        if tokio::time::timeout(SHUTDOWN_TIMEOUT, drain).await.is_err() {
            warn!("workers did not drain within the shutdown timeout, aborting remainder");
            tasks.abort_all();
        } else {
            info!("ingestion core shut down cleanly");
        }
    }
}
