//! The four background workers: each owns a `tokio::time::interval` and a
//! `CancellationToken` child of the root token held by `crate::lib::IngestionCore`.
//! None of them are fire-and-forget — the runner retains every `JoinHandle`
//! in a `JoinSet` and joins them on shutdown.

pub mod alert_evaluator;
pub mod background_crawler;
pub mod bazaar_poller;
pub mod catalog_sync;

pub use alert_evaluator::AlertEvaluator;
pub use background_crawler::BackgroundCrawler;
pub use bazaar_poller::BazaarPoller;
pub use catalog_sync::CatalogSync;
