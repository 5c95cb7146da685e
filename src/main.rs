//! Entry point for the item price ingestion core.
//! Version: 0.1.0

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::signal;
use tracing::{error, info, warn};

use item_price_ingestor::config::{init_config, AppConfig};
use item_price_ingestor::db::{initialize_database_schema, PostgresStore};
use item_price_ingestor::item_health::ItemHealthMap;
use item_price_ingestor::key_manager::KeyManager;
use item_price_ingestor::rate_limiter::RateLimiter;
use item_price_ingestor::store::Store;
use item_price_ingestor::upstream::client::HttpUpstreamClient;
use item_price_ingestor::utils::logger::init_logger;
use item_price_ingestor::IngestionCore;

#[derive(Parser, Debug)]
#[command(name = "item-price-ingestor", about = "In-game item market data ingestion core")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Runs the ingestion core until a shutdown signal is received.
    Run,
    /// Applies the TimescaleDB schema (idempotent) and exits.
    Migrate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = init_config().map_err(|e| anyhow::anyhow!(e))?;
    init_logger(&config.logging).map_err(|e| anyhow::anyhow!(e.to_string()))?;
    info!(node_env = %config.environment.node_env, "configuration loaded");

    match cli.command {
        Command::Migrate => run_migrate(&config).await,
        Command::Run => run_core(config).await,
    }
}

async fn run_migrate(config: &AppConfig) -> Result<()> {
    let pool = config.database.build_pool().await.context("failed to connect to database")?;
    initialize_database_schema(&pool, config.database.retention_days)
        .await
        .context("failed to apply database schema")?;
    info!("schema migration completed");
    Ok(())
}

async fn run_core(config: AppConfig) -> Result<()> {
    let pool = config.database.build_pool().await.context("failed to connect to database")?;
    initialize_database_schema(&pool, config.database.retention_days)
        .await
        .context("failed to apply database schema")?;
    let store: Arc<dyn Store> = Arc::new(PostgresStore::new(pool));

    let redis_client = redis::Client::open(config.security.redis_url.clone())
        .context("invalid REDIS_URL")?;
    let redis_conn = redis::aio::ConnectionManager::new(redis_client)
        .await
        .context("failed to connect to redis")?;

    let api_rate_limiter =
        Arc::new(RateLimiter::new(redis_conn.clone(), "rl:api", config.environment.api_rate_limit));
    let bazaar_rate_limiter =
        Arc::new(RateLimiter::new(redis_conn, "rl:bazaar", config.environment.bazaar_rate_limit));

    let credentials = store.active_credentials().await.context("failed to load API credentials")?;
    let key_manager = Arc::new(KeyManager::new(
        credentials,
        config.security.encryption_key.clone(),
        config.environment.static_fallback_keys.clone(),
        store.clone(),
    ));

    let upstream = Arc::new(
        HttpUpstreamClient::new(
            config.environment.official_api_base.clone(),
            config.environment.bazaar_api_base.clone(),
            api_rate_limiter,
            bazaar_rate_limiter,
            key_manager.clone(),
        )
        .context("failed to build upstream HTTP client")?,
    );

    let item_health = Arc::new(ItemHealthMap::new());

    let (alert_tx, mut alert_rx) = tokio::sync::mpsc::channel(256);
    tokio::spawn(async move {
        while let Some(alert) = alert_rx.recv().await {
            info!(
                user_id = alert.user_id,
                item_id = alert.item_id,
                item_name = %alert.item_name,
                kind = ?alert.kind,
                price = alert.price,
                "outbound alert"
            );
        }
    });

    let core = IngestionCore::new(store, upstream, item_health, key_manager, config.environment, alert_tx);
    core.start().await;
    info!("ingestion core running, waiting for shutdown signal");

    wait_for_shutdown_signal().await;

    info!("shutdown signal received, draining workers");
    core.shutdown().await;
    Ok(())
}

async fn wait_for_shutdown_signal() {
    let ctrl_c = signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut terminate = match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler, relying on Ctrl+C only");
                let _ = ctrl_c.await;
                return;
            }
        };
        tokio::select! {
            _ = ctrl_c => info!("received Ctrl+C"),
            _ = terminate.recv() => info!("received SIGTERM"),
        }
    }
    #[cfg(not(unix))]
    {
        if let Err(e) = ctrl_c.await {
            error!(error = %e, "error waiting for Ctrl+C");
        }
    }
}
