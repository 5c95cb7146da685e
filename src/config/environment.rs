//! Process-wide tunables: the recognized configuration options table from
//! the spec (§6.3) — worker tick intervals, rate budgets, and thresholds —
//! plus the upstream endpoints and `NODE_ENV`.
//!
//! Version dependencies:
//! - serde = "1.0"
//! - dotenvy = "0.15"

use dotenvy::dotenv;
use serde::Deserialize;
use std::env;
use std::time::Duration;
use tracing::{info, warn};
use url::Url;

pub const PRODUCTION_ENV: &str = "production";
pub const STAGING_ENV: &str = "staging";
pub const DEVELOPMENT_ENV: &str = "development";

pub const DEFAULT_BAZAAR_POLL_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_BACKGROUND_CRAWL_INTERVAL_MS: u64 = 500;
pub const DEFAULT_GLOBAL_SYNC_INTERVAL_SECS: u64 = 24 * 60 * 60;
pub const DEFAULT_MAX_CONCURRENT_FETCHES: usize = 50;
pub const DEFAULT_BAZAAR_RATE_LIMIT: u32 = 1800;
pub const DEFAULT_API_RATE_LIMIT: u32 = 100;
pub const DEFAULT_ALERT_COOLDOWN_SECS: i64 = 5 * 60;
pub const DEFAULT_PRICE_THRESHOLD: f64 = 0.05;

const REQUIRED_ENV_VARS: &[&str] = &["OFFICIAL_API_BASE", "BAZAAR_API_BASE"];

/// Process-wide configuration: worker cadences, rate budgets, and the
/// upstream endpoints. Durations are parsed eagerly so the rest of the
/// codebase works with `Duration`/`Decimal`-shaped values, not raw strings.
#[derive(Debug, Clone, Deserialize)]
pub struct EnvironmentConfig {
    pub node_env: String,
    pub log_level: Option<String>,

    pub official_api_base: String,
    pub bazaar_api_base: String,
    /// Static fallback credentials used when KeyManager's active set is
    /// empty, loaded once at startup (§4.2).
    pub static_fallback_keys: Vec<String>,

    pub bazaar_poll_interval: Duration,
    pub background_crawl_interval: Duration,
    pub global_sync_interval: Duration,

    pub max_concurrent_fetches: usize,
    pub bazaar_rate_limit: u32,
    pub api_rate_limit: u32,

    pub alert_cooldown: Duration,
    pub price_threshold: f64,
}

impl EnvironmentConfig {
    pub fn new() -> Self {
        Self {
            node_env: DEVELOPMENT_ENV.to_string(),
            log_level: Some("debug".to_string()),
            official_api_base: String::new(),
            bazaar_api_base: String::new(),
            static_fallback_keys: Vec::new(),
            bazaar_poll_interval: Duration::from_secs(DEFAULT_BAZAAR_POLL_INTERVAL_SECS),
            background_crawl_interval: Duration::from_millis(DEFAULT_BACKGROUND_CRAWL_INTERVAL_MS),
            global_sync_interval: Duration::from_secs(DEFAULT_GLOBAL_SYNC_INTERVAL_SECS),
            max_concurrent_fetches: DEFAULT_MAX_CONCURRENT_FETCHES,
            bazaar_rate_limit: DEFAULT_BAZAAR_RATE_LIMIT,
            api_rate_limit: DEFAULT_API_RATE_LIMIT,
            alert_cooldown: Duration::from_secs(DEFAULT_ALERT_COOLDOWN_SECS as u64),
            price_threshold: DEFAULT_PRICE_THRESHOLD,
        }
    }

    pub fn is_production(&self) -> bool {
        self.node_env == PRODUCTION_ENV
    }

    pub fn is_staging(&self) -> bool {
        self.node_env == STAGING_ENV
    }

    pub fn is_development(&self) -> bool {
        self.node_env == DEVELOPMENT_ENV
    }

    /// Loads configuration from the process environment (and `.env` if
    /// present), falling back to the defaults above for anything optional.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        dotenv().ok();

        for var in REQUIRED_ENV_VARS {
            if env::var(var).is_err() {
                return Err(format!("Missing required environment variable: {var}").into());
            }
        }

        let node_env = env::var("NODE_ENV").unwrap_or_else(|_| DEVELOPMENT_ENV.to_string());
        if ![PRODUCTION_ENV, STAGING_ENV, DEVELOPMENT_ENV].contains(&node_env.as_str()) {
            return Err("Invalid NODE_ENV value".into());
        }

        let parse_secs = |name: &str, default: u64| -> Result<Duration, Box<dyn std::error::Error>> {
            let raw = env::var(name).unwrap_or_else(|_| default.to_string());
            Ok(Duration::from_secs(raw.parse()?))
        };
        let parse_millis = |name: &str, default: u64| -> Result<Duration, Box<dyn std::error::Error>> {
            let raw = env::var(name).unwrap_or_else(|_| default.to_string());
            Ok(Duration::from_millis(raw.parse()?))
        };

        let config = Self {
            node_env,
            log_level: env::var("LOG_LEVEL").ok(),
            official_api_base: env::var("OFFICIAL_API_BASE")?,
            bazaar_api_base: env::var("BAZAAR_API_BASE")?,
            static_fallback_keys: env::var("STATIC_FALLBACK_KEYS")
                .map(|v| v.split(',').filter(|s| !s.is_empty()).map(String::from).collect())
                .unwrap_or_default(),
            bazaar_poll_interval: parse_secs(
                "BAZAAR_POLL_INTERVAL_SECS",
                DEFAULT_BAZAAR_POLL_INTERVAL_SECS,
            )?,
            background_crawl_interval: parse_millis(
                "BACKGROUND_CRAWL_INTERVAL_MS",
                DEFAULT_BACKGROUND_CRAWL_INTERVAL_MS,
            )?,
            global_sync_interval: parse_secs(
                "GLOBAL_SYNC_INTERVAL_SECS",
                DEFAULT_GLOBAL_SYNC_INTERVAL_SECS,
            )?,
            max_concurrent_fetches: env::var("MAX_CONCURRENT_FETCHES")
                .unwrap_or_else(|_| DEFAULT_MAX_CONCURRENT_FETCHES.to_string())
                .parse()?,
            bazaar_rate_limit: env::var("BAZAAR_RATE_LIMIT")
                .unwrap_or_else(|_| DEFAULT_BAZAAR_RATE_LIMIT.to_string())
                .parse()?,
            api_rate_limit: env::var("API_RATE_LIMIT")
                .unwrap_or_else(|_| DEFAULT_API_RATE_LIMIT.to_string())
                .parse()?,
            alert_cooldown: parse_secs("ALERT_COOLDOWN_SECS", DEFAULT_ALERT_COOLDOWN_SECS as u64)?,
            price_threshold: env::var("PRICE_THRESHOLD")
                .unwrap_or_else(|_| DEFAULT_PRICE_THRESHOLD.to_string())
                .parse()?,
        };

        validate_environment(&config)?;
        Ok(config)
    }
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self::new()
    }
}

pub fn validate_environment(config: &EnvironmentConfig) -> Result<(), Box<dyn std::error::Error>> {
    for (endpoint, name) in [
        (&config.official_api_base, "official API"),
        (&config.bazaar_api_base, "bazaar aggregator"),
    ] {
        if let Err(e) = Url::parse(endpoint) {
            return Err(format!("Invalid {name} endpoint URL: {e}").into());
        }
    }

    if config.max_concurrent_fetches == 0 {
        return Err("max_concurrent_fetches must be at least 1".into());
    }
    if config.bazaar_rate_limit == 0 || config.api_rate_limit == 0 {
        return Err("rate limits must be positive".into());
    }
    if !(0.0..=1.0).contains(&config.price_threshold) {
        return Err("price_threshold must be a fraction between 0 and 1".into());
    }

    match config.node_env.as_str() {
        PRODUCTION_ENV => {
            if config.static_fallback_keys.is_empty() {
                warn!("production environment configured without a static fallback key list");
            }
        }
        STAGING_ENV => info!("running in staging environment"),
        DEVELOPMENT_ENV => info!("running in development environment"),
        _ => return Err("invalid environment".into()),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> EnvironmentConfig {
        let mut config = EnvironmentConfig::new();
        config.official_api_base = "https://api.example.com".to_string();
        config.bazaar_api_base = "https://bazaar.example.com".to_string();
        config
    }

    #[test]
    fn defaults_match_spec_table() {
        let config = EnvironmentConfig::new();
        assert_eq!(config.bazaar_poll_interval, Duration::from_secs(30));
        assert_eq!(config.background_crawl_interval, Duration::from_millis(500));
        assert_eq!(config.max_concurrent_fetches, 50);
        assert_eq!(config.bazaar_rate_limit, 1800);
        assert_eq!(config.api_rate_limit, 100);
        assert_eq!(config.alert_cooldown, Duration::from_secs(300));
        assert_eq!(config.price_threshold, 0.05);
    }

    #[test]
    fn validates_endpoint_urls() {
        let mut config = valid_config();
        assert!(validate_environment(&config).is_ok());
        config.official_api_base = "not a url".to_string();
        assert!(validate_environment(&config).is_err());
    }

    #[test]
    fn rejects_out_of_range_threshold() {
        let mut config = valid_config();
        config.price_threshold = 1.5;
        assert!(validate_environment(&config).is_err());
    }
}
