//! Logging setup. One `tracing_subscriber` init at process start, JSON in
//! production, human-readable otherwise — the same split the rest of the
//! codebase makes for "production" configuration.
//!
//! Version dependencies:
//! - tracing-subscriber = "0.3"

use std::sync::Once;
use tracing_subscriber::EnvFilter;

use crate::config::logging::LogConfig;

static INIT: Once = Once::new();

/// Initializes the global tracing subscriber. Idempotent — safe to call
/// more than once (e.g. once from `main`, once from a test harness).
pub fn init_logger(config: &LogConfig) -> Result<(), Box<dyn std::error::Error>> {
    let mut result = Ok(());
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.level.clone()));

        let builder = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_file(true)
            .with_line_number(true);

        let init = if config.json_format {
            builder.json().try_init()
        } else {
            builder.try_init()
        };

        if let Err(e) = init {
            result = Err(format!("failed to install tracing subscriber: {}", e).into());
        }
    });
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent() {
        let config = LogConfig::default();
        assert!(init_logger(&config).is_ok());
        assert!(init_logger(&config).is_ok());
    }
}
