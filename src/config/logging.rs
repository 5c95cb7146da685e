//! Logging configuration: level and format, derived from the environment
//! config the same way the rest of `AppConfig`'s sub-configs are derived.

use serde::{Deserialize, Serialize};

use crate::config::environment::EnvironmentConfig;

const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct LogConfig {
    pub level: String,
    /// JSON-formatted logs in production, human-readable otherwise.
    pub json_format: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            json_format: false,
        }
    }
}

impl LogConfig {
    pub fn new(env_config: &EnvironmentConfig) -> Self {
        Self {
            level: env_config
                .log_level
                .clone()
                .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
            json_format: env_config.is_production(),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        match self.level.to_lowercase().as_str() {
            "error" | "warn" | "info" | "debug" | "trace" => Ok(()),
            other => Err(format!("invalid log level: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unknown_level() {
        let config = LogConfig {
            level: "verbose".to_string(),
            json_format: false,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn production_env_forces_json() {
        let mut env = EnvironmentConfig::new();
        env.node_env = "production".to_string();
        let config = LogConfig::new(&env);
        assert!(config.json_format);
    }
}
