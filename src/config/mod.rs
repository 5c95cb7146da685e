//! Root configuration module: assembles the environment, database, logging
//! and security sub-configs and validates them as a unit.

pub mod database;
pub mod environment;
pub mod logging;
pub mod security;

use tracing::{error, info, instrument};

use database::DatabaseConfig;
use environment::EnvironmentConfig;
use logging::LogConfig;
use security::SecurityConfig;

const CONFIG_ERROR: &str = "configuration error";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: EnvironmentConfig,
    pub database: DatabaseConfig,
    pub logging: LogConfig,
    pub security: SecurityConfig,
}

impl AppConfig {
    #[instrument(skip_all)]
    pub fn new(
        environment: EnvironmentConfig,
        database: DatabaseConfig,
        logging: LogConfig,
        security: SecurityConfig,
    ) -> Result<Self, String> {
        let config = Self { environment, database, logging, security };
        validate_config(&config)?;
        info!("configuration initialized successfully");
        Ok(config)
    }

    pub fn is_production(&self) -> bool {
        self.environment.is_production()
    }
}

/// Loads every sub-config from the process environment and assembles an
/// [`AppConfig`], failing closed if anything is missing or invalid.
#[instrument]
pub fn init_config() -> Result<AppConfig, String> {
    info!("initializing configuration");

    let environment = EnvironmentConfig::from_env()
        .map_err(|e| format!("environment configuration error: {e}"))?;
    let database =
        DatabaseConfig::from_env().map_err(|e| format!("database configuration error: {e}"))?;
    let logging = LogConfig::new(&environment);
    let security =
        security::load_security_config().map_err(|e| format!("security configuration error: {e}"))?;

    AppConfig::new(environment, database, logging, security)
}

#[instrument(skip(config))]
pub fn validate_config(config: &AppConfig) -> Result<(), String> {
    environment::validate_environment(&config.environment)
        .map_err(|e| format!("{CONFIG_ERROR}: environment validation failed: {e}"))?;

    config
        .database
        .validate_config()
        .map_err(|e| format!("{CONFIG_ERROR}: database validation failed: {e}"))?;

    config
        .logging
        .validate()
        .map_err(|e| format!("{CONFIG_ERROR}: logging validation failed: {e}"))?;

    config
        .security
        .validate()
        .map_err(|e| format!("{CONFIG_ERROR}: security validation failed: {e}"))?;

    if config.is_production() && !config.logging.json_format {
        error!("production environment should use JSON logging format");
    }

    info!("configuration validation completed successfully");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config() -> AppConfig {
        let mut environment = EnvironmentConfig::new();
        environment.official_api_base = "https://api.example.com".to_string();
        environment.bazaar_api_base = "https://bazaar.example.com".to_string();

        let mut database = DatabaseConfig::new();
        database.host = "localhost".to_string();
        database.username = "user".to_string();
        database.database = "testdb".to_string();

        let logging = LogConfig::new(&environment);
        let security =
            SecurityConfig::new(vec![1u8; 32], "redis://localhost:6379".to_string()).unwrap();

        AppConfig::new(environment, database, logging, security).unwrap()
    }

    #[test]
    fn assembles_and_validates_a_full_config() {
        sample_config();
    }

    #[test]
    fn is_production_delegates_to_environment() {
        let config = sample_config();
        assert!(!config.is_production());
    }
}
