//! Credential-at-rest key material and the Redis connection used by the
//! rate limiter's shared counters.
//!
//! Version dependencies:
//! - hex = "0.4"

use serde::Deserialize;
use tracing::{info, instrument};

use crate::utils::crypto::AES_KEY_LEN;

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    /// 32-byte AES-256-GCM key used to encrypt upstream API credentials
    /// before they are written to `api_keys.encrypted_key`.
    pub encryption_key: Vec<u8>,
    pub redis_url: String,
}

impl SecurityConfig {
    pub fn new(encryption_key: Vec<u8>, redis_url: String) -> Result<Self, String> {
        let config = Self { encryption_key, redis_url };
        config.validate()?;
        Ok(config)
    }

    #[instrument(skip(self))]
    pub fn validate(&self) -> Result<(), String> {
        if self.encryption_key.len() != AES_KEY_LEN {
            return Err(format!(
                "encryption_key must be exactly {AES_KEY_LEN} bytes, got {}",
                self.encryption_key.len()
            ));
        }
        if self.redis_url.is_empty() {
            return Err("redis_url is required".to_string());
        }
        Ok(())
    }
}

#[instrument]
pub fn load_security_config() -> Result<SecurityConfig, String> {
    info!("loading security configuration");

    let key_hex = std::env::var("ENCRYPTION_KEY_HEX")
        .map_err(|_| "ENCRYPTION_KEY_HEX not set".to_string())?;
    let encryption_key = hex::decode(key_hex.trim())
        .map_err(|e| format!("ENCRYPTION_KEY_HEX is not valid hex: {e}"))?;

    let redis_url = std::env::var("REDIS_URL")
        .unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());

    SecurityConfig::new(encryption_key, redis_url)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_key() -> Vec<u8> {
        vec![1u8; AES_KEY_LEN]
    }

    #[test]
    fn rejects_wrong_key_length() {
        assert!(SecurityConfig::new(vec![1u8; 16], "redis://localhost".to_string()).is_err());
    }

    #[test]
    fn rejects_empty_redis_url() {
        assert!(SecurityConfig::new(valid_key(), String::new()).is_err());
    }

    #[test]
    fn accepts_valid_config() {
        assert!(SecurityConfig::new(valid_key(), "redis://localhost:6379".to_string()).is_ok());
    }
}
