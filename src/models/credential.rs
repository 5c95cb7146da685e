//! Upstream API credentials, stored encrypted at rest. KeyManager owns the
//! in-memory selection policy; this module only holds the row shape.
//!
//! Version dependencies:
//! - chrono = "0.4"
//! - serde = "1.0"

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::utils::crypto::EncryptedKey;

const MAX_CONSECUTIVE_ERRORS: u32 = 10;

/// One row in `api_keys`. `encrypted_key` is opaque ciphertext — only
/// `crate::utils::crypto` ever turns it back into a usable key.
#[derive(Debug, Clone, Serialize)]
pub struct ApiCredential {
    pub id: i64,
    #[serde(skip)]
    pub encrypted_key: EncryptedKey,
    pub label: String,
    pub is_active: bool,
    pub usage_count: u64,
    pub error_count: u32,
    pub last_used_at: Option<DateTime<Utc>>,
}

impl ApiCredential {
    pub fn new(id: i64, encrypted_key: EncryptedKey, label: String) -> Self {
        Self {
            id,
            encrypted_key,
            label,
            is_active: true,
            usage_count: 0,
            error_count: 0,
            last_used_at: None,
        }
    }

    /// Records a successful use: bumps `usage_count`, clears the
    /// consecutive-error streak, stamps `last_used_at`.
    pub fn record_success(&mut self, at: DateTime<Utc>) {
        self.usage_count += 1;
        self.error_count = 0;
        self.last_used_at = Some(at);
    }

    /// Records a failed use. Deactivates the credential once the
    /// consecutive-error streak reaches the terminal threshold (§4.2).
    pub fn record_failure(&mut self) {
        self.error_count += 1;
        if self.error_count >= MAX_CONSECUTIVE_ERRORS {
            self.is_active = false;
        }
    }

    /// An explicit "key invalid" signal from upstream deactivates
    /// immediately, regardless of the error streak.
    pub fn mark_invalid(&mut self) {
        self.is_active = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credential() -> ApiCredential {
        ApiCredential::new(1, EncryptedKey(vec![0u8; 28]), "primary".to_string())
    }

    #[test]
    fn deactivates_after_ten_consecutive_failures() {
        let mut cred = credential();
        for _ in 0..9 {
            cred.record_failure();
            assert!(cred.is_active);
        }
        cred.record_failure();
        assert!(!cred.is_active);
    }

    #[test]
    fn success_resets_error_streak() {
        let mut cred = credential();
        cred.record_failure();
        cred.record_failure();
        cred.record_success(Utc::now());
        assert_eq!(cred.error_count, 0);
        assert_eq!(cred.usage_count, 1);
    }

    #[test]
    fn terminal_signal_deactivates_immediately() {
        let mut cred = credential();
        cred.mark_invalid();
        assert!(!cred.is_active);
    }
}
