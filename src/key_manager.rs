//! Round-robin selection over the active credential set, with in-memory
//! usage/error counters guarded by a `parking_lot::Mutex` (critical
//! sections are O(1), so a blocking lock is the right tool here).
//! Every outcome is mirrored into `Store::record_credential_outcome` so
//! rotation state survives a process restart.
//!
//! Version dependencies:
//! - parking_lot = "0.12"
//! - thiserror = "1.0"
//! - tracing = "0.1"

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tracing::warn;

use crate::models::credential::ApiCredential;
use crate::store::Store;
use crate::utils::crypto::{decrypt_credential, CryptoError};
use crate::utils::time::current_timestamp;

#[derive(Error, Debug)]
pub enum KeyManagerError {
    #[error("no active credential available")]
    NoActiveCredential,
    #[error("credential decryption failed: {0}")]
    Decryption(#[from] CryptoError),
}

struct State {
    credentials: Vec<ApiCredential>,
    cursor: usize,
    /// Credential ids that just failed; skipped for exactly one upcoming
    /// turn, cleared the moment `next` encounters them regardless of
    /// whether that turn ends up served by a different credential or, with
    /// no alternative active, falls back to the flagged one anyway.
    skip_once: HashSet<i64>,
}

/// Round-robins across the active credential set. When the active set is
/// empty, callers must fall back to the static key pool loaded at startup
/// (`next` returns `None`, not an error — an empty active set is a normal,
/// expected state rather than a failure of this component).
pub struct KeyManager {
    state: Mutex<State>,
    encryption_key: Vec<u8>,
    static_fallback: Vec<String>,
    store: Arc<dyn Store>,
}

impl KeyManager {
    pub fn new(
        credentials: Vec<ApiCredential>,
        encryption_key: Vec<u8>,
        static_fallback: Vec<String>,
        store: Arc<dyn Store>,
    ) -> Self {
        Self {
            state: Mutex::new(State { credentials, cursor: 0, skip_once: HashSet::new() }),
            encryption_key,
            static_fallback,
            store,
        }
    }

    /// Returns the next active credential in round-robin order, decrypted,
    /// or `None` if the active set is empty. A credential flagged by a
    /// reported failure is skipped for exactly one turn: reporting one
    /// failure on A mid-rotation of a two-credential set A,B means the
    /// next round is B,A,B,A, not A,B,A,B again.
    pub fn next(&self) -> Result<Option<(i64, String)>, KeyManagerError> {
        let mut state = self.state.lock();
        let len = state.credentials.len();
        if len == 0 {
            return Ok(None);
        }

        let mut fallback: Option<usize> = None;
        for _ in 0..len {
            let idx = state.cursor % len;
            state.cursor = (state.cursor + 1) % len;
            if !state.credentials[idx].is_active {
                continue;
            }
            let id = state.credentials[idx].id;
            if state.skip_once.remove(&id) {
                fallback.get_or_insert(idx);
                continue;
            }
            let plaintext = decrypt_credential(&state.credentials[idx].encrypted_key, &self.encryption_key)?;
            return Ok(Some((id, plaintext)));
        }

        if let Some(idx) = fallback {
            let id = state.credentials[idx].id;
            let plaintext = decrypt_credential(&state.credentials[idx].encrypted_key, &self.encryption_key)?;
            return Ok(Some((id, plaintext)));
        }

        Ok(None)
    }

    /// Falls back to the static key list loaded from configuration, in
    /// round-robin-free order (first entry, stable across calls) — any
    /// ordering policy beyond "pick one" is out of scope for the fallback
    /// path.
    pub fn static_fallback_key(&self) -> Option<&str> {
        self.static_fallback.first().map(String::as_str)
    }

    /// Records a use outcome, then persists the credential's updated
    /// counters/active flag so rotation state survives a restart. A
    /// failure also flags the credential to be skipped on its next turn.
    pub async fn record(&self, credential_id: i64, success: bool) {
        let snapshot = {
            let mut state = self.state.lock();
            let snapshot = state.credentials.iter_mut().find(|c| c.id == credential_id).map(|cred| {
                if success {
                    cred.record_success(current_timestamp());
                } else {
                    cred.record_failure();
                }
                cred.clone()
            });
            if !success && snapshot.is_some() {
                state.skip_once.insert(credential_id);
            }
            snapshot
        };

        if let Some(cred) = snapshot {
            if let Err(e) = self.store.record_credential_outcome(&cred).await {
                warn!(credential_id, error = %e, "failed to persist credential outcome");
            }
        }
    }

    /// An explicit "key invalid" signal from upstream: deactivates
    /// immediately and persists the change.
    pub async fn mark_invalid(&self, credential_id: i64) {
        let snapshot = {
            let mut state = self.state.lock();
            state.credentials.iter_mut().find(|c| c.id == credential_id).map(|cred| {
                cred.mark_invalid();
                cred.clone()
            })
        };

        if let Some(cred) = snapshot {
            if let Err(e) = self.store.record_credential_outcome(&cred).await {
                warn!(credential_id, error = %e, "failed to persist credential outcome");
            }
        }
    }

    pub fn active_count(&self) -> u32 {
        self.state.lock().credentials.iter().filter(|c| c.is_active).count() as u32
    }
}
