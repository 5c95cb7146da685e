//! Top-level error aggregate for the ingestion core.
//!
//! Component modules each define their own `thiserror` enum; this type
//! exists for callers (the top-level runner, integration tests) that want
//! to handle "anything the core can fail with" as one type. Per-item and
//! per-tick failures are handled locally by the workers and never reach
//! here — see the propagation policy in each worker module.

use thiserror::Error;

use crate::key_manager::KeyManagerError;
use crate::rate_limiter::RateLimiterError;
use crate::store::StoreError;
use crate::upstream::UpstreamError;
use crate::utils::crypto::CryptoError;

/// Failure classes surfaced by upstream calls, shared across every worker.
///
/// This mirrors the taxonomy every component-level error is mapped into at
/// its boundary: transient failures are retried by the next tick, credential
/// failures rotate the key, `NotFound`/`ParseError` are terminal for that
/// response, and `Cancelled` means shutdown is in progress.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    #[error("transient upstream failure")]
    Transient,
    #[error("credential rejected by upstream")]
    Credential,
    #[error("item not found upstream")]
    NotFound,
    #[error("response failed to parse")]
    ParseError,
    #[error("operation cancelled")]
    Cancelled,
}

impl UpstreamError {
    /// Classifies this error per the propagation policy in the spec's
    /// error-handling design.
    pub fn class(&self) -> FailureClass {
        match self {
            UpstreamError::NotFound { .. } => FailureClass::NotFound,
            UpstreamError::TransientHttp { .. } | UpstreamError::Timeout { .. } => {
                FailureClass::Transient
            }
            UpstreamError::AuthError { .. } => FailureClass::Credential,
            UpstreamError::ParseError { .. } => FailureClass::ParseError,
            UpstreamError::Cancelled => FailureClass::Cancelled,
        }
    }
}

/// Aggregate error type for the ingestion core's public, fallible entry points.
#[derive(Error, Debug)]
pub enum IngestionError {
    #[error("rate limiter error: {0}")]
    RateLimiter(#[from] RateLimiterError),

    #[error("key manager error: {0}")]
    KeyManager(#[from] KeyManagerError),

    #[error("upstream error: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("credential crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("startup error: {0}")]
    Startup(String),
}
