//! Redis-backed fixed-window rate limiter shared across process instances.
//! The window key is the current wall-clock minute, incremented atomically
//! so concurrent callers — in this process or another — draw from one
//! counter.
//!
//! Version dependencies:
//! - redis = { version = "0.23", features = ["tokio-comp", "connection-manager", "aio"] }
//! - tokio = "1.28"

use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use thiserror::Error;
use tokio::time::{sleep, Duration};
use tokio_util::sync::CancellationToken;
use tracing::{instrument, warn};

use crate::utils::metrics::MetricsCollector;
use crate::utils::time::{current_timestamp, minute_bucket, ms_until_next_minute};

const WINDOW_KEY_TTL_SECS: u64 = 120;
const STORE_ERROR_BACKOFF: Duration = Duration::from_secs(1);
const WINDOW_BOUNDARY_JITTER_MS: u64 = 100;

#[derive(Error, Debug)]
pub enum RateLimiterError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("acquire cancelled")]
    Cancelled,
}

/// `acquire` blocks until a ticket is granted under the effective budget,
/// or the caller's cancellation token fires.
pub struct RateLimiter {
    conn: ConnectionManager,
    key_prefix: &'static str,
    base_limit: u32,
    metrics: MetricsCollector,
}

impl RateLimiter {
    pub fn new(conn: ConnectionManager, key_prefix: &'static str, base_limit: u32) -> Self {
        let metrics = MetricsCollector::new().expect("metrics registry initialization cannot fail");
        Self { conn, key_prefix, base_limit, metrics }
    }

    /// Blocks until a ticket is available for `weight` (≥ 1) units of the
    /// budget, or `token` is cancelled. The effective budget for the
    /// current window is `base_limit × credential_count`.
    #[instrument(skip(self, token), fields(weight))]
    pub async fn acquire(&self, weight: u32, credential_count: u32, token: &CancellationToken) -> Result<(), RateLimiterError> {
        let weight = weight.max(1);
        let budget = self.base_limit.saturating_mul(credential_count.max(1));

        loop {
            if token.is_cancelled() {
                return Err(RateLimiterError::Cancelled);
            }

            match self.try_increment(weight, budget).await {
                Ok(true) => return Ok(()),
                Ok(false) => {
                    self.metrics.record_rate_limit_wait(self.key_prefix);
                    let wait = Duration::from_millis(
                        ms_until_next_minute(current_timestamp()).max(0) as u64 + WINDOW_BOUNDARY_JITTER_MS,
                    );
                    tokio::select! {
                        _ = token.cancelled() => return Err(RateLimiterError::Cancelled),
                        _ = sleep(wait) => {}
                    }
                }
                Err(e) => {
                    warn!(error = %e, "rate limiter store error, failing closed");
                    tokio::select! {
                        _ = token.cancelled() => return Err(RateLimiterError::Cancelled),
                        _ = sleep(STORE_ERROR_BACKOFF) => {}
                    }
                }
            }
        }
    }

    /// Attempts to reserve `weight` against the current minute bucket.
    /// Returns `Ok(true)` if the ticket was granted.
    async fn try_increment(&self, weight: u32, budget: u32) -> Result<bool, RateLimiterError> {
        let bucket = minute_bucket(current_timestamp());
        let key = format!("{}:{}", self.key_prefix, bucket);

        let mut conn = self.conn.clone();
        let count: i64 = conn.incr(&key, weight as i64).await?;
        if count == weight as i64 {
            let _: () = conn.expire(&key, WINDOW_KEY_TTL_SECS as i64).await?;
        }

        Ok(count <= budget as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weight_floor_is_one() {
        assert_eq!(1u32.max(1), 1);
        assert_eq!(0u32.max(1), 1);
    }
}
