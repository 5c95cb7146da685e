//! In-memory, unpersisted per-item failure tracking for BazaarPoller's
//! cooldown policy. Bounded by an LRU cap so a long-running process with a
//! growing item catalog doesn't accumulate unbounded health entries.
//!
//! Version dependencies:
//! - parking_lot = "0.12"
//! - lru = "0.12"
//! - chrono = "0.4"

use chrono::{DateTime, Utc};
use lru::LruCache;
use parking_lot::RwLock;
use std::num::NonZeroUsize;

use crate::utils::metrics::MetricsCollector;
use crate::utils::time::current_timestamp;

const CONSECUTIVE_FAILURE_THRESHOLD: u32 = 3;
const COOLDOWN_DURATION_SECS: i64 = 60 * 60;
const DEFAULT_CAPACITY: usize = 50_000;

#[derive(Debug, Clone, Copy, Default)]
pub struct ItemHealth {
    pub fail_count: u32,
    pub cooldown_until: Option<DateTime<Utc>>,
}

/// `fail_count`/`cooldown_until` per item. Created on first failure,
/// cleared on first success after cooldown.
pub struct ItemHealthMap {
    inner: RwLock<LruCache<i64, ItemHealth>>,
    metrics: MetricsCollector,
}

impl ItemHealthMap {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::new(1).unwrap());
        let metrics = MetricsCollector::new().expect("metrics registry initialization cannot fail");
        Self { inner: RwLock::new(LruCache::new(capacity)), metrics }
    }

    /// Is this item currently in cooldown, relative to now?
    pub fn in_cooldown(&self, item_id: i64) -> bool {
        let mut guard = self.inner.write();
        match guard.get(&item_id) {
            Some(health) => health.cooldown_until.map(|until| current_timestamp() < until).unwrap_or(false),
            None => false,
        }
    }

    /// Resets the entry on a successful fetch.
    pub fn record_success(&self, item_id: i64) {
        let mut guard = self.inner.write();
        guard.put(item_id, ItemHealth::default());
    }

    /// Increments the consecutive-failure count; sets a cooldown once the
    /// threshold is reached.
    pub fn record_failure(&self, item_id: i64) {
        let mut guard = self.inner.write();
        let mut health = guard.get(&item_id).copied().unwrap_or_default();
        health.fail_count += 1;
        let entering_cooldown = health.fail_count >= CONSECUTIVE_FAILURE_THRESHOLD && health.cooldown_until.is_none();
        if health.fail_count >= CONSECUTIVE_FAILURE_THRESHOLD {
            health.cooldown_until = Some(current_timestamp() + chrono::Duration::seconds(COOLDOWN_DURATION_SECS));
        }
        guard.put(item_id, health);
        drop(guard);
        if entering_cooldown {
            self.metrics.record_cooldown_entry("consecutive_failures");
        }
    }
}

impl Default for ItemHealthMap {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enters_cooldown_after_three_consecutive_failures() {
        let map = ItemHealthMap::new();
        map.record_failure(42);
        map.record_failure(42);
        assert!(!map.in_cooldown(42));
        map.record_failure(42);
        assert!(map.in_cooldown(42));
    }

    #[test]
    fn success_clears_the_failure_streak() {
        let map = ItemHealthMap::new();
        map.record_failure(1);
        map.record_failure(1);
        map.record_success(1);
        map.record_failure(1);
        assert!(!map.in_cooldown(1));
    }

    #[test]
    fn unknown_item_is_not_in_cooldown() {
        let map = ItemHealthMap::new();
        assert!(!map.in_cooldown(999));
    }
}
