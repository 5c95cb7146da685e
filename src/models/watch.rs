//! Watchlists, alert thresholds, and the event types that flow from the
//! pollers into AlertEvaluator and out to the delivery sink.
//!
//! Version dependencies:
//! - chrono = "0.4"
//! - serde = "1.0"

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::observation::PriceSource;

/// A `(user_id, item_id)` pair. Creating one elevates the item into
/// BackgroundCrawler's Phase-1 priority tier and BazaarPoller's watched
/// cohort.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserWatch {
    pub user_id: i64,
    pub item_id: i64,
}

/// Per-user threshold configuration for one item. `user_id == 0` is the
/// reserved "system alert" pseudo-user (§4.6) — thresholds configured on
/// the item rather than by an end user.
#[derive(Debug, Clone)]
pub struct UserAlert {
    pub user_id: i64,
    pub item_id: i64,
    pub price_above: Option<i64>,
    pub price_below: Option<i64>,
    pub change_percent: Option<f64>,
}

pub const SYSTEM_ALERT_USER_ID: i64 = 0;

/// Which trigger fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    Above,
    Below,
    ChangePercent,
}

impl UserAlert {
    /// Evaluates all three trigger types against a fresh price and the
    /// previously cached price for the same source. Returns every trigger
    /// that fires — callers typically want only the first, but this keeps
    /// the evaluation pure and total.
    pub fn triggers(&self, price: i64, last_cached: Option<i64>, threshold: f64) -> Vec<AlertKind> {
        let mut fired = Vec::new();
        if let Some(above) = self.price_above {
            if price >= above {
                fired.push(AlertKind::Above);
            }
        }
        if let Some(below) = self.price_below {
            if price <= below {
                fired.push(AlertKind::Below);
            }
        }
        let pct = self.change_percent.unwrap_or(threshold);
        if let Some(last) = last_cached {
            if last != 0 {
                let delta = (price - last).abs() as f64 / last as f64;
                if delta >= pct {
                    fired.push(AlertKind::ChangePercent);
                }
            }
        }
        fired
    }
}

/// Per `(user_id, item_id)` dedup record. Lazily created on first trigger.
#[derive(Debug, Clone)]
pub struct AlertState {
    pub user_id: i64,
    pub item_id: i64,
    pub last_triggered_at: DateTime<Utc>,
    pub last_hash: String,
}

/// Emitted by a poller on a persisted observation, consumed by
/// AlertEvaluator over an in-process `mpsc` channel.
#[derive(Debug, Clone)]
pub struct PriceUpdate {
    pub item_id: i64,
    pub item_name: String,
    pub price: i64,
    pub source: PriceSource,
    pub quantity: i64,
    pub seller_id: Option<i64>,
    pub listing_id: Option<i64>,
    /// The cached price for this item/source immediately before the
    /// poller applied this update — the `change_percent` trigger's
    /// baseline. Captured by the poller before it overwrites the cache,
    /// since by the time AlertEvaluator reads the cache it would already
    /// reflect this same update.
    pub previous_price: Option<i64>,
}

/// Emitted by AlertEvaluator to the delivery sink once a trigger survives
/// dedup and cooldown.
#[derive(Debug, Clone, Serialize)]
pub struct OutboundAlert {
    pub user_id: i64,
    pub item_id: i64,
    pub item_name: String,
    pub kind: AlertKind,
    pub price: i64,
    pub source: PriceSource,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alert() -> UserAlert {
        UserAlert { user_id: 7, item_id: 5, price_above: None, price_below: Some(500), change_percent: None }
    }

    #[test]
    fn below_threshold_triggers() {
        let fired = alert().triggers(400, Some(600), 0.05);
        assert!(fired.contains(&AlertKind::Below));
    }

    #[test]
    fn above_threshold_does_not_trigger_when_unset() {
        let fired = alert().triggers(10_000, Some(10_000), 0.05);
        assert!(!fired.contains(&AlertKind::Above));
    }

    #[test]
    fn change_percent_uses_default_threshold_when_unconfigured() {
        let mut a = alert();
        a.price_below = None;
        let fired = a.triggers(110, Some(100), 0.05);
        assert!(fired.contains(&AlertKind::ChangePercent));
    }

    #[test]
    fn change_percent_ignored_without_a_cached_baseline() {
        let mut a = alert();
        a.price_below = None;
        let fired = a.triggers(110, None, 0.05);
        assert!(!fired.contains(&AlertKind::ChangePercent));
    }
}
