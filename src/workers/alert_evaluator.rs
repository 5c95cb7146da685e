//! Evaluates PriceUpdate events against per-user thresholds with dedup and
//! cooldown (§4.6). Consumes the channel the pollers publish to; emits
//! surviving triggers to an external delivery sink the caller supplies.
//!
//! Version dependencies:
//! - tokio = "1.28"
//! - sha2 = "0.10"
//! - hex = "0.4"

use std::sync::Arc;

use chrono::Utc;
use sha2::{Digest, Sha256};
use tokio::sync::mpsc;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::models::watch::{AlertState, OutboundAlert, PriceUpdate};
use crate::store::Store;
use crate::utils::metrics::MetricsCollector;

pub struct AlertEvaluator {
    store: Arc<dyn Store>,
    updates: mpsc::Receiver<PriceUpdate>,
    outbound: mpsc::Sender<OutboundAlert>,
    cooldown: Duration,
    price_threshold: f64,
    metrics: MetricsCollector,
    token: CancellationToken,
}

impl AlertEvaluator {
    pub fn new(
        store: Arc<dyn Store>,
        updates: mpsc::Receiver<PriceUpdate>,
        outbound: mpsc::Sender<OutboundAlert>,
        cooldown: Duration,
        price_threshold: f64,
        token: CancellationToken,
    ) -> Self {
        let metrics = MetricsCollector::new().expect("metrics registry initialization cannot fail");
        Self { store, updates, outbound, cooldown, price_threshold, metrics, token }
    }

    #[instrument(skip(self), name = "alert_evaluator")]
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                _ = self.token.cancelled() => {
                    info!("alert evaluator shutting down");
                    return;
                }
                update = self.updates.recv() => {
                    match update {
                        Some(update) => self.handle_update(update).await,
                        None => {
                            info!("price update channel closed, alert evaluator exiting");
                            return;
                        }
                    }
                }
            }
        }
    }

    /// Evaluates one PriceUpdate against every alert configured for its
    /// item. Exposed `pub` so integration tests can feed updates directly
    /// without going through the channel/`run` loop.
    pub async fn handle_update(&self, update: PriceUpdate) {
        let alerts = match self.store.alerts_for_item(update.item_id).await {
            Ok(alerts) => alerts,
            Err(e) => {
                error!(item_id = update.item_id, error = %e, "failed to load alerts for item");
                return;
            }
        };

        for alert in &alerts {
            let fired = alert.triggers(update.price, update.previous_price, self.price_threshold);
            for kind in fired {
                self.evaluate_trigger(&update, alert.user_id, kind).await;
            }
        }
    }

    async fn evaluate_trigger(&self, update: &PriceUpdate, user_id: i64, kind: crate::models::watch::AlertKind) {
        let hash = trigger_hash(update.item_id, kind, update.price, update.quantity, update.seller_id, update.listing_id);

        let existing = match self.store.alert_state(update.item_id, user_id).await {
            Ok(state) => state,
            Err(e) => {
                error!(item_id = update.item_id, user_id, error = %e, "failed to load alert state");
                return;
            }
        };

        let now = Utc::now();
        if let Some(state) = &existing {
            if state.last_hash == hash {
                debug!(item_id = update.item_id, user_id, "suppressing duplicate listing trigger");
                self.metrics.record_alert_suppressed("duplicate_listing");
                return;
            }
            let elapsed = now.signed_duration_since(state.last_triggered_at);
            if elapsed < chrono::Duration::from_std(self.cooldown).unwrap_or(chrono::Duration::zero()) {
                debug!(item_id = update.item_id, user_id, "suppressing trigger within cooldown");
                self.metrics.record_alert_suppressed("cooldown");
                return;
            }
        }

        let state = AlertState { user_id, item_id: update.item_id, last_triggered_at: now, last_hash: hash };
        if let Err(e) = self.store.upsert_alert_state(&state).await {
            error!(item_id = update.item_id, user_id, error = %e, "failed to persist alert state");
            return;
        }

        self.metrics.record_alert_emitted(kind_label(kind));

        let outbound = OutboundAlert {
            user_id,
            item_id: update.item_id,
            item_name: update.item_name.clone(),
            kind,
            price: update.price,
            source: update.source,
        };
        if self.outbound.send(outbound).await.is_err() {
            warn!(item_id = update.item_id, user_id, "delivery sink closed, dropping outbound alert");
        }
    }
}

fn trigger_hash(
    item_id: i64,
    kind: crate::models::watch::AlertKind,
    price: i64,
    quantity: i64,
    seller_id: Option<i64>,
    listing_id: Option<i64>,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(item_id.to_le_bytes());
    hasher.update(kind_label(kind).as_bytes());
    hasher.update(price.to_le_bytes());
    hasher.update(quantity.to_le_bytes());
    hasher.update(seller_id.unwrap_or(-1).to_le_bytes());
    hasher.update(listing_id.unwrap_or(-1).to_le_bytes());
    hex::encode(hasher.finalize())
}

fn kind_label(kind: crate::models::watch::AlertKind) -> &'static str {
    match kind {
        crate::models::watch::AlertKind::Above => "above",
        crate::models::watch::AlertKind::Below => "below",
        crate::models::watch::AlertKind::ChangePercent => "change_percent",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::watch::AlertKind;

    #[test]
    fn hash_changes_with_listing_id() {
        let a = trigger_hash(5, AlertKind::Below, 400, 1, Some(11), Some(99));
        let b = trigger_hash(5, AlertKind::Below, 400, 1, Some(11), Some(100));
        assert_ne!(a, b);
    }

    #[test]
    fn hash_is_stable_for_identical_inputs() {
        let a = trigger_hash(5, AlertKind::Below, 400, 1, Some(11), Some(99));
        let b = trigger_hash(5, AlertKind::Below, 400, 1, Some(11), Some(99));
        assert_eq!(a, b);
    }
}
