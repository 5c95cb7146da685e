//! Metrics collection for the ingestion core, mirroring the component share
//! table in the system overview: one instrument per worker's key behavior,
//! plus the shared rate-limiter wait time.
//!
//! Version dependencies:
//! - prometheus = "0.13"
//! - lazy_static = "1.4"

use lazy_static::lazy_static;
use prometheus::{
    exponential_buckets, opts, register_histogram_vec, register_int_counter_vec, HistogramVec,
    IntCounterVec,
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MetricsError {
    #[error("metrics initialization failed: {0}")]
    InitializationError(String),
}

lazy_static! {
    static ref FETCH_LATENCY: HistogramVec = register_histogram_vec!(
        opts!("ingestion_fetch_latency_seconds", "Upstream fetch latency by source"),
        &["source"],
        exponential_buckets(0.01, 2.0, 12).unwrap()
    )
    .unwrap();

    static ref FETCH_OUTCOMES: IntCounterVec = register_int_counter_vec!(
        opts!("ingestion_fetch_outcomes_total", "Fetch outcomes by source and result"),
        &["source", "result"]
    )
    .unwrap();

    static ref RATE_LIMITER_WAITS: IntCounterVec = register_int_counter_vec!(
        opts!("ingestion_rate_limiter_waits_total", "Times a caller waited for a rate-limit window"),
        &["caller"]
    )
    .unwrap();

    static ref COOLDOWN_ENTRIES: IntCounterVec = register_int_counter_vec!(
        opts!("ingestion_item_cooldowns_total", "Items entering BazaarPoller cooldown"),
        &["reason"]
    )
    .unwrap();

    static ref ALERTS_SUPPRESSED: IntCounterVec = register_int_counter_vec!(
        opts!("ingestion_alerts_suppressed_total", "Alert triggers suppressed by dedup/cooldown"),
        &["reason"]
    )
    .unwrap();

    static ref ALERTS_EMITTED: IntCounterVec = register_int_counter_vec!(
        opts!("ingestion_alerts_emitted_total", "Outbound alerts emitted"),
        &["kind"]
    )
    .unwrap();

    static ref CATALOG_ROWS: IntCounterVec = register_int_counter_vec!(
        opts!("ingestion_catalog_rows_total", "Catalog rows upserted by operation"),
        &["op"]
    )
    .unwrap();
}

/// Thin façade over the process-wide Prometheus registry. Cheap to clone —
/// every handle points at the same global counters.
#[derive(Debug, Clone, Default)]
pub struct MetricsCollector;

impl MetricsCollector {
    pub fn new() -> Result<Self, MetricsError> {
        Ok(Self)
    }

    pub fn record_fetch(&self, source: &str, outcome: &str, latency_secs: f64) {
        FETCH_LATENCY.with_label_values(&[source]).observe(latency_secs);
        FETCH_OUTCOMES.with_label_values(&[source, outcome]).inc();
    }

    pub fn record_rate_limit_wait(&self, caller: &str) {
        RATE_LIMITER_WAITS.with_label_values(&[caller]).inc();
    }

    pub fn record_cooldown_entry(&self, reason: &str) {
        COOLDOWN_ENTRIES.with_label_values(&[reason]).inc();
    }

    pub fn record_alert_suppressed(&self, reason: &str) {
        ALERTS_SUPPRESSED.with_label_values(&[reason]).inc();
    }

    pub fn record_alert_emitted(&self, kind: &str) {
        ALERTS_EMITTED.with_label_values(&[kind]).inc();
    }

    pub fn record_catalog_rows(&self, op: &str, count: u64) {
        CATALOG_ROWS.with_label_values(&[op]).inc_by(count);
    }

    /// Renders the registry in Prometheus text-exposition format, for an
    /// adjacent `/metrics` endpoint the core does not itself serve.
    pub fn gather_text(&self) -> Result<String, MetricsError> {
        use prometheus::{Encoder, TextEncoder};
        let encoder = TextEncoder::new();
        let mut buf = Vec::new();
        encoder
            .encode(&prometheus::gather(), &mut buf)
            .map_err(|e| MetricsError::InitializationError(e.to_string()))?;
        String::from_utf8(buf).map_err(|e| MetricsError::InitializationError(e.to_string()))
    }
}
