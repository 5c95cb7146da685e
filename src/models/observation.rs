//! The append-only price time series. Rows in `market_prices` and
//! `bazaar_prices` are immutable once inserted — no update path exists.
//!
//! Version dependencies:
//! - chrono = "0.4"
//! - serde = "1.0"
//! - thiserror = "1.0"

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ObservationError {
    #[error("price must be positive, got {0}")]
    NonPositivePrice(i64),
}

/// The source a `PriceObservation` was collected from, and therefore which
/// table it belongs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceSource {
    Market,
    Bazaar,
}

/// One immutable tuple `(time, item_id, price, quantity[, seller_id])`.
/// `seller_id` is only meaningful for bazaar observations.
#[derive(Debug, Clone, Serialize)]
pub struct PriceObservation {
    pub time: DateTime<Utc>,
    pub item_id: i64,
    pub source: PriceSource,
    pub price: i64,
    pub quantity: i64,
    pub seller_id: Option<i64>,
}

impl PriceObservation {
    pub fn new(
        time: DateTime<Utc>,
        item_id: i64,
        source: PriceSource,
        price: i64,
        quantity: i64,
        seller_id: Option<i64>,
    ) -> Result<Self, ObservationError> {
        if price <= 0 {
            return Err(ObservationError::NonPositivePrice(price));
        }
        Ok(Self { time, item_id, source, price, quantity, seller_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_positive_price() {
        let err = PriceObservation::new(Utc::now(), 1, PriceSource::Bazaar, 0, 1, None).unwrap_err();
        assert!(matches!(err, ObservationError::NonPositivePrice(0)));
    }

    #[test]
    fn accepts_valid_observation() {
        let obs = PriceObservation::new(Utc::now(), 1, PriceSource::Market, 100, 5, None).unwrap();
        assert_eq!(obs.price, 100);
    }
}
