//! The tracked item: catalog attributes plus the last-observed price cache
//! the pollers maintain.
//!
//! Version dependencies:
//! - chrono = "0.4"
//! - serde = "1.0"
//! - thiserror = "1.0"

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ItemError {
    #[error("invalid item id: {0}")]
    InvalidId(i64),
    #[error("invalid circulation: {0}")]
    InvalidCirculation(i64),
}

/// The unit of tracking. `id` is the external item identifier and is
/// stable across catalog syncs — once inserted a row is never deleted,
/// only updated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub item_type: String,
    pub circulation: i64,
    pub is_tracked: bool,
    pub last_market_price: Option<i64>,
    pub last_bazaar_price: Option<i64>,
    pub last_updated_at: Option<DateTime<Utc>>,
}

impl Item {
    pub fn new(id: i64, name: String, description: String, item_type: String, circulation: i64) -> Result<Self, ItemError> {
        if id <= 0 {
            return Err(ItemError::InvalidId(id));
        }
        if circulation < 0 {
            return Err(ItemError::InvalidCirculation(circulation));
        }
        Ok(Self {
            id,
            name,
            description,
            item_type,
            circulation,
            is_tracked: circulation > 0,
            last_market_price: None,
            last_bazaar_price: None,
            last_updated_at: None,
        })
    }

    /// Catalog retirement (§4.7): a circulation of zero means the item is
    /// no longer in the economy. `is_tracked` drops to `false` and stays
    /// there until a future sync reports circulation again — left for the
    /// caller to decide, this helper only expresses the one-way drop.
    pub fn retire_if_untracked(&mut self) {
        if self.circulation == 0 {
            self.is_tracked = false;
        }
    }

    pub fn is_high_circulation(&self) -> bool {
        self.circulation > HIGH_CIRCULATION_THRESHOLD
    }
}

pub const HIGH_CIRCULATION_THRESHOLD: i64 = 10_000;

/// Wire shape of one entry in the official catalog response (§6.1):
/// `{items: {"<id>": {id, name, description, type, circulation, market_value}}}`.
#[derive(Debug, Clone, Deserialize)]
pub struct ItemCatalogEntry {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type")]
    pub item_type: String,
    pub circulation: i64,
    pub market_value: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_item_is_tracked_iff_in_circulation() {
        let item = Item::new(1, "Xanax".to_string(), String::new(), "Drug".to_string(), 5000).unwrap();
        assert!(item.is_tracked);

        let retired = Item::new(2, "Relic".to_string(), String::new(), "Misc".to_string(), 0).unwrap();
        assert!(!retired.is_tracked);
    }

    #[test]
    fn rejects_invalid_id() {
        assert!(Item::new(0, "x".to_string(), String::new(), "y".to_string(), 1).is_err());
    }

    #[test]
    fn retirement_is_one_way_on_zero_circulation() {
        let mut item = Item::new(3, "Flower".to_string(), String::new(), "Misc".to_string(), 50).unwrap();
        item.circulation = 0;
        item.retire_if_untracked();
        assert!(!item.is_tracked);
    }

    #[test]
    fn high_circulation_threshold() {
        let item = Item::new(4, "Can".to_string(), String::new(), "Drug".to_string(), 10_001).unwrap();
        assert!(item.is_high_circulation());
    }
}
