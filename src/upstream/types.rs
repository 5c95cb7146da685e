//! Wire shapes for the upstream APIs (§6.1), including the tolerant
//! object-or-empty-array deserialization the source is known to need.
//!
//! Version dependencies:
//! - serde = "1.0"
//! - serde_json = "1.0"

use serde::{Deserialize, Deserializer};
use std::collections::HashMap;

use crate::models::item::ItemCatalogEntry;

/// Deserializes a field that upstream sometimes sends as a populated
/// object and sometimes as an empty JSON array — a known quirk of the
/// source (§4.3). The array form always means "absent", never partial
/// data, so it maps to `None` rather than an error.
pub fn object_or_absent<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum ObjectOrArray<T> {
        Object(T),
        Array(Vec<serde_json::Value>),
    }

    match ObjectOrArray::<T>::deserialize(deserializer)? {
        ObjectOrArray::Object(value) => Ok(Some(value)),
        ObjectOrArray::Array(_) => Ok(None),
    }
}

/// `{item:{id,name}, listings:[{id,price,quantity,user_id?}]}`.
#[derive(Debug, Clone, Deserialize)]
pub struct MarketSection {
    pub item: MarketSectionItem,
    pub listings: Vec<MarketListing>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MarketSectionItem {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MarketListing {
    pub id: i64,
    pub price: i64,
    pub quantity: i64,
    pub user_id: Option<i64>,
}

/// GET `{base}/v2/market/{item_id}?selections=itemmarket,bazaar&key={key}`.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct MarketResponse {
    #[serde(default, deserialize_with = "deserialize_optional_section")]
    pub itemmarket: Option<MarketSection>,
    #[serde(default, deserialize_with = "deserialize_optional_section")]
    pub bazaar: Option<MarketSection>,
}

fn deserialize_optional_section<'de, D>(deserializer: D) -> Result<Option<MarketSection>, D::Error>
where
    D: Deserializer<'de>,
{
    object_or_absent(deserializer)
}

/// GET `{base}/torn/?selections=items&key={key}`.
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogResponse {
    pub items: HashMap<String, ItemCatalogEntry>,
}

/// Third-party bazaar aggregator: unauthenticated, no credential consumed.
#[derive(Debug, Clone, Deserialize)]
pub struct ExternalBazaarResponse {
    pub listings: Vec<ExternalBazaarListing>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExternalBazaarListing {
    pub price: i64,
    pub quantity: i64,
    pub seller_id: i64,
}

/// The adjacent inventory field (§6.1): object map, empty array, or a bare
/// string error. Only the object form carries usable data.
#[derive(Debug, Clone)]
pub enum InventoryField {
    Items(HashMap<String, serde_json::Value>),
    Empty,
    Error(String),
}

impl<'de> Deserialize<'de> for InventoryField {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;
        match value {
            serde_json::Value::Object(map) => {
                Ok(InventoryField::Items(map.into_iter().collect()))
            }
            serde_json::Value::Array(items) if items.is_empty() => Ok(InventoryField::Empty),
            serde_json::Value::Array(_) => Ok(InventoryField::Empty),
            serde_json::Value::String(s) => Ok(InventoryField::Error(s)),
            other => Err(serde::de::Error::custom(format!(
                "unexpected inventory field shape: {other}"
            ))),
        }
    }
}
