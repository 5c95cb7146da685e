//! The upstream boundary: catalog, market, and bazaar-aggregator fetches,
//! behind a trait so workers can be exercised against a scripted fake.
//!
//! Version dependencies:
//! - async-trait = "0.1"
//! - reqwest = { version = "0.12", features = ["json", "rustls-tls"] }

pub mod client;
pub mod types;

use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::models::item::ItemCatalogEntry;
use crate::upstream::types::{ExternalBazaarListing, MarketSection};

pub use client::HttpUpstreamClient;

#[derive(Error, Debug)]
pub enum UpstreamError {
    #[error("item {item_id} not found upstream")]
    NotFound { item_id: i64 },
    #[error("transient upstream failure (status {status})")]
    TransientHttp { status: u16 },
    #[error("request timed out after {seconds}s")]
    Timeout { seconds: u64 },
    #[error("credential rejected by upstream: {detail}")]
    AuthError { detail: String },
    #[error("failed to parse upstream response: {detail}")]
    ParseError { detail: String },
    #[error("request cancelled")]
    Cancelled,
}

/// One market fetch's result: the two optional sections the official API
/// returns for an item (§4.3).
#[derive(Debug, Clone, Default)]
pub struct MarketFetch {
    pub market_section: Option<MarketSection>,
    pub bazaar_section: Option<MarketSection>,
}

#[async_trait]
pub trait UpstreamClient: Send + Sync {
    /// `{base}/torn/?selections=items&key={key}` — returns the full
    /// catalog keyed by item id.
    async fn fetch_catalog(&self, token: &CancellationToken) -> Result<HashMap<i64, ItemCatalogEntry>, UpstreamError>;

    /// `{base}/v2/market/{item_id}?selections=itemmarket,bazaar&key={key}`.
    async fn fetch_market(
        &self,
        item_id: i64,
        credential: &str,
        token: &CancellationToken,
    ) -> Result<MarketFetch, UpstreamError>;

    /// Unauthenticated third-party bazaar aggregator fetch; does not
    /// consume a credential.
    async fn fetch_bazaar_external(
        &self,
        item_id: i64,
        token: &CancellationToken,
    ) -> Result<Vec<ExternalBazaarListing>, UpstreamError>;
}
