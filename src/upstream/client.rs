//! `reqwest`-backed implementation of [`UpstreamClient`].
//!
//! Version dependencies:
//! - reqwest = { version = "0.12", default-features = false, features = ["json", "rustls-tls"] }
//! - async-trait = "0.1"

use async_trait::async_trait;
use reqwest::StatusCode;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::error::FailureClass;
use crate::key_manager::KeyManager;
use crate::models::item::ItemCatalogEntry;
use crate::rate_limiter::RateLimiter;
use crate::upstream::types::{CatalogResponse, ExternalBazaarListing, ExternalBazaarResponse, MarketResponse};
use crate::upstream::{MarketFetch, UpstreamClient, UpstreamError};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct HttpUpstreamClient {
    http: reqwest::Client,
    official_api_base: String,
    bazaar_api_base: String,
    api_rate_limiter: Arc<RateLimiter>,
    bazaar_rate_limiter: Arc<RateLimiter>,
    key_manager: Arc<KeyManager>,
}

impl HttpUpstreamClient {
    pub fn new(
        official_api_base: String,
        bazaar_api_base: String,
        api_rate_limiter: Arc<RateLimiter>,
        bazaar_rate_limiter: Arc<RateLimiter>,
        key_manager: Arc<KeyManager>,
    ) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { http, official_api_base, bazaar_api_base, api_rate_limiter, bazaar_rate_limiter, key_manager })
    }

    /// Returns the credential id (absent for a static fallback key, which
    /// isn't rotation-managed) alongside the plaintext key.
    fn catalog_credential(&self) -> Result<(Option<i64>, String), UpstreamError> {
        match self.key_manager.next() {
            Ok(Some((id, plaintext))) => Ok((Some(id), plaintext)),
            Ok(None) => self
                .key_manager
                .static_fallback_key()
                .map(|k| (None, k.to_string()))
                .ok_or(UpstreamError::AuthError { detail: "no credential available".to_string() }),
            Err(e) => Err(UpstreamError::AuthError { detail: e.to_string() }),
        }
    }
}

fn classify_transport_error(err: &reqwest::Error) -> UpstreamError {
    if err.is_timeout() {
        return UpstreamError::Timeout { seconds: REQUEST_TIMEOUT.as_secs() };
    }
    if let Some(status) = err.status() {
        return classify_status(status);
    }
    UpstreamError::TransientHttp { status: 0 }
}

fn classify_status(status: StatusCode) -> UpstreamError {
    if status == StatusCode::NOT_FOUND {
        UpstreamError::NotFound { item_id: 0 }
    } else if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        UpstreamError::AuthError { detail: status.to_string() }
    } else {
        UpstreamError::TransientHttp { status: status.as_u16() }
    }
}

#[async_trait]
impl UpstreamClient for HttpUpstreamClient {
    #[instrument(skip(self, token))]
    async fn fetch_catalog(&self, token: &CancellationToken) -> Result<HashMap<i64, ItemCatalogEntry>, UpstreamError> {
        self.api_rate_limiter
            .acquire(1, self.key_manager.active_count(), token)
            .await
            .map_err(|_| UpstreamError::Cancelled)?;

        let (credential_id, key) = self.catalog_credential()?;
        let url = format!("{}/torn/?selections=items&key={}", self.official_api_base, key);

        let result: Result<HashMap<i64, ItemCatalogEntry>, UpstreamError> = async {
            let response = tokio::select! {
                _ = token.cancelled() => return Err(UpstreamError::Cancelled),
                result = self.http.get(&url).send() => result.map_err(|e| classify_transport_error(&e))?,
            };

            if !response.status().is_success() {
                return Err(classify_status(response.status()));
            }

            let parsed: CatalogResponse = response
                .json()
                .await
                .map_err(|e| UpstreamError::ParseError { detail: e.to_string() })?;

            Ok(parsed.items.into_values().map(|entry| (entry.id, entry)).collect())
        }
        .await;

        if let Some(id) = credential_id {
            match &result {
                Ok(_) => self.key_manager.record(id, true).await,
                Err(e) if e.class() == FailureClass::Credential => self.key_manager.mark_invalid(id).await,
                Err(_) => self.key_manager.record(id, false).await,
            }
        }

        result
    }

    #[instrument(skip(self, credential, token))]
    async fn fetch_market(
        &self,
        item_id: i64,
        credential: &str,
        token: &CancellationToken,
    ) -> Result<MarketFetch, UpstreamError> {
        self.api_rate_limiter
            .acquire(1, self.key_manager.active_count(), token)
            .await
            .map_err(|_| UpstreamError::Cancelled)?;

        let url = format!(
            "{}/v2/market/{}?selections=itemmarket,bazaar&key={}",
            self.official_api_base, item_id, credential
        );

        let response = tokio::select! {
            _ = token.cancelled() => return Err(UpstreamError::Cancelled),
            result = self.http.get(&url).send() => result.map_err(|e| classify_transport_error(&e))?,
        };

        if response.status() == StatusCode::NOT_FOUND {
            return Err(UpstreamError::NotFound { item_id });
        }
        if !response.status().is_success() {
            return Err(classify_status(response.status()));
        }

        let parsed: MarketResponse = response
            .json()
            .await
            .map_err(|e| UpstreamError::ParseError { detail: e.to_string() })?;

        Ok(MarketFetch { market_section: parsed.itemmarket, bazaar_section: parsed.bazaar })
    }

    #[instrument(skip(self, token))]
    async fn fetch_bazaar_external(
        &self,
        item_id: i64,
        token: &CancellationToken,
    ) -> Result<Vec<ExternalBazaarListing>, UpstreamError> {
        self.bazaar_rate_limiter
            .acquire(1, 1, token)
            .await
            .map_err(|_| UpstreamError::Cancelled)?;

        let url = format!("{}/items/{}/listings", self.bazaar_api_base, item_id);

        let response = tokio::select! {
            _ = token.cancelled() => return Err(UpstreamError::Cancelled),
            result = self.http.get(&url).send() => result.map_err(|e| classify_transport_error(&e))?,
        };

        if response.status() == StatusCode::NOT_FOUND {
            return Err(UpstreamError::NotFound { item_id });
        }
        if !response.status().is_success() {
            return Err(classify_status(response.status()));
        }

        let parsed: ExternalBazaarResponse = response
            .json()
            .await
            .map_err(|e| UpstreamError::ParseError { detail: e.to_string() })?;

        Ok(parsed.listings)
    }
}
