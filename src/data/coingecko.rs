//! CoinGecko Pro API client
//!
//! This module fetches coin snapshots and market-chart ranges from the
//! CoinGecko Pro API. The orchestrator talks to it through the
//! [`MarketDataSource`] trait so tests can substitute their own source.

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;

use super::DateRange;

/// Base URL for the CoinGecko Pro API
pub const COINGECKO_BASE_URL: &str = "https://pro-api.coingecko.com/api/v3";

/// Header carrying the Pro API key
const API_KEY_HEADER: &str = "x-cg-pro-api-key";

/// Flags that strip the sub-objects a coin snapshot does not need
const COIN_SNAPSHOT_QUERY: [(&str, &str); 4] = [
    ("localization", "false"),
    ("tickers", "false"),
    ("community_data", "false"),
    ("developer_data", "false"),
];

/// Errors that can occur when calling the upstream API
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// No API key is configured
    #[error("Missing COINGECKO_API_KEY environment variable")]
    MissingCredential,

    /// Upstream answered 429
    #[error("CoinGecko Pro API rate limit exceeded")]
    RateLimited,

    /// Upstream does not know the coin id
    #[error("The coin ID \"{coin_id}\" may not exist on CoinGecko yet")]
    NotFound { coin_id: String },

    /// Upstream answered with another non-success status
    #[error("CoinGecko Pro API returned {status}: {detail}")]
    Status { status: u16, detail: String },

    /// HTTP request failed before a response arrived
    #[error("Failed to fetch data from CoinGecko Pro API: {0}")]
    Request(#[from] reqwest::Error),

    /// Response body was not the expected JSON
    #[error("Failed to parse CoinGecko response: {0}")]
    Parse(#[from] serde_json::Error),

    /// The configured base URL cannot carry a path
    #[error("Invalid CoinGecko base URL: {0}")]
    InvalidBaseUrl(String),
}

/// A USD-denominated value from a per-currency map
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct UsdValue {
    pub usd: Option<f64>,
}

/// A USD-keyed timestamp from a per-currency map
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct UsdDate {
    pub usd: Option<String>,
}

/// Coin image URLs
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct CoinImage {
    pub thumb: Option<String>,
    pub small: Option<String>,
    pub large: Option<String>,
}

/// Market figures inside a coin snapshot
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct MarketData {
    pub current_price: UsdValue,
    pub price_change_24h: Option<f64>,
    pub price_change_percentage_24h: Option<f64>,
    pub price_change_percentage_7d: Option<f64>,
    pub price_change_percentage_30d: Option<f64>,
    pub total_volume: UsdValue,
    pub market_cap: UsdValue,
    pub high_24h: UsdValue,
    pub low_24h: UsdValue,
    pub ath: UsdValue,
    pub ath_date: UsdDate,
    pub atl: UsdValue,
    pub atl_date: UsdDate,
}

/// Response of `/coins/{id}`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct CoinData {
    pub id: Option<String>,
    pub symbol: Option<String>,
    pub name: Option<String>,
    pub image: CoinImage,
    pub market_cap_rank: Option<u32>,
    pub market_data: MarketData,
}

/// Response of `/coins/{id}/market_chart/range`
///
/// Each series holds `[timestamp_ms, value]` pairs.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct MarketChart {
    pub prices: Vec<[f64; 2]>,
    pub market_caps: Vec<[f64; 2]>,
    pub total_volumes: Vec<[f64; 2]>,
}

/// Source of upstream market data
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Fetches the current snapshot for `coin_id`
    async fn coin(&self, coin_id: &str) -> Result<CoinData, UpstreamError>;

    /// Fetches USD price, market cap and volume series for `coin_id` over `range`
    async fn market_chart_range(
        &self,
        coin_id: &str,
        range: DateRange,
    ) -> Result<MarketChart, UpstreamError>;
}

/// Client for the CoinGecko Pro API
#[derive(Clone)]
pub struct CoinGeckoClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl std::fmt::Debug for CoinGeckoClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoinGeckoClient")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl CoinGeckoClient {
    /// Creates a client for the public Pro API endpoint
    ///
    /// A missing key is not an error here; every call reports
    /// [`UpstreamError::MissingCredential`] instead.
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: COINGECKO_BASE_URL.to_string(),
            api_key: api_key.filter(|key| !key.trim().is_empty()),
        }
    }

    /// Points the client at a different base URL
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }

    /// Appends `segments` to the base URL, percent-encoding each one
    fn endpoint(&self, segments: &[&str]) -> Result<Url, UpstreamError> {
        let invalid = || UpstreamError::InvalidBaseUrl(self.base_url.clone());
        let mut url = Url::parse(&self.base_url).map_err(|_| invalid())?;
        url.path_segments_mut()
            .map_err(|()| invalid())?
            .pop_if_empty()
            .extend(segments.iter().copied());
        Ok(url)
    }

    async fn get<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        coin_id: &str,
        query: &[(&str, String)],
    ) -> Result<T, UpstreamError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(UpstreamError::MissingCredential)?;

        let url = self.endpoint(segments)?;
        let response = self
            .client
            .get(url)
            .header(API_KEY_HEADER, api_key)
            .header(ACCEPT, "application/json")
            .query(query)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            tracing::warn!(coin_id, "upstream rate limited");
            return Err(UpstreamError::RateLimited);
        }
        if status == StatusCode::NOT_FOUND {
            tracing::warn!(coin_id, "upstream does not know coin id");
            return Err(UpstreamError::NotFound {
                coin_id: coin_id.to_string(),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = if body.trim().is_empty() {
                status.canonical_reason().unwrap_or("Unknown error").to_string()
            } else {
                body
            };
            tracing::warn!(coin_id, status = status.as_u16(), "upstream request failed");
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                detail,
            });
        }

        let text = response.text().await?;
        Ok(serde_json::from_str(&text)?)
    }
}

#[async_trait]
impl MarketDataSource for CoinGeckoClient {
    async fn coin(&self, coin_id: &str) -> Result<CoinData, UpstreamError> {
        let query: Vec<(&str, String)> = COIN_SNAPSHOT_QUERY
            .iter()
            .map(|&(key, value)| (key, value.to_string()))
            .collect();
        self.get(&["coins", coin_id], coin_id, &query).await
    }

    async fn market_chart_range(
        &self,
        coin_id: &str,
        range: DateRange,
    ) -> Result<MarketChart, UpstreamError> {
        // No interval: upstream picks daily granularity for ranges over 90 days
        let query = [
            ("vs_currency", "usd".to_string()),
            ("from", range.from.to_string()),
            ("to", range.to.to_string()),
        ];
        self.get(&["coins", coin_id, "market_chart", "range"], coin_id, &query)
            .await
    }
}
