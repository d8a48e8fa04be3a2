//! Per-token snapshot payloads
//!
//! Normalizes an upstream coin snapshot into the shapes the dashboard reads.
//! Missing upstream strings fall back to the asset table, missing numbers to
//! zero and missing dates to `null`.

use serde::{Deserialize, Serialize};

use super::coingecko::CoinData;
use super::AssetDescriptor;
use crate::fetch::CachedPayload;

/// Full token view served by `/api/token/{id}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenDetail {
    pub id: String,
    pub symbol: String,
    pub name: String,
    pub image: String,
    pub start_date: String,
    pub has_token: bool,
    pub current_price: f64,
    pub price_change_24h: f64,
    pub price_change_percentage_24h: f64,
    pub price_change_percentage_7d: f64,
    pub price_change_percentage_30d: f64,
    pub total_volume: f64,
    pub market_cap: f64,
    pub market_cap_rank: u32,
    pub high_24h: f64,
    pub low_24h: f64,
    pub ath: f64,
    pub ath_date: Option<String>,
    pub atl: f64,
    pub atl_date: Option<String>,
}

impl TokenDetail {
    pub fn from_coin(coin: &CoinData, asset: &AssetDescriptor) -> Self {
        let market = &coin.market_data;
        Self {
            id: non_empty(coin.id.as_ref()).unwrap_or_else(|| asset.canonical_id.clone()),
            symbol: non_empty(coin.symbol.as_ref())
                .map(|symbol| symbol.to_uppercase())
                .unwrap_or_else(|| asset.ticker.clone()),
            name: display_name(coin, asset),
            image: image_url(coin),
            start_date: asset.launch_date.clone(),
            has_token: asset.has_token,
            current_price: market.current_price.usd.unwrap_or_default(),
            price_change_24h: market.price_change_24h.unwrap_or_default(),
            price_change_percentage_24h: market.price_change_percentage_24h.unwrap_or_default(),
            price_change_percentage_7d: market.price_change_percentage_7d.unwrap_or_default(),
            price_change_percentage_30d: market.price_change_percentage_30d.unwrap_or_default(),
            total_volume: market.total_volume.usd.unwrap_or_default(),
            market_cap: market.market_cap.usd.unwrap_or_default(),
            market_cap_rank: coin.market_cap_rank.unwrap_or_default(),
            high_24h: market.high_24h.usd.unwrap_or_default(),
            low_24h: market.low_24h.usd.unwrap_or_default(),
            ath: market.ath.usd.unwrap_or_default(),
            ath_date: market.ath_date.usd.clone(),
            atl: market.atl.usd.unwrap_or_default(),
            atl_date: market.atl_date.usd.clone(),
        }
    }

    /// Zeroed view built from the asset table alone
    pub fn zeroed(asset: &AssetDescriptor) -> Self {
        Self::from_coin(&CoinData::default(), asset)
    }
}

/// Price view served by `/api/token/{id}/price`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPrice {
    pub ticker: String,
    pub name: String,
    pub start_date: String,
    pub current_price: f64,
    pub image: String,
}

impl TokenPrice {
    pub fn from_coin(coin: &CoinData, asset: &AssetDescriptor) -> Self {
        Self {
            ticker: asset.ticker.clone(),
            name: display_name(coin, asset),
            start_date: asset.launch_date.clone(),
            current_price: coin.market_data.current_price.usd.unwrap_or_default(),
            image: image_url(coin),
        }
    }

    pub fn zeroed(asset: &AssetDescriptor) -> Self {
        Self::from_coin(&CoinData::default(), asset)
    }
}

/// Market cap and volume view served by `/api/token/{id}/volume`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenVolume {
    pub ticker: String,
    pub name: String,
    pub start_date: String,
    pub total_volume: f64,
    pub market_cap: f64,
    pub market_cap_rank: u32,
}

impl TokenVolume {
    pub fn from_coin(coin: &CoinData, asset: &AssetDescriptor) -> Self {
        Self {
            ticker: asset.ticker.clone(),
            name: display_name(coin, asset),
            start_date: asset.launch_date.clone(),
            total_volume: coin.market_data.total_volume.usd.unwrap_or_default(),
            market_cap: coin.market_data.market_cap.usd.unwrap_or_default(),
            market_cap_rank: coin.market_cap_rank.unwrap_or_default(),
        }
    }

    pub fn zeroed(asset: &AssetDescriptor) -> Self {
        Self::from_coin(&CoinData::default(), asset)
    }
}

/// Asset table listing served by `/api/tokens`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenList {
    pub success: bool,
    pub count: usize,
    pub data: Vec<AssetDescriptor>,
}

impl TokenList {
    pub fn new(assets: &[AssetDescriptor]) -> Self {
        Self {
            success: true,
            count: assets.len(),
            data: assets.to_vec(),
        }
    }
}

impl CachedPayload for TokenList {}

fn non_empty(value: Option<&String>) -> Option<String> {
    value.filter(|v| !v.is_empty()).cloned()
}

fn display_name(coin: &CoinData, asset: &AssetDescriptor) -> String {
    non_empty(coin.name.as_ref()).unwrap_or_else(|| asset.name.clone())
}

fn image_url(coin: &CoinData) -> String {
    non_empty(coin.image.small.as_ref())
        .or_else(|| non_empty(coin.image.large.as_ref()))
        .unwrap_or_default()
}
