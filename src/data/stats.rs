//! Aggregated market statistics across tracked assets

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use super::coingecko::CoinData;
use super::AssetDescriptor;
use crate::fetch::{CachedPayload, FetchFailure};

/// Category name for assets recorded without one
const UNCATEGORIZED: &str = "Uncategorized";

/// Market snapshot for one asset, or the zeroed row left by a failed fetch
#[derive(Debug, Clone, PartialEq)]
pub struct TokenMarketRow {
    pub ticker: String,
    pub name: String,
    pub category: String,
    pub market_cap: f64,
    pub total_volume_24h: f64,
    pub current_price: f64,
    pub price_change_24h: f64,
    pub success: bool,
    pub error: Option<String>,
}

impl TokenMarketRow {
    pub fn from_coin(asset: &AssetDescriptor, coin: &CoinData) -> Self {
        let market = &coin.market_data;
        Self {
            market_cap: market.market_cap.usd.unwrap_or_default(),
            total_volume_24h: market.total_volume.usd.unwrap_or_default(),
            current_price: market.current_price.usd.unwrap_or_default(),
            price_change_24h: market.price_change_percentage_24h.unwrap_or_default(),
            ..Self::failed(asset, String::new())
        }
        .succeeded()
    }

    pub fn failed(asset: &AssetDescriptor, error: impl Into<String>) -> Self {
        let category = if asset.category.is_empty() {
            UNCATEGORIZED.to_string()
        } else {
            asset.category.clone()
        };
        Self {
            ticker: asset.ticker.clone(),
            name: asset.name.clone(),
            category,
            market_cap: 0.0,
            total_volume_24h: 0.0,
            current_price: 0.0,
            price_change_24h: 0.0,
            success: false,
            error: Some(error.into()),
        }
    }

    fn succeeded(mut self) -> Self {
        self.success = true;
        self.error = None;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSummary {
    pub total_tokens: usize,
    pub successful_tokens: usize,
    pub failed_tokens: usize,
    pub total_market_cap: f64,
    pub total_volume_24h: f64,
    pub average_market_cap: f64,
    pub average_volume_24h: f64,
}

/// One token within a stats listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenStatsRow {
    pub ticker: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub market_cap: f64,
    pub volume_24h: f64,
    pub price: f64,
    pub price_change_24h: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryStats {
    pub category: String,
    pub token_count: usize,
    pub total_market_cap: f64,
    pub total_volume_24h: f64,
    pub successful_tokens: usize,
    pub failed_tokens: usize,
    pub tokens: Vec<TokenStatsRow>,
}

/// Payload served by `/api/tokens/stats`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenStats {
    pub success: bool,
    pub summary: StatsSummary,
    pub by_category: Vec<CategoryStats>,
    pub tokens: Vec<TokenStatsRow>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl TokenStats {
    /// Aggregates per-asset rows into totals and per-category groups
    ///
    /// Groups and the tokens inside them are ordered by market cap, largest
    /// first. Averages are taken over successfully fetched tokens only.
    pub fn aggregate(rows: &[TokenMarketRow]) -> Self {
        let successful_tokens = rows.iter().filter(|row| row.success).count();
        let total_market_cap: f64 = rows.iter().map(|row| row.market_cap).sum();
        let total_volume_24h: f64 = rows.iter().map(|row| row.total_volume_24h).sum();
        let average = |total: f64| {
            if successful_tokens > 0 {
                total / successful_tokens as f64
            } else {
                0.0
            }
        };

        let summary = StatsSummary {
            total_tokens: rows.len(),
            successful_tokens,
            failed_tokens: rows.len() - successful_tokens,
            total_market_cap,
            total_volume_24h,
            average_market_cap: average(total_market_cap),
            average_volume_24h: average(total_volume_24h),
        };

        let mut by_category: Vec<CategoryStats> = Vec::new();
        for row in rows {
            let index = match by_category.iter().position(|c| c.category == row.category) {
                Some(index) => index,
                None => {
                    by_category.push(CategoryStats {
                        category: row.category.clone(),
                        token_count: 0,
                        total_market_cap: 0.0,
                        total_volume_24h: 0.0,
                        successful_tokens: 0,
                        failed_tokens: 0,
                        tokens: Vec::new(),
                    });
                    by_category.len() - 1
                }
            };

            let group = &mut by_category[index];
            group.token_count += 1;
            group.total_market_cap += row.market_cap;
            group.total_volume_24h += row.total_volume_24h;
            if row.success {
                group.successful_tokens += 1;
            } else {
                group.failed_tokens += 1;
            }
            group.tokens.push(stats_row(row, false));
        }

        for group in &mut by_category {
            group.tokens.sort_by(|a, b| descending(a.market_cap, b.market_cap));
        }
        by_category.sort_by(|a, b| descending(a.total_market_cap, b.total_market_cap));

        Self {
            success: true,
            summary,
            by_category,
            tokens: rows.iter().map(|row| stats_row(row, true)).collect(),
            error: None,
            message: None,
        }
    }

    /// Stats with no tokens at all
    pub fn empty() -> Self {
        Self::aggregate(&[])
    }

    /// Empty stats reporting why nothing could be served
    pub fn degraded(failure: &FetchFailure) -> Self {
        Self {
            success: false,
            error: Some(failure.code().as_str().to_string()),
            message: Some(failure.message.clone()),
            ..Self::empty()
        }
    }
}

impl CachedPayload for TokenStats {}

fn stats_row(row: &TokenMarketRow, with_category: bool) -> TokenStatsRow {
    TokenStatsRow {
        ticker: row.ticker.clone(),
        name: row.name.clone(),
        category: with_category.then(|| row.category.clone()),
        market_cap: row.market_cap,
        volume_24h: row.total_volume_24h,
        price: row.current_price,
        price_change_24h: row.price_change_24h,
    }
}

fn descending(a: f64, b: f64) -> Ordering {
    b.total_cmp(&a)
}
