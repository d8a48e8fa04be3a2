//! Core data models for the token proxy
//!
//! This module contains the tracked asset table, launch-date resolution, the
//! upstream market-data client and the normalized payloads served to the
//! dashboard.

pub mod assets;
pub mod coingecko;
pub mod dates;
pub mod envelope;
pub mod sparkline;
pub mod stats;
pub mod token;

pub use assets::{canonical_id_for, AssetTable, AssetTableError};
pub use coingecko::{CoinData, CoinGeckoClient, MarketChart, MarketDataSource, UpstreamError};
pub use dates::DateRange;
pub use envelope::Envelope;
pub use sparkline::Sparkline;
pub use stats::TokenStats;
pub use token::{TokenDetail, TokenList, TokenPrice, TokenVolume};

use serde::{Deserialize, Serialize};

/// A tracked asset
///
/// Loaded once at start-up and never mutated. Serialized with the field names
/// the dashboard expects (`startDate`, `coinId`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetDescriptor {
    /// Short trading symbol, upper case
    pub ticker: String,
    /// Stable upstream identifier
    #[serde(rename = "coinId")]
    pub canonical_id: String,
    /// Human-readable project name
    pub name: String,
    /// Free-text launch date, see [`dates`]
    #[serde(rename = "startDate")]
    pub launch_date: String,
    /// Dashboard grouping
    pub category: String,
    /// Whether the project has launched a token
    pub has_token: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_deserializes_from_dashboard_names() {
        let json = r#"{
            "ticker": "SEI",
            "coinId": "sei-network",
            "name": "Sei",
            "startDate": "January 8, 2025",
            "category": "L0/L1",
            "hasToken": true
        }"#;

        let asset: AssetDescriptor = serde_json::from_str(json).expect("valid descriptor");
        assert_eq!(asset.canonical_id, "sei-network");
        assert_eq!(asset.launch_date, "January 8, 2025");
    }
}
