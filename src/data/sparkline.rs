//! Time-series payload for sparkline charts
//!
//! Upstream returns `[timestamp_ms, value]` pairs per series. The sparkline
//! keeps each series both as rows with second and millisecond timestamps and as
//! flat parallel arrays, plus summary statistics over the price series.
//!
//! The payload always has the same shape: when there is no data every array
//! is empty, every statistic is zero, and `error`/`message` say why.

use serde::{Deserialize, Serialize};

use super::coingecko::MarketChart;
use super::dates::DateRange;
use super::AssetDescriptor;
use crate::fetch::{CachedPayload, ErrorCode, FetchFailure};

/// Message attached when upstream has no price history for the range
pub const NO_HISTORY_MESSAGE: &str =
    "No historical data available - token may not have trading history yet";

/// `{time, price}` point for simple line rendering
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub time: i64,
    pub price: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceSample {
    /// Unix seconds
    pub time: i64,
    /// Unix milliseconds
    pub timestamp: i64,
    pub price: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketCapSample {
    pub time: i64,
    pub timestamp: i64,
    pub market_cap: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VolumeSample {
    pub time: i64,
    pub timestamp: i64,
    pub volume: f64,
}

/// Sparkline payload served by `/api/token/{id}/sparkline`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sparkline {
    pub success: bool,
    pub ticker: String,
    pub name: String,
    pub start_date: String,
    pub coin_id: String,
    pub from: i64,
    pub to: i64,
    pub days: i64,
    pub points: Vec<PricePoint>,
    pub prices: Vec<PriceSample>,
    pub market_caps: Vec<MarketCapSample>,
    pub volumes: Vec<VolumeSample>,
    pub price_array: Vec<f64>,
    pub time_array: Vec<i64>,
    pub timestamp_array: Vec<i64>,
    pub market_cap_array: Vec<f64>,
    pub volume_array: Vec<f64>,
    pub current_price: f64,
    pub start_price: f64,
    pub price_change: f64,
    pub price_change_percent: f64,
    pub min_price: f64,
    pub max_price: f64,
    pub data_points: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Sparkline {
    /// Empty sparkline for a known asset over `range`
    pub fn empty(asset: &AssetDescriptor, range: DateRange) -> Self {
        Self {
            success: true,
            ticker: asset.ticker.clone(),
            name: asset.name.clone(),
            start_date: asset.launch_date.clone(),
            coin_id: asset.canonical_id.clone(),
            from: range.from,
            to: range.to,
            days: 0,
            points: Vec::new(),
            prices: Vec::new(),
            market_caps: Vec::new(),
            volumes: Vec::new(),
            price_array: Vec::new(),
            time_array: Vec::new(),
            timestamp_array: Vec::new(),
            market_cap_array: Vec::new(),
            volume_array: Vec::new(),
            current_price: 0.0,
            start_price: 0.0,
            price_change: 0.0,
            price_change_percent: 0.0,
            min_price: 0.0,
            max_price: 0.0,
            data_points: 0,
            error: None,
            message: None,
        }
    }

    /// Empty sparkline for a ticker missing from the asset table
    pub fn unknown_asset(ticker: &str, now_epoch: i64) -> Self {
        let placeholder = AssetDescriptor {
            ticker: ticker.to_string(),
            canonical_id: String::new(),
            name: String::new(),
            launch_date: String::new(),
            category: String::new(),
            has_token: false,
        };
        let range = DateRange {
            from: 0,
            to: now_epoch,
        };
        Self::empty(&placeholder, range).with_error(
            ErrorCode::UnknownAsset,
            format!("Token {} not found in token list", ticker),
        )
    }

    /// Empty sparkline describing why no data could be served
    pub fn degraded(asset: &AssetDescriptor, range: DateRange, failure: &FetchFailure) -> Self {
        Self::empty(asset, range).with_error(failure.code(), failure.message.clone())
    }

    /// Builds the full sparkline from an upstream chart
    ///
    /// A chart without price points yields the empty shape with an explanatory
    /// message.
    pub fn from_chart(asset: &AssetDescriptor, range: DateRange, chart: &MarketChart) -> Self {
        let prices: Vec<PriceSample> = chart
            .prices
            .iter()
            .map(|&[ms, price]| {
                let (time, timestamp) = split_timestamp(ms);
                PriceSample {
                    time,
                    timestamp,
                    price,
                }
            })
            .collect();

        let (Some(first), Some(last)) = (prices.first().copied(), prices.last().copied()) else {
            return Self {
                message: Some(NO_HISTORY_MESSAGE.to_string()),
                ..Self::empty(asset, range)
            };
        };

        let market_caps: Vec<MarketCapSample> = chart
            .market_caps
            .iter()
            .map(|&[ms, market_cap]| {
                let (time, timestamp) = split_timestamp(ms);
                MarketCapSample {
                    time,
                    timestamp,
                    market_cap,
                }
            })
            .collect();

        let volumes: Vec<VolumeSample> = chart
            .total_volumes
            .iter()
            .map(|&[ms, volume]| {
                let (time, timestamp) = split_timestamp(ms);
                VolumeSample {
                    time,
                    timestamp,
                    volume,
                }
            })
            .collect();

        let price_array: Vec<f64> = prices.iter().map(|p| p.price).collect();
        let min_price = price_array.iter().copied().fold(f64::INFINITY, f64::min);
        let max_price = price_array.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        let price_change = last.price - first.price;
        let price_change_percent = if first.price > 0.0 {
            price_change / first.price * 100.0
        } else {
            0.0
        };

        Self {
            days: range.days(),
            points: prices
                .iter()
                .map(|p| PricePoint {
                    time: p.time,
                    price: p.price,
                })
                .collect(),
            time_array: prices.iter().map(|p| p.time).collect(),
            timestamp_array: prices.iter().map(|p| p.timestamp).collect(),
            market_cap_array: market_caps.iter().map(|m| m.market_cap).collect(),
            volume_array: volumes.iter().map(|v| v.volume).collect(),
            current_price: last.price,
            start_price: first.price,
            price_change,
            price_change_percent,
            min_price,
            max_price,
            data_points: prices.len(),
            price_array,
            prices,
            market_caps,
            volumes,
            ..Self::empty(asset, range)
        }
    }

    pub fn with_error(mut self, code: ErrorCode, message: impl Into<String>) -> Self {
        self.error = Some(code.as_str().to_string());
        self.message = Some(message.into());
        self
    }

    pub fn has_data(&self) -> bool {
        self.data_points > 0
    }
}

/// Only sparklines that actually carry data are worth caching
impl CachedPayload for Sparkline {
    fn is_cacheable(&self) -> bool {
        self.has_data() && self.error.is_none()
    }
}

/// Upstream millisecond timestamp as (unix seconds, unix milliseconds)
fn split_timestamp(ms: f64) -> (i64, i64) {
    let timestamp = ms as i64;
    (timestamp.div_euclid(1000), timestamp)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAY_MS: f64 = 86_400_000.0;
    const JAN_1_2025_MS: f64 = 1_735_689_600_000.0;

    fn frax() -> AssetDescriptor {
        AssetDescriptor {
            ticker: "FRAX".to_string(),
            canonical_id: "frax".to_string(),
            name: "Frax".to_string(),
            launch_date: "Early 2025".to_string(),
            category: "DeFi".to_string(),
            has_token: true,
        }
    }

    fn range() -> DateRange {
        DateRange {
            from: 1_735_689_600,
            to: 1_735_689_600 + 3 * 86_400 - 60,
        }
    }

    fn chart() -> MarketChart {
        MarketChart {
            prices: vec![
                [JAN_1_2025_MS, 2.0],
                [JAN_1_2025_MS + DAY_MS, 1.5],
                [JAN_1_2025_MS + 2.0 * DAY_MS + 500.0, 3.0],
            ],
            market_caps: vec![[JAN_1_2025_MS, 100.0], [JAN_1_2025_MS + DAY_MS, 90.0]],
            total_volumes: vec![[JAN_1_2025_MS, 7.0]],
        }
    }

    #[test]
    fn test_from_chart_builds_parallel_arrays() {
        let sparkline = Sparkline::from_chart(&frax(), range(), &chart());

        assert_eq!(sparkline.price_array, vec![2.0, 1.5, 3.0]);
        assert_eq!(
            sparkline.time_array,
            vec![1_735_689_600, 1_735_776_000, 1_735_862_400]
        );
        assert_eq!(sparkline.timestamp_array[2], 1_735_862_400_500);
        assert_eq!(sparkline.market_cap_array, vec![100.0, 90.0]);
        assert_eq!(sparkline.volume_array, vec![7.0]);
        assert_eq!(sparkline.points.len(), 3);
        assert_eq!(sparkline.points[1], PricePoint { time: 1_735_776_000, price: 1.5 });
        assert_eq!(sparkline.market_caps[1].market_cap, 90.0);
    }

    #[test]
    fn test_from_chart_summary_statistics() {
        let sparkline = Sparkline::from_chart(&frax(), range(), &chart());

        assert_eq!(sparkline.start_price, 2.0);
        assert_eq!(sparkline.current_price, 3.0);
        assert_eq!(sparkline.price_change, 1.0);
        assert!((sparkline.price_change_percent - 50.0).abs() < 1e-9);
        assert_eq!(sparkline.min_price, 1.5);
        assert_eq!(sparkline.max_price, 3.0);
        assert_eq!(sparkline.data_points, 3);
        assert_eq!(sparkline.days, 3);
        assert!(sparkline.success);
        assert!(sparkline.error.is_none());
        assert!(sparkline.is_cacheable());
    }

    #[test]
    fn test_zero_start_price_yields_zero_percent() {
        let chart = MarketChart {
            prices: vec![[JAN_1_2025_MS, 0.0], [JAN_1_2025_MS + DAY_MS, 1.0]],
            ..MarketChart::default()
        };
        let sparkline = Sparkline::from_chart(&frax(), range(), &chart);

        assert_eq!(sparkline.price_change, 1.0);
        assert_eq!(sparkline.price_change_percent, 0.0);
    }

    #[test]
    fn test_empty_chart_yields_empty_shape_with_message() {
        let sparkline = Sparkline::from_chart(&frax(), range(), &MarketChart::default());

        assert!(sparkline.success);
        assert_eq!(sparkline.data_points, 0);
        assert_eq!(sparkline.days, 0);
        assert!(sparkline.price_array.is_empty());
        assert_eq!(sparkline.from, range().from);
        assert!(sparkline.error.is_none());
        assert_eq!(sparkline.message.as_deref(), Some(NO_HISTORY_MESSAGE));
        assert!(!sparkline.is_cacheable());
    }

    #[test]
    fn test_unknown_asset_shape() {
        let sparkline = Sparkline::unknown_asset("DOGE", 1_792_411_200);

        assert!(sparkline.success);
        assert_eq!(sparkline.ticker, "DOGE");
        assert_eq!(sparkline.coin_id, "");
        assert_eq!(sparkline.from, 0);
        assert_eq!(sparkline.to, 1_792_411_200);
        assert_eq!(sparkline.error.as_deref(), Some("unknown-asset"));
        assert_eq!(
            sparkline.message.as_deref(),
            Some("Token DOGE not found in token list")
        );
    }

    #[test]
    fn test_serialized_field_names() {
        let json = serde_json::to_value(Sparkline::from_chart(&frax(), range(), &chart())).unwrap();

        for field in [
            "priceArray",
            "timeArray",
            "timestampArray",
            "marketCapArray",
            "volumeArray",
            "currentPrice",
            "startPrice",
            "priceChange",
            "priceChangePercent",
            "minPrice",
            "maxPrice",
            "dataPoints",
            "startDate",
            "coinId",
            "days",
        ] {
            assert!(json.get(field).is_some(), "missing field {}", field);
        }
        assert!(json.get("error").is_none());
        assert_eq!(json["marketCaps"][0]["marketCap"], 100.0);
    }

    #[test]
    fn test_round_trips_through_cache_blob() {
        let sparkline = Sparkline::from_chart(&frax(), range(), &chart());
        let blob = serde_json::to_string(&sparkline).unwrap();
        let restored: Sparkline = serde_json::from_str(&blob).unwrap();
        assert_eq!(restored, sparkline);
    }
}
