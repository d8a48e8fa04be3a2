//! Endpoint-level composition of asset lookup, cache keys and fetching
//!
//! `TokenService` knows which cache key and lifetime every endpoint uses and
//! how to turn upstream data into the served payload. It has no knowledge of
//! HTTP; the route layer decides status codes and headers.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::cache::{durations, CacheControl, CacheStore};
use crate::data::coingecko::CoinData;
use crate::data::dates::day_start;
use crate::data::stats::TokenMarketRow;
use crate::data::{
    AssetDescriptor, AssetTable, DateRange, Envelope, MarketDataSource, Sparkline, TokenDetail,
    TokenList, TokenPrice, TokenStats, TokenVolume, UpstreamError,
};
use crate::fetch::{CacheSource, FetchRequest, Fetched, ResilientFetcher};

/// Errors surfaced to callers before any fetching starts
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ServiceError {
    /// The ticker is not in the asset table
    #[error("Token {0} not found in token list")]
    UnknownAsset(String),
}

/// A fetched payload with the cache directives of its endpoint
#[derive(Debug, Clone, PartialEq)]
pub struct Served<T> {
    pub fetched: Fetched<T>,
    pub cache_control: CacheControl,
}

impl<T> Served<T> {
    fn new(fetched: Fetched<T>, ttl: Duration) -> Self {
        Self {
            fetched,
            cache_control: CacheControl::from_ttl(ttl),
        }
    }
}

/// Serves every token endpoint
pub struct TokenService {
    source: Arc<dyn MarketDataSource>,
    fetcher: ResilientFetcher,
    assets: Arc<AssetTable>,
}

impl TokenService {
    pub fn new(
        source: Arc<dyn MarketDataSource>,
        cache: Arc<CacheStore>,
        assets: Arc<AssetTable>,
    ) -> Self {
        Self {
            source,
            fetcher: ResilientFetcher::new(cache),
            assets,
        }
    }

    pub fn assets(&self) -> &AssetTable {
        &self.assets
    }

    pub fn cache(&self) -> &CacheStore {
        self.fetcher.cache()
    }

    fn lookup(&self, ticker: &str) -> Result<&AssetDescriptor, ServiceError> {
        self.assets
            .find(ticker)
            .ok_or_else(|| ServiceError::UnknownAsset(ticker.to_string()))
    }

    /// Full token view
    pub async fn token_detail(
        &self,
        ticker: &str,
        force_refresh: bool,
    ) -> Result<Served<Envelope<TokenDetail>>, ServiceError> {
        self.snapshot(
            ticker,
            "token",
            durations::PRICES,
            force_refresh,
            TokenDetail::from_coin,
            TokenDetail::zeroed,
        )
        .await
    }

    /// Current price only
    pub async fn token_price(
        &self,
        ticker: &str,
        force_refresh: bool,
    ) -> Result<Served<Envelope<TokenPrice>>, ServiceError> {
        self.snapshot(
            ticker,
            "token_price",
            durations::PRICES,
            force_refresh,
            TokenPrice::from_coin,
            TokenPrice::zeroed,
        )
        .await
    }

    /// Market cap and 24h volume
    pub async fn token_volume(
        &self,
        ticker: &str,
        force_refresh: bool,
    ) -> Result<Served<Envelope<TokenVolume>>, ServiceError> {
        self.snapshot(
            ticker,
            "token_volume",
            durations::MARKETS,
            force_refresh,
            TokenVolume::from_coin,
            TokenVolume::zeroed,
        )
        .await
    }

    /// Price history since the asset's launch date
    ///
    /// Never fails: an unknown ticker yields an empty sparkline tagged
    /// `unknown-asset`.
    pub async fn sparkline(
        &self,
        ticker: &str,
        force_refresh: bool,
        now: DateTime<Utc>,
    ) -> Served<Sparkline> {
        let Ok(asset) = self.lookup(ticker) else {
            let fetched = Fetched {
                payload: Sparkline::unknown_asset(ticker, now.timestamp()),
                source: CacheSource::Degraded,
                failure: None,
            };
            return Served::new(fetched, durations::SPARKLINE);
        };

        let range = DateRange::resolve(&asset.launch_date, now);
        let request = FetchRequest::new(sparkline_cache_key(asset, range), durations::SPARKLINE)
            .force_refresh(force_refresh);
        let source = &self.source;

        let fetched = self
            .fetcher
            .fetch(
                &request,
                move || async move {
                    let chart = source.market_chart_range(&asset.canonical_id, range).await?;
                    Ok::<_, UpstreamError>(Sparkline::from_chart(asset, range, &chart))
                },
                |failure| Sparkline::degraded(asset, range, failure),
            )
            .await;
        Served::new(fetched, durations::SPARKLINE)
    }

    /// The asset table itself
    pub async fn tokens_list(&self, force_refresh: bool) -> Served<TokenList> {
        let request = FetchRequest::new("tokens_list", durations::METADATA)
            .force_refresh(force_refresh);
        let assets = self.assets.all();

        let fetched = self
            .fetcher
            .fetch(
                &request,
                move || async move { Ok::<_, UpstreamError>(TokenList::new(assets)) },
                |_| TokenList::new(assets),
            )
            .await;
        Served::new(fetched, durations::METADATA)
    }

    /// Market statistics across all assets, or those in `category`
    ///
    /// Assets are fetched concurrently. One asset failing leaves a zeroed row
    /// in the aggregate rather than failing the whole request; only when every
    /// asset fails does the request fall back to stale or degraded stats.
    pub async fn token_stats(
        &self,
        category: Option<&str>,
        force_refresh: bool,
    ) -> Served<TokenStats> {
        let category = category.map(str::trim).filter(|c| !c.is_empty());
        let request = FetchRequest::new(stats_cache_key(category), durations::MARKETS)
            .force_refresh(force_refresh);
        let assets: Vec<&AssetDescriptor> = match category {
            Some(category) => self.assets.in_category(category),
            None => self.assets.all().iter().collect(),
        };
        let source = &self.source;

        let fetched = self
            .fetcher
            .fetch(
                &request,
                move || async move {
                    let outcomes = join_all(assets.into_iter().map(|asset| async move {
                        (asset, source.coin(&asset.canonical_id).await)
                    }))
                    .await;

                    let mut rows = Vec::with_capacity(outcomes.len());
                    let mut first_error = None;
                    for (asset, outcome) in outcomes {
                        match outcome {
                            Ok(coin) => rows.push(TokenMarketRow::from_coin(asset, &coin)),
                            Err(err) => {
                                tracing::debug!(
                                    coin_id = %asset.canonical_id,
                                    error = %err,
                                    "stats row failed"
                                );
                                rows.push(TokenMarketRow::failed(asset, err.to_string()));
                                first_error.get_or_insert(err);
                            }
                        }
                    }

                    // Nothing usable: fall through to stale or degraded output
                    if let Some(err) = first_error.filter(|_| rows.iter().all(|row| !row.success)) {
                        return Err(err);
                    }
                    Ok::<_, UpstreamError>(TokenStats::aggregate(&rows))
                },
                TokenStats::degraded,
            )
            .await;
        Served::new(fetched, durations::MARKETS)
    }

    async fn snapshot<V, M, Z>(
        &self,
        ticker: &str,
        key_prefix: &str,
        ttl: Duration,
        force_refresh: bool,
        make: M,
        zeroed: Z,
    ) -> Result<Served<Envelope<V>>, ServiceError>
    where
        V: Serialize + DeserializeOwned + Send,
        M: FnOnce(&CoinData, &AssetDescriptor) -> V + Send,
        Z: FnOnce(&AssetDescriptor) -> V + Send,
    {
        let asset = self.lookup(ticker)?;
        let request = FetchRequest::new(format!("{}_{}", key_prefix, asset.canonical_id), ttl)
            .force_refresh(force_refresh);
        let source = &self.source;

        let fetched = self
            .fetcher
            .fetch(
                &request,
                move || async move {
                    let coin = source.coin(&asset.canonical_id).await?;
                    Ok::<_, UpstreamError>(Envelope::ok(make(&coin, asset)))
                },
                |failure| Envelope::degraded(zeroed(asset), failure),
            )
            .await;
        Ok(Served::new(fetched, ttl))
    }
}

/// Sparkline key; both ends are day-rounded so an asset holds one entry per day
///
/// `from` is rounded too because a launch date that falls back to a year ago
/// moves with `now`.
fn sparkline_cache_key(asset: &AssetDescriptor, range: DateRange) -> String {
    format!(
        "token_sparkline_{}_{}_{}",
        asset.canonical_id,
        day_start(range.from),
        day_start(range.to)
    )
}

fn stats_cache_key(category: Option<&str>) -> String {
    match category {
        Some(category) => format!(
            "tokens_stats_category_{}",
            category
                .to_lowercase()
                .split_whitespace()
                .collect::<Vec<_>>()
                .join("_")
        ),
        None => "tokens_stats_all".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::coingecko::{MarketChart, MarketData, UsdValue};
    use crate::fetch::ErrorCode;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use parking_lot::Mutex;

    /// Source returning canned results and recording the ids it was asked for
    #[derive(Default)]
    struct FakeSource {
        fail_with_rate_limit: bool,
        failing_ids: Vec<String>,
        chart: MarketChart,
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl MarketDataSource for FakeSource {
        async fn coin(&self, coin_id: &str) -> Result<CoinData, UpstreamError> {
            self.calls.lock().push(coin_id.to_string());
            if self.fail_with_rate_limit {
                return Err(UpstreamError::RateLimited);
            }
            if self.failing_ids.iter().any(|id| id == coin_id) {
                return Err(UpstreamError::Status {
                    status: 500,
                    detail: "boom".to_string(),
                });
            }
            Ok(CoinData {
                id: Some(coin_id.to_string()),
                market_data: MarketData {
                    current_price: UsdValue { usd: Some(2.0) },
                    market_cap: UsdValue { usd: Some(100.0) },
                    total_volume: UsdValue { usd: Some(10.0) },
                    ..MarketData::default()
                },
                ..CoinData::default()
            })
        }

        async fn market_chart_range(
            &self,
            coin_id: &str,
            _range: DateRange,
        ) -> Result<MarketChart, UpstreamError> {
            self.calls.lock().push(coin_id.to_string());
            if self.fail_with_rate_limit {
                return Err(UpstreamError::RateLimited);
            }
            Ok(self.chart.clone())
        }
    }

    fn asset(ticker: &str, coin_id: &str, category: &str) -> AssetDescriptor {
        AssetDescriptor {
            ticker: ticker.to_string(),
            canonical_id: coin_id.to_string(),
            name: ticker.to_string(),
            launch_date: "Early 2025".to_string(),
            category: category.to_string(),
            has_token: true,
        }
    }

    fn service(source: FakeSource) -> (TokenService, Arc<FakeSource>) {
        let source = Arc::new(source);
        let table = AssetTable::from_assets(vec![
            asset("APT", "aptos", "L0/L1"),
            asset("ARB", "arbitrum", "L2"),
            asset("MNT", "mantle", "L2"),
        ]);
        let service = TokenService::new(
            source.clone(),
            Arc::new(CacheStore::new()),
            Arc::new(table),
        );
        (service, source)
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_unknown_ticker_is_rejected() {
        let (service, source) = service(FakeSource::default());

        let err = service.token_price("NOPE", false).await.unwrap_err();

        assert_eq!(err, ServiceError::UnknownAsset("NOPE".to_string()));
        assert_eq!(err.to_string(), "Token NOPE not found in token list");
        assert!(source.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_price_is_cached_under_coin_id() {
        let (service, source) = service(FakeSource::default());

        let first = service.token_price("apt", false).await.unwrap();
        let second = service.token_price("APT", false).await.unwrap();

        assert_eq!(first.fetched.source, CacheSource::Miss);
        assert_eq!(second.fetched.source, CacheSource::Hit);
        assert_eq!(second.fetched.payload.data.unwrap().current_price, 2.0);
        assert_eq!(source.calls.lock().len(), 1);
        assert!(service.cache().get_stale("token_price_aptos").is_some());
        assert_eq!(first.cache_control.s_max_age, 300);
    }

    #[tokio::test]
    async fn test_endpoints_use_separate_keys() {
        let (service, source) = service(FakeSource::default());

        service.token_detail("APT", false).await.unwrap();
        service.token_volume("APT", false).await.unwrap();

        assert_eq!(source.calls.lock().len(), 2);
        assert!(service.cache().get_stale("token_aptos").is_some());
        assert!(service.cache().get_stale("token_volume_aptos").is_some());
    }

    #[tokio::test]
    async fn test_rate_limited_price_degrades_to_zeroed_envelope() {
        let (service, _) = service(FakeSource {
            fail_with_rate_limit: true,
            ..FakeSource::default()
        });

        let served = service.token_price("APT", false).await.unwrap();
        let envelope = served.fetched.payload;

        assert_eq!(served.fetched.source, CacheSource::Degraded);
        assert!(!envelope.success);
        assert_eq!(envelope.error.as_deref(), Some("rate-limited"));
        assert_eq!(envelope.data.unwrap().current_price, 0.0);
    }

    #[tokio::test]
    async fn test_sparkline_unknown_ticker() {
        let (service, source) = service(FakeSource::default());

        let served = service.sparkline("NOPE", false, now()).await;
        let sparkline = served.fetched.payload;

        assert!(sparkline.success);
        assert_eq!(sparkline.error.as_deref(), Some(ErrorCode::UnknownAsset.as_str()));
        assert!(source.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_sparkline_cache_key_is_day_rounded() {
        let (service, _) = service(FakeSource {
            chart: MarketChart {
                prices: vec![[1_735_689_600_000.0, 1.0], [1_735_776_000_000.0, 2.0]],
                ..MarketChart::default()
            },
            ..FakeSource::default()
        });

        let served = service.sparkline("APT", false, now()).await;

        assert_eq!(served.fetched.source, CacheSource::Miss);
        assert_eq!(served.fetched.payload.data_points, 2);
        assert_eq!(served.cache_control.s_max_age, 3600);
        // Early 2025 -> 2025-01-01, today starts at 2026-10-19T00:00Z
        let key = "token_sparkline_aptos_1735689600_1792368000";
        assert!(service.cache().get_stale(key).is_some());

        let later = now() + chrono::Duration::hours(3);
        let again = service.sparkline("APT", false, later).await;
        assert_eq!(again.fetched.source, CacheSource::Hit);
    }

    #[tokio::test]
    async fn test_unparseable_launch_date_reuses_one_key_per_day() {
        let source = Arc::new(FakeSource {
            chart: MarketChart {
                prices: vec![[1_760_000_000_000.0, 1.0], [1_760_086_400_000.0, 2.0]],
                ..MarketChart::default()
            },
            ..FakeSource::default()
        });
        let mut tbd = asset("TBD", "tbd-coin", "L2");
        tbd.launch_date = "TBD".to_string();
        let service = TokenService::new(
            source.clone(),
            Arc::new(CacheStore::new()),
            Arc::new(AssetTable::from_assets(vec![tbd])),
        );

        let mut last = None;
        for offset in 0..6 {
            let at = now() + chrono::Duration::seconds(offset);
            last = Some(service.sparkline("TBD", false, at).await);
        }

        assert_eq!(last.unwrap().fetched.source, CacheSource::Hit);
        assert_eq!(source.calls.lock().len(), 1);
        assert_eq!(service.cache().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_sparkline_is_not_cached() {
        let (service, source) = service(FakeSource::default());

        let served = service.sparkline("APT", false, now()).await;
        assert_eq!(served.fetched.payload.data_points, 0);
        assert!(served.fetched.payload.message.is_some());

        service.sparkline("APT", false, now()).await;
        assert_eq!(source.calls.lock().len(), 2);
        assert!(service.cache().is_empty());
    }

    #[tokio::test]
    async fn test_sparkline_rate_limited_still_succeeds() {
        let (service, _) = service(FakeSource {
            fail_with_rate_limit: true,
            ..FakeSource::default()
        });

        let served = service.sparkline("APT", false, now()).await;
        let sparkline = served.fetched.payload;

        assert_eq!(served.fetched.source, CacheSource::Degraded);
        assert!(sparkline.success);
        assert_eq!(sparkline.error.as_deref(), Some("rate-limited"));
        assert!(sparkline.price_array.is_empty());
    }

    #[tokio::test]
    async fn test_tokens_list_is_cached() {
        let (service, _) = service(FakeSource::default());

        let first = service.tokens_list(false).await;
        let second = service.tokens_list(false).await;

        assert_eq!(first.fetched.payload.count, 3);
        assert_eq!(second.fetched.source, CacheSource::Hit);
        assert_eq!(second.cache_control.s_max_age, 86_400);
    }

    #[tokio::test]
    async fn test_stats_tolerates_individual_failures() {
        let (service, _) = service(FakeSource {
            failing_ids: vec!["mantle".to_string()],
            ..FakeSource::default()
        });

        let served = service.token_stats(None, false).await;
        let stats = served.fetched.payload;

        assert_eq!(stats.summary.total_tokens, 3);
        assert_eq!(stats.summary.successful_tokens, 2);
        assert_eq!(stats.summary.failed_tokens, 1);
        assert_eq!(stats.summary.total_market_cap, 200.0);
        assert!(service.cache().get_stale("tokens_stats_all").is_some());
    }

    #[tokio::test]
    async fn test_stats_all_failed_degrades_with_code() {
        let (service, _) = service(FakeSource {
            failing_ids: vec!["aptos".into(), "arbitrum".into(), "mantle".into()],
            ..FakeSource::default()
        });

        let served = service.token_stats(None, false).await;
        let stats = served.fetched.payload;

        assert_eq!(served.fetched.source, CacheSource::Degraded);
        assert!(!stats.success);
        assert_eq!(stats.error.as_deref(), Some("upstream-error"));
        assert_eq!(stats.summary.total_tokens, 0);
        assert!(service.cache().is_empty());
    }

    #[tokio::test]
    async fn test_stats_all_failed_keeps_last_good_entry() {
        let cache = Arc::new(CacheStore::new());
        let table = Arc::new(AssetTable::from_assets(vec![asset("APT", "aptos", "L0/L1")]));
        let healthy = TokenService::new(Arc::new(FakeSource::default()), cache.clone(), table.clone());
        let limited = TokenService::new(
            Arc::new(FakeSource {
                fail_with_rate_limit: true,
                ..FakeSource::default()
            }),
            cache.clone(),
            table,
        );

        healthy.token_stats(None, false).await;
        let refreshed = limited.token_stats(None, true).await;

        assert_eq!(refreshed.fetched.source, CacheSource::Stale);
        assert_eq!(refreshed.fetched.payload.summary.total_market_cap, 100.0);
        assert_eq!(
            refreshed.fetched.failure.unwrap().code(),
            ErrorCode::RateLimited
        );

        let cached = limited.token_stats(None, false).await;
        assert_eq!(cached.fetched.source, CacheSource::Hit);
        assert_eq!(cached.fetched.payload.summary.total_market_cap, 100.0);
    }

    #[tokio::test]
    async fn test_stats_filters_by_category() {
        let (service, source) = service(FakeSource::default());

        let served = service.token_stats(Some("l2"), false).await;

        assert_eq!(served.fetched.payload.summary.total_tokens, 2);
        assert_eq!(source.calls.lock().len(), 2);
        assert!(service.cache().get_stale("tokens_stats_category_l2").is_some());
    }

    #[tokio::test]
    async fn test_forced_refresh_calls_upstream_again() {
        let (service, source) = service(FakeSource::default());

        service.token_detail("APT", false).await.unwrap();
        let refreshed = service.token_detail("APT", true).await.unwrap();

        assert_eq!(refreshed.fetched.source, CacheSource::Miss);
        assert_eq!(source.calls.lock().len(), 2);
    }

    #[test]
    fn test_stats_cache_keys() {
        assert_eq!(stats_cache_key(None), "tokens_stats_all");
        assert_eq!(
            stats_cache_key(Some("DeFi  Lending")),
            "tokens_stats_category_defi_lending"
        );
    }
}
