//! Cache-backed upstream fetching with graceful degradation
//!
//! Every cached endpoint resolves its payload by walking [`LADDER`] in order:
//!
//! 1. [`Rung::FreshCache`]: serve an entry younger than the endpoint TTL
//!    (skipped when a refresh is forced)
//! 2. [`Rung::Upstream`]: call upstream and cache the result
//! 3. [`Rung::StaleCache`]: serve an entry of any age
//! 4. [`Rung::DegradedEmpty`]: serve a zeroed payload carrying an error code
//!
//! Upstream failures never escape [`ResilientFetcher::fetch`]; they are
//! absorbed into a [`FetchFailure`] attached to the result.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::cache::CacheStore;
use crate::data::UpstreamError;

/// A payload that can be stored in the cache as JSON
pub trait CachedPayload: Serialize + DeserializeOwned + Send {
    /// Whether a successful upstream result should be written to the cache
    fn is_cacheable(&self) -> bool {
        true
    }
}

/// Error code reported in degraded payloads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    RateLimited,
    UpstreamError,
    MissingCredential,
    UnknownAsset,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::RateLimited => "rate-limited",
            ErrorCode::UpstreamError => "upstream-error",
            ErrorCode::MissingCredential => "missing-credential",
            ErrorCode::UnknownAsset => "unknown-asset",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What went wrong with an upstream call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Upstream answered 429
    RateLimited,
    /// No API key is configured
    MissingCredential,
    /// Upstream answered, but not with usable data
    Upstream,
    /// Upstream could not be reached
    Network,
}

/// An absorbed upstream failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchFailure {
    pub kind: FailureKind,
    /// HTTP status upstream answered with, when it answered
    pub status: Option<u16>,
    /// Human-readable detail
    pub message: String,
}

impl FetchFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            status: None,
            message: message.into(),
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Error code reported to the dashboard
    pub fn code(&self) -> ErrorCode {
        match self.kind {
            FailureKind::RateLimited => ErrorCode::RateLimited,
            FailureKind::MissingCredential => ErrorCode::MissingCredential,
            FailureKind::Upstream | FailureKind::Network => ErrorCode::UpstreamError,
        }
    }

    /// Short reason used in the `X-Error` header when stale data is served
    pub fn reason(&self) -> String {
        match (self.kind, self.status) {
            (FailureKind::RateLimited, _) => "Rate limited".to_string(),
            (FailureKind::MissingCredential, _) => "Missing API key".to_string(),
            (FailureKind::Network, _) => "Network error".to_string(),
            (FailureKind::Upstream, Some(status)) => format!("API Error {}", status),
            (FailureKind::Upstream, None) => "Invalid upstream response".to_string(),
        }
    }
}

impl From<UpstreamError> for FetchFailure {
    fn from(err: UpstreamError) -> Self {
        let message = err.to_string();
        match err {
            UpstreamError::MissingCredential => {
                FetchFailure::new(FailureKind::MissingCredential, message)
            }
            UpstreamError::RateLimited => {
                FetchFailure::new(FailureKind::RateLimited, message).with_status(429)
            }
            UpstreamError::NotFound { .. } => {
                FetchFailure::new(FailureKind::Upstream, message).with_status(404)
            }
            UpstreamError::Status { status, .. } => {
                FetchFailure::new(FailureKind::Upstream, message).with_status(status)
            }
            UpstreamError::Request(_) => FetchFailure::new(FailureKind::Network, message),
            UpstreamError::Parse(_) | UpstreamError::InvalidBaseUrl(_) => {
                FetchFailure::new(FailureKind::Upstream, message)
            }
        }
    }
}

/// Where a served payload came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
    /// Fresh cache entry
    Hit,
    /// Fetched from upstream
    Miss,
    /// Expired cache entry served after an upstream failure
    Stale,
    /// Zeroed payload, nothing else was available
    Degraded,
}

impl CacheSource {
    /// Value of the `X-Cache` response header, if any
    pub fn as_header(&self) -> Option<&'static str> {
        match self {
            CacheSource::Hit => Some("HIT"),
            CacheSource::Miss => Some("MISS"),
            CacheSource::Stale => Some("STALE"),
            CacheSource::Degraded => None,
        }
    }
}

/// One step of the fallback ladder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rung {
    FreshCache,
    Upstream,
    StaleCache,
    DegradedEmpty,
}

/// Fallback ladder, walked top to bottom until a rung yields a payload
pub const LADDER: [Rung; 4] = [
    Rung::FreshCache,
    Rung::Upstream,
    Rung::StaleCache,
    Rung::DegradedEmpty,
];

/// Identity and freshness rules for one fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub key: String,
    pub ttl: Duration,
    pub force_refresh: bool,
}

impl FetchRequest {
    pub fn new(key: impl Into<String>, ttl: Duration) -> Self {
        Self {
            key: key.into(),
            ttl,
            force_refresh: false,
        }
    }

    pub fn force_refresh(mut self, force: bool) -> Self {
        self.force_refresh = force;
        self
    }
}

/// A resolved payload and how it was obtained
#[derive(Debug, Clone, PartialEq)]
pub struct Fetched<T> {
    pub payload: T,
    pub source: CacheSource,
    /// Upstream failure behind a stale or degraded result
    pub failure: Option<FetchFailure>,
}

/// Walks the fallback ladder against a shared cache
#[derive(Debug, Clone)]
pub struct ResilientFetcher {
    cache: Arc<CacheStore>,
}

impl ResilientFetcher {
    pub fn new(cache: Arc<CacheStore>) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    /// Resolves a payload for `request`
    ///
    /// `upstream` is called at most once. `degraded` builds the zeroed payload
    /// when neither upstream nor the cache can supply one.
    pub async fn fetch<T, F, Fut, D>(
        &self,
        request: &FetchRequest,
        upstream: F,
        degraded: D,
    ) -> Fetched<T>
    where
        T: CachedPayload,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, UpstreamError>>,
        D: FnOnce(&FetchFailure) -> T,
    {
        let key = request.key.as_str();
        let mut upstream = Some(upstream);
        let mut failure: Option<FetchFailure> = None;

        for rung in LADDER {
            tracing::debug!(cache_key = key, ?rung, "trying rung");
            match rung {
                Rung::FreshCache => {
                    if request.force_refresh {
                        continue;
                    }
                    // Expired entries must survive this read for the stale rung
                    let fresh = self
                        .cache
                        .peek(key)
                        .filter(|entry| entry.is_fresh(request.ttl, Instant::now()));
                    if let Some(payload) = fresh.and_then(|entry| decode(key, &entry.payload)) {
                        return Fetched {
                            payload,
                            source: CacheSource::Hit,
                            failure: None,
                        };
                    }
                }
                Rung::Upstream => {
                    let Some(call) = upstream.take() else {
                        continue;
                    };
                    match call().await {
                        Ok(payload) => {
                            self.store(key, &payload);
                            return Fetched {
                                payload,
                                source: CacheSource::Miss,
                                failure: None,
                            };
                        }
                        Err(err) => failure = Some(err.into()),
                    }
                }
                Rung::StaleCache => {
                    let stale = self.cache.get_stale(key);
                    if let Some(payload) = stale.and_then(|blob| decode(key, &blob)) {
                        tracing::warn!(
                            cache_key = key,
                            reason = failure.as_ref().map(|f| f.message.as_str()),
                            "serving stale cache entry"
                        );
                        return Fetched {
                            payload,
                            source: CacheSource::Stale,
                            failure,
                        };
                    }
                }
                Rung::DegradedEmpty => break,
            }
        }

        let failure =
            failure.unwrap_or_else(|| FetchFailure::new(FailureKind::Upstream, "No data available"));
        tracing::warn!(
            cache_key = key,
            code = %failure.code(),
            message = %failure.message,
            "serving degraded payload"
        );
        Fetched {
            payload: degraded(&failure),
            source: CacheSource::Degraded,
            failure: Some(failure),
        }
    }

    fn store<T: CachedPayload>(&self, key: &str, payload: &T) {
        if !payload.is_cacheable() {
            tracing::debug!(cache_key = key, "payload not cacheable, skipping store");
            return;
        }
        match serde_json::to_string(payload) {
            Ok(blob) => self.cache.set(key, blob),
            Err(err) => tracing::warn!(cache_key = key, error = %err, "failed to encode payload"),
        }
    }
}

/// Decodes a cached blob, treating an undecodable one as absent
fn decode<T: DeserializeOwned>(key: &str, blob: &str) -> Option<T> {
    match serde_json::from_str(blob) {
        Ok(payload) => Some(payload),
        Err(err) => {
            tracing::warn!(cache_key = key, error = %err, "discarding undecodable cache entry");
            None
        }
    }
}
