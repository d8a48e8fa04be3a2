//! Cache lifetimes and HTTP cache-control derivation

use std::fmt;
use std::time::Duration;

/// Named cache lifetimes for each class of payload
pub mod durations {
    use std::time::Duration;

    /// Token prices
    pub const PRICES: Duration = Duration::from_secs(5 * 60);
    /// Market caps and volume
    pub const MARKETS: Duration = Duration::from_secs(5 * 60);
    /// Sparkline ranges; the series only moves once a day
    pub const SPARKLINE: Duration = Duration::from_secs(60 * 60);
    /// Static project metadata such as the tracked asset list
    pub const METADATA: Duration = Duration::from_secs(24 * 60 * 60);
}

/// Shared-cache directives derived from a TTL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheControl {
    /// Seconds a shared cache may serve the response as fresh
    pub s_max_age: u64,
    /// Seconds a shared cache may keep serving it while revalidating
    pub stale_while_revalidate: u64,
}

impl CacheControl {
    /// `s-maxage` is the TTL in whole seconds, `stale-while-revalidate` half of that
    pub fn from_ttl(ttl: Duration) -> Self {
        let s_max_age = ttl.as_secs();
        Self {
            s_max_age,
            stale_while_revalidate: s_max_age / 2,
        }
    }
}

impl fmt::Display for CacheControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "s-maxage={}, stale-while-revalidate={}",
            self.s_max_age, self.stale_while_revalidate
        )
    }
}
