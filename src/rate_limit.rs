//! Per-client fixed-window request limiting
//!
//! Every client key gets its own counting window that opens on the client's
//! first request. Windows are fixed rather than sliding, so a client can spend
//! its full allowance just before a reset and again just after it.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Key shared by every caller whose address could not be determined
pub const FALLBACK_CLIENT_KEY: &str = "default";

/// Default number of requests allowed per window
const DEFAULT_MAX_REQUESTS: u32 = 100;

/// Default window length
const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

/// Tracked clients above which elapsed windows are swept on insert
const SWEEP_THRESHOLD: usize = 1024;

/// Limits applied to every client key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    /// Requests allowed within one window
    pub max_requests: u32,
    /// Length of a window
    pub window: Duration,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            max_requests: DEFAULT_MAX_REQUESTS,
            window: DEFAULT_WINDOW,
        }
    }
}

/// Request count for one client within its current window
#[derive(Debug, Clone, Copy)]
struct RateWindow {
    count: u32,
    reset_at: Instant,
}

/// Fixed-window rate limiter keyed by client
#[derive(Debug)]
pub struct RateLimiter {
    policy: RateLimitPolicy,
    windows: Mutex<HashMap<String, RateWindow>>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimitPolicy::default())
    }
}

impl RateLimiter {
    pub fn new(policy: RateLimitPolicy) -> Self {
        Self {
            policy,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Records a request for `client_key` and reports whether it is allowed
    ///
    /// A missing or elapsed window is replaced by a fresh one with a count of 1.
    /// Within an active window the count is incremented while it is below the
    /// maximum; once the maximum is reached requests are rejected and the count
    /// is left untouched.
    pub fn check_and_increment(&self, client_key: &str) -> bool {
        let now = Instant::now();
        let mut windows = self.windows.lock();

        match windows.get_mut(client_key) {
            Some(window) if now <= window.reset_at => {
                if window.count < self.policy.max_requests {
                    window.count += 1;
                    true
                } else {
                    tracing::debug!(client = client_key, count = window.count, "rate limit exceeded");
                    false
                }
            }
            _ => {
                if windows.len() >= SWEEP_THRESHOLD {
                    let before = windows.len();
                    windows.retain(|_, window| now <= window.reset_at);
                    tracing::debug!(removed = before - windows.len(), "swept elapsed rate windows");
                }
                windows.insert(
                    client_key.to_string(),
                    RateWindow {
                        count: 1,
                        reset_at: now + self.policy.window,
                    },
                );
                true
            }
        }
    }

    /// Number of client windows held, open or elapsed
    pub fn tracked_clients(&self) -> usize {
        self.windows.lock().len()
    }

    /// Requests counted for `client_key` in its current window, if one is open
    pub fn current_count(&self, client_key: &str) -> Option<u32> {
        let now = Instant::now();
        self.windows
            .lock()
            .get(client_key)
            .filter(|window| now <= window.reset_at)
            .map(|window| window.count)
    }
}

/// Derives the rate-limit key for a caller
///
/// Uses the first address of a forwarded-for header, then a real-IP header,
/// and finally the shared [`FALLBACK_CLIENT_KEY`].
pub fn client_key(forwarded_for: Option<&str>, real_ip: Option<&str>) -> String {
    if let Some(first) = forwarded_for
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty())
    {
        return first.to_string();
    }

    match real_ip.map(str::trim).filter(|value| !value.is_empty()) {
        Some(ip) => ip.to_string(),
        None => FALLBACK_CLIENT_KEY.to_string(),
    }
}
