//! Command-line and environment configuration for the token proxy
//!
//! Every flag can also be set through an environment variable (or a `.env`
//! file loaded at start-up). `ServerConfig::from_cli` validates the parsed
//! values into the runtime configuration.

use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use thiserror::Error;

use crate::data::coingecko::COINGECKO_BASE_URL;
use crate::rate_limit::RateLimitPolicy;

/// Error types for configuration validation
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CliError {
    /// A rate limit of zero requests would reject every caller
    #[error("Invalid rate limit: --rate-limit-max must be at least 1")]
    ZeroMaxRequests,

    /// A zero-length window would never count anything
    #[error("Invalid rate limit: --rate-limit-window-secs must be at least 1")]
    ZeroWindow,

    /// The upstream base URL is not an http(s) URL
    #[error("Invalid base URL: '{0}'. Expected an http:// or https:// URL")]
    InvalidBaseUrl(String),
}

/// Token proxy - cached, rate-limited CoinGecko market data for the dashboard
#[derive(Parser)]
#[command(name = "tokenproxy")]
#[command(about = "Caching, rate-limited proxy for CoinGecko token market data")]
#[command(version)]
pub struct Cli {
    /// Address to listen on
    #[arg(long, env = "TOKENPROXY_HOST", default_value = "0.0.0.0")]
    pub host: IpAddr,

    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// CoinGecko Pro API key
    ///
    /// Without a key the proxy still starts; data endpoints then report
    /// `missing-credential`.
    #[arg(long, env = "COINGECKO_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Upstream API base URL
    #[arg(long, env = "COINGECKO_BASE_URL", default_value = COINGECKO_BASE_URL)]
    pub base_url: String,

    /// Requests allowed per client within one window
    #[arg(long, env = "RATE_LIMIT_MAX_REQUESTS", default_value_t = 100)]
    pub rate_limit_max: u32,

    /// Length of a rate-limit window in seconds
    #[arg(long, env = "RATE_LIMIT_WINDOW_SECS", default_value_t = 60)]
    pub rate_limit_window_secs: u64,

    /// JSON file replacing the built-in asset table
    #[arg(long, env = "TOKENPROXY_ASSETS", value_name = "PATH")]
    pub assets: Option<PathBuf>,
}

/// Validated runtime configuration
#[derive(Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Socket address the server binds to
    pub addr: SocketAddr,
    pub api_key: Option<String>,
    pub base_url: String,
    pub rate_limit: RateLimitPolicy,
    /// Optional asset table override
    pub assets_path: Option<PathBuf>,
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("addr", &self.addr)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("base_url", &self.base_url)
            .field("rate_limit", &self.rate_limit)
            .field("assets_path", &self.assets_path)
            .finish()
    }
}

impl ServerConfig {
    /// Creates a ServerConfig from parsed CLI arguments.
    ///
    /// # Returns
    /// * `Ok(ServerConfig)` with validated settings
    /// * `Err(CliError)` if a rate-limit value is zero or the base URL is not http(s)
    pub fn from_cli(cli: &Cli) -> Result<Self, CliError> {
        if cli.rate_limit_max == 0 {
            return Err(CliError::ZeroMaxRequests);
        }
        if cli.rate_limit_window_secs == 0 {
            return Err(CliError::ZeroWindow);
        }

        let base_url = cli.base_url.trim();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(CliError::InvalidBaseUrl(cli.base_url.clone()));
        }

        Ok(ServerConfig {
            addr: SocketAddr::new(cli.host, cli.port),
            api_key: cli
                .api_key
                .as_deref()
                .map(str::trim)
                .filter(|key| !key.is_empty())
                .map(str::to_string),
            base_url: base_url.trim_end_matches('/').to_string(),
            rate_limit: RateLimitPolicy {
                max_requests: cli.rate_limit_max,
                window: Duration::from_secs(cli.rate_limit_window_secs),
            },
            assets_path: cli.assets.clone(),
        })
    }
}
