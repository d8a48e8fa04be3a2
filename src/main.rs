//! Token proxy - serve cached CoinGecko market data to the token dashboard
//!
//! Starts an HTTP server exposing token prices, volumes, sparklines and
//! aggregate statistics, with per-client rate limiting and stale-cache
//! fallback when the upstream API is unavailable.

use std::process;

use clap::Parser;

use tokenproxy::cli::{Cli, ServerConfig};
use tokenproxy::{app, telemetry};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // A missing .env file is fine; real environment variables still apply
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    telemetry::init();

    let config = match ServerConfig::from_cli(&cli) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Error: {}", err);
            process::exit(2);
        }
    };
    tracing::debug!(?config, "starting with configuration");

    app::serve(config).await?;
    Ok(())
}
