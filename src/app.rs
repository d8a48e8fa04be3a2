//! Application assembly and server lifecycle
//!
//! Builds the shared state from a [`ServerConfig`] and runs the HTTP server
//! until Ctrl+C or SIGTERM.

use std::sync::Arc;

use thiserror::Error;
use tokio::net::TcpListener;
use tokio::signal;

use crate::cache::CacheStore;
use crate::cli::ServerConfig;
use crate::data::{AssetTable, AssetTableError, CoinGeckoClient};
use crate::rate_limit::RateLimiter;
use crate::routes::{router, AppState};
use crate::service::TokenService;

/// Errors that stop the server from starting or running
#[derive(Debug, Error)]
pub enum ServeError {
    #[error("Failed to load asset table: {0}")]
    Assets(#[from] AssetTableError),

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: std::net::SocketAddr,
        source: std::io::Error,
    },

    #[error("Server error: {0}")]
    Server(std::io::Error),
}

/// Loads the asset table, falling back to the built-in one
pub fn load_assets(config: &ServerConfig) -> Result<AssetTable, AssetTableError> {
    match &config.assets_path {
        Some(path) => {
            let table = AssetTable::from_json_file(path)?;
            tracing::info!(path = %path.display(), assets = table.len(), "loaded asset table");
            Ok(table)
        }
        None => Ok(AssetTable::builtin()),
    }
}

/// Builds the shared state for `config`
pub fn build_state(config: &ServerConfig) -> Result<Arc<AppState>, ServeError> {
    let assets = Arc::new(load_assets(config)?);
    let client = CoinGeckoClient::new(config.api_key.clone()).with_base_url(&config.base_url);
    if !client.has_credential() {
        tracing::warn!("COINGECKO_API_KEY is not set; data endpoints will report missing-credential");
    }

    let service = TokenService::new(Arc::new(client), Arc::new(CacheStore::new()), assets);
    let limiter = RateLimiter::new(config.rate_limit);
    Ok(Arc::new(AppState::new(service, limiter)))
}

/// Runs the server until a shutdown signal arrives
pub async fn serve(config: ServerConfig) -> Result<(), ServeError> {
    let state = build_state(&config)?;
    let tokens = state.service.assets().len();

    let listener = TcpListener::bind(config.addr)
        .await
        .map_err(|source| ServeError::Bind {
            addr: config.addr,
            source,
        })?;

    tracing::info!(addr = %config.addr, tokens, "token proxy listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(ServeError::Server)?;

    tracing::info!("token proxy stopped");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("received Ctrl+C, shutting down"),
        () = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
