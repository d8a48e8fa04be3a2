//! HTTP routes
//!
//! Thin axum layer over [`TokenService`]: per-client rate limiting, JSON
//! rendering, cache headers and permissive CORS.
//!
//! # Endpoints
//!
//! - `GET /api/health`
//! - `GET /api/tokens`
//! - `GET /api/tokens/stats[?category=C]`
//! - `GET /api/token/{id}`
//! - `GET /api/token/{id}/price`
//! - `GET /api/token/{id}/volume`
//! - `GET /api/token/{id}/sparkline`
//!
//! Cached endpoints accept `?refresh=true` to bypass fresh cache entries.

use std::sync::Arc;

use axum::extract::{Path, Query, Request, State};
use axum::http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
    CACHE_CONTROL,
};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::data::Envelope;
use crate::fetch::{CacheSource, FailureKind};
use crate::rate_limit::{client_key, RateLimiter};
use crate::service::{Served, ServiceError, TokenService};

/// Shared state behind every handler
pub struct AppState {
    pub service: TokenService,
    pub limiter: RateLimiter,
}

impl AppState {
    pub fn new(service: TokenService, limiter: RateLimiter) -> Self {
        Self { service, limiter }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FetchQuery {
    refresh: Option<String>,
    category: Option<String>,
}

impl FetchQuery {
    fn force_refresh(&self) -> bool {
        self.refresh.as_deref() == Some("true")
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    success: bool,
    message: &'static str,
    tokens_loaded: usize,
    timestamp: DateTime<Utc>,
}

/// Builds the application router
pub fn router(state: Arc<AppState>) -> Router {
    let limited = Router::new()
        .route("/api/tokens", get(tokens_list).options(preflight))
        .route("/api/tokens/stats", get(token_stats).options(preflight))
        .route("/api/token/{id}", get(token_detail).options(preflight))
        .route("/api/token/{id}/price", get(token_price).options(preflight))
        .route("/api/token/{id}/volume", get(token_volume).options(preflight))
        .route("/api/token/{id}/sparkline", get(sparkline).options(preflight))
        .route_layer(middleware::from_fn_with_state(state.clone(), rate_limit));

    Router::new()
        .route("/api/health", get(health).options(preflight))
        .merge(limited)
        .layer(middleware::from_fn(cors))
        .with_state(state)
}

async fn rate_limit(State(state): State<Arc<AppState>>, request: Request, next: Next) -> Response {
    if request.method() == Method::OPTIONS {
        return next.run(request).await;
    }

    let headers = request.headers();
    let client = client_key(
        header_str(headers, "x-forwarded-for"),
        header_str(headers, "x-real-ip"),
    );
    if !state.limiter.check_and_increment(&client) {
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(serde_json::json!({ "error": "Rate limit exceeded" })),
        )
            .into_response();
    }

    next.run(request).await
}

async fn cors(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, OPTIONS"),
    );
    headers.insert(
        ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type"),
    );
    response
}

async fn preflight() -> StatusCode {
    StatusCode::OK
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        success: true,
        message: "CoinGecko Proxy API is running",
        tokens_loaded: state.service.assets().len(),
        timestamp: Utc::now(),
    })
}

async fn tokens_list(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FetchQuery>,
) -> Response {
    render(state.service.tokens_list(query.force_refresh()).await)
}

async fn token_stats(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FetchQuery>,
) -> Response {
    let served = state
        .service
        .token_stats(query.category.as_deref(), query.force_refresh())
        .await;
    render(served)
}

async fn token_detail(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<FetchQuery>,
) -> Response {
    render_lookup(state.service.token_detail(&id, query.force_refresh()).await)
}

async fn token_price(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<FetchQuery>,
) -> Response {
    render_lookup(state.service.token_price(&id, query.force_refresh()).await)
}

async fn token_volume(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<FetchQuery>,
) -> Response {
    render_lookup(state.service.token_volume(&id, query.force_refresh()).await)
}

async fn sparkline(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<FetchQuery>,
) -> Response {
    let served = state
        .service
        .sparkline(&id, query.force_refresh(), Utc::now())
        .await;
    render(served)
}

fn render_lookup<T: Serialize>(result: Result<Served<T>, ServiceError>) -> Response {
    match result {
        Ok(served) => render(served),
        Err(err @ ServiceError::UnknownAsset(_)) => (
            StatusCode::NOT_FOUND,
            Json(Envelope::<()>::failure(err.to_string())),
        )
            .into_response(),
    }
}

fn render<T: Serialize>(served: Served<T>) -> Response {
    let Served {
        fetched,
        cache_control,
    } = served;

    let mut headers = HeaderMap::new();
    if let Ok(value) = HeaderValue::from_str(&cache_control.to_string()) {
        headers.insert(CACHE_CONTROL, value);
    }
    if let Some(value) = fetched.source.as_header() {
        headers.insert("x-cache", HeaderValue::from_static(value));
    }
    if let (CacheSource::Stale, Some(failure)) = (fetched.source, &fetched.failure) {
        if failure.kind == FailureKind::RateLimited {
            headers.insert("x-rate-limited", HeaderValue::from_static("true"));
        } else if let Ok(value) = HeaderValue::from_str(&failure.reason()) {
            headers.insert("x-error", value);
        }
    }

    (headers, Json(fetched.payload)).into_response()
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}
