//! Token proxy library
//!
//! A caching, rate-limited HTTP proxy that serves normalized token market data
//! from the CoinGecko Pro API to the dashboard. The modules are exposed for
//! use in integration tests.

pub mod app;
pub mod cache;
pub mod cli;
pub mod data;
pub mod fetch;
pub mod rate_limit;
pub mod routes;
pub mod service;
pub mod telemetry;
