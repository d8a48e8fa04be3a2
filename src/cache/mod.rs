//! Cache module for storing serialized upstream responses in memory
//!
//! This module provides a process-wide store with TTL-aware reads and an
//! unconditional stale read, allowing the proxy to keep serving old data
//! when the upstream API is unavailable. Entries live only as long as the
//! process; every instance owns an independent cache.

mod policy;
mod store;

pub use policy::{durations, CacheControl};
pub use store::{CacheEntry, CacheStore};
