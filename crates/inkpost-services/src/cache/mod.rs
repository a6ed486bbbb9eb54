//! Response cache seam.
//!
//! Values are stored as JSON strings so any backend that can hold bytes can
//! implement [`Cache`]. A cache miss or a decode failure is never an error for
//! the caller; it simply falls through to the database.

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::future::Future;
use std::time::Duration;

#[cfg(feature = "cache")]
mod memory;

#[cfg(feature = "cache")]
pub use memory::MemoryCache;

#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> Option<String>;

    async fn set(&self, key: &str, value: String, ttl: Duration);

    async fn delete(&self, key: &str);

    /// Delete every key matching `pattern`. A trailing `*` matches any suffix;
    /// anything else is an exact key.
    async fn delete_by_pattern(&self, pattern: &str);
}

/// Does `key` match a `delete_by_pattern` pattern?
pub fn pattern_matches(pattern: &str, key: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => key.starts_with(prefix),
        None => key == pattern,
    }
}

pub async fn get_json<T: DeserializeOwned>(cache: &dyn Cache, key: &str) -> Option<T> {
    let raw = cache.get(key).await?;
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(error = %e, cache_key = %key, "Dropping undecodable cache entry");
            cache.delete(key).await;
            None
        }
    }
}

pub async fn set_json<T: Serialize>(cache: &dyn Cache, key: &str, value: &T, ttl: Duration) {
    match serde_json::to_string(value) {
        Ok(raw) => cache.set(key, raw, ttl).await,
        Err(e) => tracing::warn!(error = %e, cache_key = %key, "Failed to encode cache entry"),
    }
}

/// Return the cached value for `key`, or run `load` and cache its result.
/// Without a cache this is just `load`.
pub async fn get_or_load<T, E, F, Fut>(
    cache: Option<&dyn Cache>,
    key: &str,
    ttl: Duration,
    load: F,
) -> Result<T, E>
where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let Some(cache) = cache else {
        return load().await;
    };
    if let Some(hit) = get_json(cache, key).await {
        tracing::trace!(cache_key = %key, "Cache hit");
        return Ok(hit);
    }
    let value = load().await?;
    set_json(cache, key, &value, ttl).await;
    Ok(value)
}
