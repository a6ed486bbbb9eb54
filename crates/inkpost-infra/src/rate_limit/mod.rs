//! In-memory rate limiters and their eviction task.

mod comment;
mod http;

pub use comment::{CommentLimits, CommentRateLimiter};
pub use http::HttpRateLimiter;

use async_trait::async_trait;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// A limiter whose per-key state can be dropped once it no longer matters.
#[async_trait]
pub trait EvictExpired: Send + Sync {
    /// Drop stale entries and return how many were removed.
    async fn cleanup_expired_buckets(&self) -> usize;

    fn name(&self) -> &'static str;
}

fn shard_index(key: &str, shard_count: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    (hasher.finish() as usize) % shard_count
}

/// Periodically evict stale buckets from every limiter until `cancel` fires.
pub fn spawn_bucket_eviction(
    limiters: Vec<Arc<dyn EvictExpired>>,
    every: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // the first tick completes immediately; nothing to evict yet
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            for limiter in &limiters {
                let removed = limiter.cleanup_expired_buckets().await;
                if removed > 0 {
                    tracing::debug!(limiter = limiter.name(), removed, "Evicted rate limit buckets");
                }
            }
        }

        tracing::debug!("Rate limit eviction task stopped");
    })
}
