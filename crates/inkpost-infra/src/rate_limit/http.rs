use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use super::{shard_index, EvictExpired};

struct RateLimitBucket {
    count: u32,
    reset_at: Instant,
}

impl RateLimitBucket {
    fn new(window: Duration) -> Self {
        Self {
            count: 0,
            reset_at: Instant::now() + window,
        }
    }

    fn check_and_increment(&mut self, limit: u32, window: Duration) -> Option<u32> {
        let now = Instant::now();
        if now >= self.reset_at {
            self.count = 0;
            self.reset_at = now + window;
        }

        if self.count < limit {
            self.count += 1;
            Some(limit - self.count)
        } else {
            None
        }
    }

    fn reset_in(&self) -> Duration {
        self.reset_at.saturating_duration_since(Instant::now())
    }
}

/// Fixed-window request limiter keyed by client, sharded to spread lock
/// contention.
pub struct HttpRateLimiter {
    shards: Vec<Arc<Mutex<HashMap<String, RateLimitBucket>>>>,
    limit: u32,
    window: Duration,
    max_buckets: usize,
}

impl HttpRateLimiter {
    /// Create a new rate limiter with default shard count (16 shards)
    pub fn new(limit_per_minute: u32) -> Self {
        Self::with_shards(limit_per_minute, Duration::from_secs(60), 16)
    }

    pub fn with_shards(limit: u32, window: Duration, shard_count: usize) -> Self {
        let shard_count = shard_count.max(1);
        Self {
            shards: (0..shard_count)
                .map(|_| Arc::new(Mutex::new(HashMap::new())))
                .collect(),
            limit,
            window,
            max_buckets: 10_000,
        }
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Count one request for `key`. `Ok` carries the remaining allowance,
    /// `Err` the time until the window resets.
    pub async fn check_rate_limit(&self, key: &str) -> Result<u32, Duration> {
        let index = shard_index(key, self.shards.len());
        let mut buckets = self.shards[index].lock().await;

        if buckets.len() >= self.max_buckets && !buckets.contains_key(key) {
            let now = Instant::now();
            buckets.retain(|_, bucket| bucket.reset_at > now);

            if buckets.len() >= self.max_buckets {
                let oldest = buckets
                    .iter()
                    .min_by_key(|(_, bucket)| bucket.reset_at)
                    .map(|(k, _)| k.clone());
                if let Some(oldest) = oldest {
                    buckets.remove(&oldest);
                    tracing::debug!(shard_index = index, "Evicted oldest rate limit bucket at capacity");
                }
            }
        }

        let bucket = buckets
            .entry(key.to_string())
            .or_insert_with(|| RateLimitBucket::new(self.window));
        bucket
            .check_and_increment(self.limit, self.window)
            .ok_or_else(|| bucket.reset_in())
    }
}

#[async_trait]
impl EvictExpired for HttpRateLimiter {
    async fn cleanup_expired_buckets(&self) -> usize {
        let now = Instant::now();
        let mut removed = 0;
        for shard in &self.shards {
            let mut buckets = shard.lock().await;
            let before = buckets.len();
            buckets.retain(|_, bucket| bucket.reset_at > now);
            removed += before - buckets.len();
        }
        removed
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
