use async_trait::async_trait;
use inkpost_core::AppError;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use super::{shard_index, EvictExpired};

const SHARDS: usize = 16;

#[derive(Debug, Clone, Copy)]
pub struct CommentLimits {
    /// Minimum gap between two comments from one client
    pub min_interval: Duration,
    pub max_per_window: u32,
    pub window: Duration,
}

impl Default for CommentLimits {
    fn default() -> Self {
        Self {
            min_interval: Duration::from_secs(60),
            max_per_window: 10,
            window: Duration::from_secs(3600),
        }
    }
}

struct Activity {
    last_at: Instant,
    window_start: Instant,
    count: u32,
}

/// Per-IP comment throttle: a minimum gap between comments plus a cap per
/// window.
pub struct CommentRateLimiter {
    shards: Vec<Arc<Mutex<HashMap<String, Activity>>>>,
    limits: CommentLimits,
}

impl Default for CommentRateLimiter {
    fn default() -> Self {
        Self::new(CommentLimits::default())
    }
}

impl CommentRateLimiter {
    pub fn new(limits: CommentLimits) -> Self {
        Self {
            shards: (0..SHARDS)
                .map(|_| Arc::new(Mutex::new(HashMap::new())))
                .collect(),
            limits,
        }
    }

    /// Record a comment from `ip`, or reject it without recording.
    pub async fn check(&self, ip: &str) -> Result<(), AppError> {
        let mut entries = self.shards[shard_index(ip, SHARDS)].lock().await;
        let now = Instant::now();

        let Some(activity) = entries.get_mut(ip) else {
            entries.insert(
                ip.to_string(),
                Activity {
                    last_at: now,
                    window_start: now,
                    count: 1,
                },
            );
            return Ok(());
        };

        if now.duration_since(activity.last_at) < self.limits.min_interval {
            return Err(AppError::RateLimited {
                code: "COMMENT_TOO_FAST",
                message: "You are commenting too fast, please wait a moment".to_string(),
            });
        }

        if now.duration_since(activity.window_start) >= self.limits.window {
            activity.window_start = now;
            activity.count = 0;
        }
        if activity.count >= self.limits.max_per_window {
            return Err(AppError::RateLimited {
                code: "COMMENT_LIMIT_EXCEEDED",
                message: "Comment limit reached, please try again later".to_string(),
            });
        }

        activity.count += 1;
        activity.last_at = now;
        Ok(())
    }
}

#[async_trait]
impl EvictExpired for CommentRateLimiter {
    async fn cleanup_expired_buckets(&self) -> usize {
        let now = Instant::now();
        let mut removed = 0;
        for shard in &self.shards {
            let mut entries = shard.lock().await;
            let before = entries.len();
            entries.retain(|_, a| {
                now.duration_since(a.window_start) < self.limits.window
                    || now.duration_since(a.last_at) < self.limits.min_interval
            });
            removed += before - entries.len();
        }
        removed
    }

    fn name(&self) -> &'static str {
        "comment"
    }
}
