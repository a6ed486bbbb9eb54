use async_trait::async_trait;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

use super::{pattern_matches, Cache};

struct Entry {
    value: String,
    expires_at: Instant,
}

/// Bounded in-process cache with per-entry expiry.
pub struct MemoryCache {
    entries: Mutex<LruCache<String, Entry>>,
}

impl MemoryCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> Option<String> {
        let mut entries = self.entries.lock().ok()?;
        let expired = match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => return Some(entry.value.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.pop(key);
        }
        None
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.put(
                key.to_string(),
                Entry {
                    value,
                    expires_at: Instant::now() + ttl,
                },
            );
        }
    }

    async fn delete(&self, key: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.pop(key);
        }
    }

    async fn delete_by_pattern(&self, pattern: &str) {
        let Ok(mut entries) = self.entries.lock() else {
            return;
        };
        let keys: Vec<String> = entries
            .iter()
            .filter(|(key, _)| pattern_matches(pattern, key))
            .map(|(key, _)| key.clone())
            .collect();
        for key in keys {
            entries.pop(&key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{get_json, get_or_load, set_json};

    #[tokio::test]
    async fn test_set_get_delete() {
        let cache = MemoryCache::new(8);
        cache.set("a", "1".into(), Duration::from_secs(60)).await;
        assert_eq!(cache.get("a").await.as_deref(), Some("1"));
        cache.delete("a").await;
        assert_eq!(cache.get("a").await, None);
    }

    #[tokio::test]
    async fn test_entries_expire() {
        let cache = MemoryCache::new(8);
        cache.set("a", "1".into(), Duration::from_millis(10)).await;
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(cache.get("a").await, None);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_capacity_evicts_least_recent() {
        let cache = MemoryCache::new(2);
        let ttl = Duration::from_secs(60);
        cache.set("a", "1".into(), ttl).await;
        cache.set("b", "2".into(), ttl).await;
        cache.get("a").await;
        cache.set("c", "3".into(), ttl).await;
        assert!(cache.get("a").await.is_some());
        assert!(cache.get("b").await.is_none());
    }

    #[tokio::test]
    async fn test_delete_by_prefix() {
        let cache = MemoryCache::new(8);
        let ttl = Duration::from_secs(60);
        cache.set("posts:list:1", "x".into(), ttl).await;
        cache.set("posts:list:2", "x".into(), ttl).await;
        cache.set("posts:detail:1", "x".into(), ttl).await;

        cache.delete_by_pattern("posts:list:*").await;
        assert_eq!(cache.len(), 1);
        assert!(cache.get("posts:detail:1").await.is_some());
    }

    #[tokio::test]
    async fn test_json_helpers_drop_garbage() {
        let cache = MemoryCache::new(8);
        let ttl = Duration::from_secs(60);
        set_json(&cache, "k", &vec![1, 2, 3], ttl).await;
        assert_eq!(get_json::<Vec<i32>>(&cache, "k").await, Some(vec![1, 2, 3]));

        cache.set("bad", "{not json".into(), ttl).await;
        assert_eq!(get_json::<Vec<i32>>(&cache, "bad").await, None);
        assert!(cache.get("bad").await.is_none());
    }

    #[tokio::test]
    async fn test_get_or_load_loads_once() {
        let cache = MemoryCache::new(8);
        let ttl = Duration::from_secs(60);
        let mut loads = 0;

        for _ in 0..3 {
            let value: Result<String, ()> = get_or_load(Some(&cache), "k", ttl, || {
                loads += 1;
                async { Ok("loaded".to_string()) }
            })
            .await;
            assert_eq!(value.unwrap(), "loaded");
        }
        assert_eq!(loads, 1);
    }
}
