//! Stream broker seam: append-only streams with consumer groups.
//!
//! Semantics follow log-structured streams: every group sees every entry,
//! and within a group each entry is delivered to exactly one member until it
//! is acknowledged.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

use inkpost_db::StreamRepository;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamMessage {
    pub id: String,
    pub payload: String,
}

#[async_trait]
pub trait StreamBroker: Send + Sync {
    /// Create the consumer group if it does not exist yet.
    async fn ensure_group(&self, stream: &str, group: &str) -> Result<()>;

    /// Append a payload and return the entry id.
    async fn append(&self, stream: &str, payload: &str) -> Result<String>;

    /// Read up to `count` new entries for `consumer`, waiting at most `block`
    /// for something to arrive. An empty vec means the wait timed out.
    async fn read_group(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        count: usize,
        block: Duration,
    ) -> Result<Vec<StreamMessage>>;

    async fn ack(&self, stream: &str, group: &str, id: &str) -> Result<()>;

    /// Backend name for logs and health output
    fn name(&self) -> &'static str;
}

/// Durable broker on the `stream_*` tables.
#[derive(Clone)]
pub struct PgStreamBroker {
    repository: StreamRepository,
    poll_interval: Duration,
}

impl PgStreamBroker {
    pub fn new(repository: StreamRepository) -> Self {
        Self {
            repository,
            poll_interval: Duration::from_millis(500),
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }
}

#[async_trait]
impl StreamBroker for PgStreamBroker {
    async fn ensure_group(&self, stream: &str, group: &str) -> Result<()> {
        self.repository
            .ensure_group(stream, group)
            .await
            .context("Failed to create consumer group")
    }

    async fn append(&self, stream: &str, payload: &str) -> Result<String> {
        let id = self
            .repository
            .append(stream, payload)
            .await
            .context("Failed to append stream entry")?;
        Ok(id.to_string())
    }

    async fn read_group(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        count: usize,
        block: Duration,
    ) -> Result<Vec<StreamMessage>> {
        let deadline = Instant::now() + block;
        let count = i64::try_from(count).unwrap_or(i64::MAX);

        loop {
            let entries = self
                .repository
                .claim(stream, group, consumer, count)
                .await
                .context("Failed to read consumer group")?;

            if !entries.is_empty() {
                return Ok(entries
                    .into_iter()
                    .map(|e| StreamMessage {
                        id: e.id.to_string(),
                        payload: e.payload,
                    })
                    .collect());
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(Vec::new());
            }
            tokio::time::sleep(remaining.min(self.poll_interval)).await;
        }
    }

    async fn ack(&self, stream: &str, group: &str, id: &str) -> Result<()> {
        let id: i64 = id
            .parse()
            .with_context(|| format!("Invalid stream entry id '{}'", id))?;
        self.repository
            .ack(stream, group, id)
            .await
            .context("Failed to acknowledge stream entry")?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "postgres"
    }
}

#[derive(Default)]
struct GroupState {
    last_delivered: u64,
    /// entry id -> consumer holding it
    pending: HashMap<u64, String>,
}

#[derive(Default)]
struct StreamState {
    next_id: u64,
    entries: BTreeMap<u64, String>,
    groups: HashMap<String, GroupState>,
}

/// Process-local broker with the same delivery semantics as [`PgStreamBroker`].
/// Entries are lost on restart.
#[derive(Default)]
pub struct MemoryStreamBroker {
    streams: Mutex<HashMap<String, StreamState>>,
    notify: Notify,
}

impl MemoryStreamBroker {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, StreamState>>> {
        self.streams
            .lock()
            .map_err(|_| anyhow::anyhow!("stream broker state poisoned"))
    }

    fn claim(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        count: usize,
    ) -> Result<Vec<StreamMessage>> {
        let mut streams = self.lock()?;
        let state = streams
            .get_mut(stream)
            .ok_or_else(|| anyhow::anyhow!("NOGROUP no such stream '{}'", stream))?;
        let group_state = state
            .groups
            .get_mut(group)
            .ok_or_else(|| anyhow::anyhow!("NOGROUP no such consumer group '{}'", group))?;

        let batch: Vec<(u64, String)> = state
            .entries
            .range(group_state.last_delivered + 1..)
            .take(count)
            .map(|(id, payload)| (*id, payload.clone()))
            .collect();

        if let Some((last, _)) = batch.last() {
            group_state.last_delivered = *last;
        }
        for (id, _) in &batch {
            group_state.pending.insert(*id, consumer.to_string());
        }

        Ok(batch
            .into_iter()
            .map(|(id, payload)| StreamMessage {
                id: id.to_string(),
                payload,
            })
            .collect())
    }

    /// Delivered but unacknowledged entries of a group.
    pub fn pending_count(&self, stream: &str, group: &str) -> usize {
        self.lock()
            .ok()
            .and_then(|s| {
                s.get(stream)
                    .and_then(|st| st.groups.get(group))
                    .map(|g| g.pending.len())
            })
            .unwrap_or(0)
    }

    /// Entries still retained in a stream.
    pub fn len(&self, stream: &str) -> usize {
        self.lock()
            .ok()
            .and_then(|s| s.get(stream).map(|st| st.entries.len()))
            .unwrap_or(0)
    }

    pub fn is_empty(&self, stream: &str) -> bool {
        self.len(stream) == 0
    }
}

#[async_trait]
impl StreamBroker for MemoryStreamBroker {
    async fn ensure_group(&self, stream: &str, group: &str) -> Result<()> {
        let mut streams = self.lock()?;
        streams
            .entry(stream.to_string())
            .or_default()
            .groups
            .entry(group.to_string())
            .or_default();
        Ok(())
    }

    async fn append(&self, stream: &str, payload: &str) -> Result<String> {
        let id = {
            let mut streams = self.lock()?;
            let state = streams.entry(stream.to_string()).or_default();
            state.next_id += 1;
            let id = state.next_id;
            state.entries.insert(id, payload.to_string());
            id
        };
        self.notify.notify_waiters();
        Ok(id.to_string())
    }

    async fn read_group(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        count: usize,
        block: Duration,
    ) -> Result<Vec<StreamMessage>> {
        let deadline = Instant::now() + block;

        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let batch = self.claim(stream, group, consumer, count)?;
            if !batch.is_empty() {
                return Ok(batch);
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(Vec::new());
            }
            if tokio::time::timeout(remaining, notified).await.is_err() {
                return Ok(Vec::new());
            }
        }
    }

    async fn ack(&self, stream: &str, group: &str, id: &str) -> Result<()> {
        let id: u64 = id
            .parse()
            .with_context(|| format!("Invalid stream entry id '{}'", id))?;

        let mut streams = self.lock()?;
        let Some(state) = streams.get_mut(stream) else {
            return Ok(());
        };
        if let Some(g) = state.groups.get_mut(group) {
            g.pending.remove(&id);
        }

        // trim once every group has moved past the entry and nobody holds it
        let done = state
            .groups
            .values()
            .all(|g| g.last_delivered >= id && !g.pending.contains_key(&id));
        if done {
            state.entries.remove(&id);
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const S: &str = "file:delete:stream";
    const G: &str = "file-delete-group";

    #[tokio::test]
    async fn test_group_delivers_each_entry_once() {
        let broker = MemoryStreamBroker::new();
        broker.ensure_group(S, G).await.unwrap();
        broker.append(S, "a").await.unwrap();
        broker.append(S, "b").await.unwrap();

        let first = broker
            .read_group(S, G, "c1", 1, Duration::ZERO)
            .await
            .unwrap();
        let second = broker
            .read_group(S, G, "c2", 10, Duration::ZERO)
            .await
            .unwrap();

        assert_eq!(first.len(), 1);
        assert_eq!(first[0].payload, "a");
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].payload, "b");
        assert_eq!(broker.pending_count(S, G), 2);

        broker.ack(S, G, &first[0].id).await.unwrap();
        broker.ack(S, G, &second[0].id).await.unwrap();
        assert_eq!(broker.pending_count(S, G), 0);
        assert!(broker.is_empty(S));
    }

    #[tokio::test]
    async fn test_read_without_group_fails() {
        let broker = MemoryStreamBroker::new();
        broker.append(S, "a").await.unwrap();
        let result = broker.read_group(S, G, "c1", 1, Duration::ZERO).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_blocked_read_wakes_on_append() {
        let broker = std::sync::Arc::new(MemoryStreamBroker::new());
        broker.ensure_group(S, G).await.unwrap();

        let reader = {
            let broker = broker.clone();
            tokio::spawn(async move {
                broker
                    .read_group(S, G, "c1", 10, Duration::from_secs(5))
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        broker.append(S, "late").await.unwrap();

        let messages = reader.await.unwrap().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].payload, "late");
    }

    #[tokio::test]
    async fn test_blocked_read_times_out_empty() {
        let broker = MemoryStreamBroker::new();
        broker.ensure_group(S, G).await.unwrap();
        let messages = broker
            .read_group(S, G, "c1", 10, Duration::from_millis(10))
            .await
            .unwrap();
        assert!(messages.is_empty());
    }
}
