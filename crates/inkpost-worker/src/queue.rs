//! Delete-task publication and the shared deletion routine.
//!
//! [`FileDeleteQueue::publish`] never fails the caller: when the broker is
//! missing or rejects the append, the task runs on an in-process retry loop
//! instead. Both paths share [`delete_file`] and [`RetryPolicy`].

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use inkpost_core::models::DeleteTask;
use inkpost_storage::{Storage, StorageError};

use crate::broker::StreamBroker;
use crate::metrics::QueueMetrics;

/// Stream carrying delete tasks.
pub const DELETE_STREAM: &str = "file:delete:stream";

/// Consumer group of the delete workers.
pub const DELETE_GROUP: &str = "file-delete-group";

/// Exponential backoff with a cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Wait before the retry that follows failed attempt number `attempt` (0-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    pub fn can_retry(&self, retry_count: u32) -> bool {
        retry_count < self.max_retries
    }
}

/// Remove one media file. A file that is already gone counts as deleted.
pub async fn delete_file(storage: &dyn Storage, file_path: &str) -> Result<(), StorageError> {
    storage.delete(file_path).await
}

/// How a publish was handled.
#[derive(Debug)]
pub enum PublishOutcome {
    /// Appended to the stream under this entry id.
    Queued(String),
    /// Handed to the in-process retry loop.
    Fallback(JoinHandle<()>),
}

#[derive(Clone)]
pub struct FileDeleteQueue {
    broker: Option<Arc<dyn StreamBroker>>,
    storage: Arc<dyn Storage>,
    policy: RetryPolicy,
    metrics: Arc<QueueMetrics>,
}

impl FileDeleteQueue {
    pub fn new(
        broker: Option<Arc<dyn StreamBroker>>,
        storage: Arc<dyn Storage>,
        policy: RetryPolicy,
        metrics: Arc<QueueMetrics>,
    ) -> Self {
        Self {
            broker,
            storage,
            policy,
            metrics,
        }
    }

    pub fn metrics(&self) -> &Arc<QueueMetrics> {
        &self.metrics
    }

    pub fn backend_name(&self) -> &'static str {
        self.broker.as_ref().map(|b| b.name()).unwrap_or("none")
    }

    /// Schedule deletion of `file_path`.
    #[tracing::instrument(skip(self), fields(backend = self.backend_name()))]
    pub async fn publish(&self, file_path: &str) -> PublishOutcome {
        let task = DeleteTask::new(file_path);

        if let Some(broker) = &self.broker {
            match serde_json::to_string(&task) {
                Ok(payload) => match broker.append(DELETE_STREAM, &payload).await {
                    Ok(id) => {
                        self.metrics.record_published();
                        tracing::debug!(entry_id = %id, file_path = %file_path, "Delete task queued");
                        return PublishOutcome::Queued(id);
                    }
                    Err(e) => {
                        tracing::warn!(
                            error = %e,
                            file_path = %file_path,
                            "Failed to queue delete task, deleting in-process"
                        );
                    }
                },
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to encode delete task, deleting in-process");
                }
            }
        }

        PublishOutcome::Fallback(self.spawn_fallback(task))
    }

    /// Run the bounded retry loop for `task` on the current runtime.
    pub fn spawn_fallback(&self, task: DeleteTask) -> JoinHandle<()> {
        self.metrics.record_fallback();
        let storage = self.storage.clone();
        let metrics = self.metrics.clone();
        let policy = self.policy;
        tokio::spawn(async move {
            run_fallback(storage.as_ref(), policy, &metrics, task).await;
        })
    }
}

async fn run_fallback(
    storage: &dyn Storage,
    policy: RetryPolicy,
    metrics: &QueueMetrics,
    mut task: DeleteTask,
) {
    loop {
        match delete_file(storage, &task.file_path).await {
            Ok(()) => {
                metrics.record_deleted();
                tracing::info!(
                    file_path = %task.file_path,
                    retry_count = task.retry_count,
                    "File deleted (in-process)"
                );
                return;
            }
            Err(e) if policy.can_retry(task.retry_count) => {
                let delay = policy.backoff(task.retry_count);
                tracing::warn!(
                    error = %e,
                    file_path = %task.file_path,
                    retry_count = task.retry_count,
                    delay_ms = delay.as_millis() as u64,
                    "File delete failed, retrying in-process"
                );
                tokio::time::sleep(delay).await;
                task = task.next_attempt();
            }
            Err(e) => {
                metrics.record_terminal_failure();
                tracing::error!(
                    error = %e,
                    file_path = %task.file_path,
                    retry_count = task.retry_count,
                    "File delete failed after max retries"
                );
                return;
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Storage whose delete fails the first `failures` calls.
    pub(crate) struct FlakyStorage {
        pub calls: AtomicU32,
        pub failures: u32,
        root: PathBuf,
    }

    impl FlakyStorage {
        pub(crate) fn new(failures: u32) -> Self {
            Self {
                calls: AtomicU32::new(0),
                failures,
                root: PathBuf::from("/nonexistent"),
            }
        }
    }

    #[async_trait]
    impl Storage for FlakyStorage {
        async fn put(&self, key: &str, _data: Vec<u8>) -> Result<String, StorageError> {
            Ok(key.to_string())
        }

        async fn read(&self, key: &str) -> Result<Vec<u8>, StorageError> {
            Err(StorageError::NotFound(key.to_string()))
        }

        async fn delete(&self, key: &str) -> Result<(), StorageError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err(StorageError::DeleteFailed(format!("disk busy: {}", key)))
            } else {
                Ok(())
            }
        }

        async fn exists(&self, _key: &str) -> Result<bool, StorageError> {
            Ok(false)
        }

        fn url_for(&self, key: &str) -> String {
            key.to_string()
        }

        fn root(&self) -> &Path {
            &self.root
        }
    }

    pub(crate) fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
        }
    }

    struct BrokenBroker;

    #[async_trait]
    impl StreamBroker for BrokenBroker {
        async fn ensure_group(&self, _: &str, _: &str) -> anyhow::Result<()> {
            Err(anyhow::anyhow!("connection refused"))
        }

        async fn append(&self, _: &str, _: &str) -> anyhow::Result<String> {
            Err(anyhow::anyhow!("connection refused"))
        }

        async fn read_group(
            &self,
            _: &str,
            _: &str,
            _: &str,
            _: usize,
            _: Duration,
        ) -> anyhow::Result<Vec<crate::broker::StreamMessage>> {
            Err(anyhow::anyhow!("connection refused"))
        }

        async fn ack(&self, _: &str, _: &str, _: &str) -> anyhow::Result<()> {
            Err(anyhow::anyhow!("connection refused"))
        }

        fn name(&self) -> &'static str {
            "broken"
        }
    }

    #[test]
    fn test_backoff_exponential_then_capped() {
        let policy = RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
        };
        assert_eq!(policy.backoff(0), Duration::from_secs(1));
        assert_eq!(policy.backoff(1), Duration::from_secs(2));
        assert_eq!(policy.backoff(3), Duration::from_secs(8));
        assert_eq!(policy.backoff(4), Duration::from_secs(10));
        assert_eq!(policy.backoff(40), Duration::from_secs(10));
    }

    #[test]
    fn test_can_retry_stops_at_max() {
        let policy = RetryPolicy::default();
        assert!(policy.can_retry(0));
        assert!(policy.can_retry(2));
        assert!(!policy.can_retry(3));
    }

    #[tokio::test]
    async fn test_delete_file_is_idempotent_on_local_storage() {
        let dir = tempfile::tempdir().unwrap();
        let storage = inkpost_storage::LocalStorage::new(dir.path(), "/m".to_string())
            .await
            .unwrap();
        storage.put("2024/05/a.png", b"x".to_vec()).await.unwrap();

        delete_file(&storage, "2024/05/a.png").await.unwrap();
        delete_file(&storage, "2024/05/a.png").await.unwrap();
        assert!(!dir.path().join("2024/05/a.png").exists());
    }

    #[tokio::test]
    async fn test_publish_without_broker_falls_back() {
        let storage = Arc::new(FlakyStorage::new(1));
        let metrics = Arc::new(QueueMetrics::default());
        let queue = FileDeleteQueue::new(None, storage.clone(), fast_policy(), metrics.clone());

        let PublishOutcome::Fallback(handle) = queue.publish("2024/05/a.png").await else {
            panic!("expected fallback");
        };
        handle.await.unwrap();

        assert_eq!(storage.calls.load(Ordering::SeqCst), 2);
        let snap = metrics.snapshot();
        assert_eq!(snap.fallback, 1);
        assert_eq!(snap.deleted, 1);
        assert_eq!(snap.published, 0);
    }

    #[tokio::test]
    async fn test_publish_degrades_when_broker_rejects_append() {
        let storage = Arc::new(FlakyStorage::new(0));
        let metrics = Arc::new(QueueMetrics::default());
        let queue = FileDeleteQueue::new(
            Some(Arc::new(BrokenBroker)),
            storage.clone(),
            fast_policy(),
            metrics.clone(),
        );

        match queue.publish("a.png").await {
            PublishOutcome::Fallback(handle) => handle.await.unwrap(),
            PublishOutcome::Queued(_) => panic!("broken broker cannot queue"),
        }
        assert_eq!(storage.calls.load(Ordering::SeqCst), 1);
        assert_eq!(metrics.snapshot().deleted, 1);
    }

    #[tokio::test]
    async fn test_fallback_gives_up_after_max_retries() {
        let storage = Arc::new(FlakyStorage::new(u32::MAX));
        let metrics = Arc::new(QueueMetrics::default());
        let queue = FileDeleteQueue::new(None, storage.clone(), fast_policy(), metrics.clone());

        if let PublishOutcome::Fallback(handle) = queue.publish("a.png").await {
            handle.await.unwrap();
        }

        assert_eq!(storage.calls.load(Ordering::SeqCst), 4);
        assert_eq!(metrics.snapshot().terminal_failures, 1);
        assert_eq!(metrics.snapshot().deleted, 0);
    }

    #[tokio::test]
    async fn test_publish_with_broker_appends_task() {
        let broker = Arc::new(crate::broker::MemoryStreamBroker::new());
        let metrics = Arc::new(QueueMetrics::default());
        let queue = FileDeleteQueue::new(
            Some(broker.clone()),
            Arc::new(FlakyStorage::new(0)),
            fast_policy(),
            metrics.clone(),
        );

        assert!(matches!(
            queue.publish("2024/05/a.png").await,
            PublishOutcome::Queued(_)
        ));
        assert_eq!(broker.len(DELETE_STREAM), 1);
        assert_eq!(metrics.snapshot().published, 1);
    }
}
