//! Consumer-group worker for delete tasks.
//!
//! Per message: decode, delete, then one of
//! - deleted: ack
//! - failed below the retry cap: wait the backoff, republish with
//!   `retry_count + 1`, ack the original
//! - failed at the cap, or undecodable: log, count, ack

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use inkpost_core::models::DeleteTask;
use inkpost_storage::Storage;

use crate::broker::{StreamBroker, StreamMessage};
use crate::metrics::QueueMetrics;
use crate::queue::{delete_file, FileDeleteQueue, RetryPolicy, DELETE_GROUP, DELETE_STREAM};

#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    pub stream: String,
    pub group: String,
    pub consumer_name: String,
    pub batch_size: usize,
    pub block: Duration,
    /// Pause after a failed read
    pub error_backoff: Duration,
}

impl ConsumerConfig {
    pub fn new(consumer_name: impl Into<String>) -> Self {
        Self {
            stream: DELETE_STREAM.to_string(),
            group: DELETE_GROUP.to_string(),
            consumer_name: consumer_name.into(),
            batch_size: 10,
            block: Duration::from_secs(5),
            error_backoff: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageOutcome {
    Deleted,
    Requeued,
    Dropped,
}

pub struct DeleteConsumer {
    broker: Arc<dyn StreamBroker>,
    storage: Arc<dyn Storage>,
    policy: RetryPolicy,
    metrics: Arc<QueueMetrics>,
    config: ConsumerConfig,
    /// Used when a republish fails so the retry still happens.
    fallback: FileDeleteQueue,
}

impl DeleteConsumer {
    pub fn new(
        broker: Arc<dyn StreamBroker>,
        storage: Arc<dyn Storage>,
        policy: RetryPolicy,
        metrics: Arc<QueueMetrics>,
        config: ConsumerConfig,
    ) -> Self {
        let fallback = FileDeleteQueue::new(None, storage.clone(), policy, metrics.clone());
        Self {
            broker,
            storage,
            policy,
            metrics,
            config,
            fallback,
        }
    }

    /// Run on the current runtime until `cancel` fires.
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            if let Err(e) = self.run(cancel).await {
                tracing::error!(error = %e, "Delete queue consumer stopped with error");
            }
        })
    }

    /// Consume until cancelled. The batch being handled when cancellation
    /// arrives is finished first.
    pub async fn run(&self, cancel: CancellationToken) -> anyhow::Result<()> {
        self.broker
            .ensure_group(&self.config.stream, &self.config.group)
            .await?;

        tracing::info!(
            stream = %self.config.stream,
            group = %self.config.group,
            consumer = %self.config.consumer_name,
            backend = self.broker.name(),
            "Delete queue consumer started"
        );

        loop {
            let read = tokio::select! {
                _ = cancel.cancelled() => break,
                read = self.broker.read_group(
                    &self.config.stream,
                    &self.config.group,
                    &self.config.consumer_name,
                    self.config.batch_size,
                    self.config.block,
                ) => read,
            };

            match read {
                Ok(messages) => {
                    for message in &messages {
                        self.handle(message, &cancel).await;
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to read delete queue");
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(self.config.error_backoff) => {}
                    }
                }
            }
        }

        tracing::info!(consumer = %self.config.consumer_name, "Delete queue consumer stopped");
        Ok(())
    }

    #[tracing::instrument(skip(self, message, cancel), fields(entry_id = %message.id))]
    pub async fn handle(&self, message: &StreamMessage, cancel: &CancellationToken) -> MessageOutcome {
        let task: DeleteTask = match serde_json::from_str(&message.payload) {
            Ok(task) => task,
            Err(e) => {
                tracing::warn!(error = %e, payload = %message.payload, "Dropping malformed delete task");
                self.metrics.record_malformed();
                self.ack(message).await;
                return MessageOutcome::Dropped;
            }
        };

        let outcome = match delete_file(self.storage.as_ref(), &task.file_path).await {
            Ok(()) => {
                self.metrics.record_deleted();
                tracing::info!(
                    file_path = %task.file_path,
                    retry_count = task.retry_count,
                    "File deleted"
                );
                MessageOutcome::Deleted
            }
            Err(e) if self.policy.can_retry(task.retry_count) => {
                let delay = self.policy.backoff(task.retry_count);
                tracing::warn!(
                    error = %e,
                    file_path = %task.file_path,
                    retry_count = task.retry_count,
                    delay_ms = delay.as_millis() as u64,
                    "File delete failed, requeueing"
                );

                // a shutdown cuts the wait short but the retry is still published
                tokio::select! {
                    _ = cancel.cancelled() => {}
                    _ = tokio::time::sleep(delay) => {}
                }

                self.requeue(task.next_attempt()).await;
                MessageOutcome::Requeued
            }
            Err(e) => {
                self.metrics.record_terminal_failure();
                tracing::error!(
                    error = %e,
                    file_path = %task.file_path,
                    retry_count = task.retry_count,
                    "File delete failed after max retries, giving up"
                );
                MessageOutcome::Dropped
            }
        };

        self.ack(message).await;
        outcome
    }

    async fn requeue(&self, task: DeleteTask) {
        let appended = match serde_json::to_string(&task) {
            Ok(payload) => self.broker.append(&self.config.stream, &payload).await,
            Err(e) => Err(e.into()),
        };

        match appended {
            Ok(_) => self.metrics.record_requeued(),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    file_path = %task.file_path,
                    "Failed to republish delete task, retrying in-process"
                );
                self.fallback.spawn_fallback(task);
            }
        }
    }

    async fn ack(&self, message: &StreamMessage) {
        if let Err(e) = self
            .broker
            .ack(&self.config.stream, &self.config.group, &message.id)
            .await
        {
            tracing::warn!(error = %e, entry_id = %message.id, "Failed to ack delete task");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::MemoryStreamBroker;
    use crate::queue::tests::{fast_policy, FlakyStorage};
    use crate::queue::PublishOutcome;
    use std::sync::atomic::Ordering;

    fn consumer(
        broker: Arc<MemoryStreamBroker>,
        storage: Arc<FlakyStorage>,
        metrics: Arc<QueueMetrics>,
    ) -> DeleteConsumer {
        let mut config = ConsumerConfig::new("test-consumer");
        config.block = Duration::from_millis(20);
        DeleteConsumer::new(broker, storage, fast_policy(), metrics, config)
    }

    async fn wait_until(mut done: impl FnMut() -> bool) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !done() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    #[tokio::test]
    async fn test_retry_cap_makes_exactly_four_attempts() {
        let broker = Arc::new(MemoryStreamBroker::new());
        let storage = Arc::new(FlakyStorage::new(u32::MAX));
        let metrics = Arc::new(QueueMetrics::default());

        let queue = FileDeleteQueue::new(
            Some(broker.clone()),
            storage.clone(),
            fast_policy(),
            metrics.clone(),
        );
        assert!(matches!(
            queue.publish("2024/05/stuck.png").await,
            PublishOutcome::Queued(_)
        ));

        let cancel = CancellationToken::new();
        let handle = consumer(broker.clone(), storage.clone(), metrics.clone()).spawn(cancel.clone());

        wait_until(|| metrics.snapshot().terminal_failures == 1).await;
        cancel.cancel();
        handle.await.unwrap();

        assert_eq!(storage.calls.load(Ordering::SeqCst), 4);
        let snap = metrics.snapshot();
        assert_eq!(snap.requeued, 3);
        assert_eq!(snap.deleted, 0);
        assert_eq!(broker.pending_count(DELETE_STREAM, DELETE_GROUP), 0);
    }

    #[tokio::test]
    async fn test_transient_failure_is_requeued_then_deleted() {
        let broker = Arc::new(MemoryStreamBroker::new());
        let storage = Arc::new(FlakyStorage::new(1));
        let metrics = Arc::new(QueueMetrics::default());
        broker.ensure_group(DELETE_STREAM, DELETE_GROUP).await.unwrap();
        broker
            .append(DELETE_STREAM, &serde_json::to_string(&DeleteTask::new("a.png")).unwrap())
            .await
            .unwrap();

        let consumer = consumer(broker.clone(), storage.clone(), metrics.clone());
        let cancel = CancellationToken::new();

        let first = broker
            .read_group(DELETE_STREAM, DELETE_GROUP, "t", 10, Duration::ZERO)
            .await
            .unwrap();
        assert_eq!(consumer.handle(&first[0], &cancel).await, MessageOutcome::Requeued);

        let second = broker
            .read_group(DELETE_STREAM, DELETE_GROUP, "t", 10, Duration::ZERO)
            .await
            .unwrap();
        let retried: DeleteTask = serde_json::from_str(&second[0].payload).unwrap();
        assert_eq!(retried.retry_count, 1);
        assert_eq!(consumer.handle(&second[0], &cancel).await, MessageOutcome::Deleted);

        assert_eq!(metrics.snapshot().deleted, 1);
        assert_eq!(broker.pending_count(DELETE_STREAM, DELETE_GROUP), 0);
    }

    #[tokio::test]
    async fn test_malformed_payload_is_acked_and_dropped() {
        let broker = Arc::new(MemoryStreamBroker::new());
        let storage = Arc::new(FlakyStorage::new(0));
        let metrics = Arc::new(QueueMetrics::default());
        broker.ensure_group(DELETE_STREAM, DELETE_GROUP).await.unwrap();
        broker.append(DELETE_STREAM, "{not json").await.unwrap();

        let consumer = consumer(broker.clone(), storage.clone(), metrics.clone());
        let messages = broker
            .read_group(DELETE_STREAM, DELETE_GROUP, "t", 10, Duration::ZERO)
            .await
            .unwrap();

        let outcome = consumer.handle(&messages[0], &CancellationToken::new()).await;
        assert_eq!(outcome, MessageOutcome::Dropped);
        assert_eq!(metrics.snapshot().malformed, 1);
        assert_eq!(storage.calls.load(Ordering::SeqCst), 0);
        assert_eq!(broker.pending_count(DELETE_STREAM, DELETE_GROUP), 0);
    }

    #[tokio::test]
    async fn test_cancelled_backoff_still_republishes() {
        let broker = Arc::new(MemoryStreamBroker::new());
        let storage = Arc::new(FlakyStorage::new(u32::MAX));
        let metrics = Arc::new(QueueMetrics::default());
        broker.ensure_group(DELETE_STREAM, DELETE_GROUP).await.unwrap();
        broker
            .append(DELETE_STREAM, &serde_json::to_string(&DeleteTask::new("a.png")).unwrap())
            .await
            .unwrap();

        let mut config = ConsumerConfig::new("slow");
        config.block = Duration::ZERO;
        let slow_policy = RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_secs(3600),
            max_delay: Duration::from_secs(3600),
        };
        let consumer = DeleteConsumer::new(broker.clone(), storage, slow_policy, metrics.clone(), config);

        let cancel = CancellationToken::new();
        cancel.cancel();
        let messages = broker
            .read_group(DELETE_STREAM, DELETE_GROUP, "t", 10, Duration::ZERO)
            .await
            .unwrap();

        let outcome = tokio::time::timeout(Duration::from_secs(1), consumer.handle(&messages[0], &cancel))
            .await
            .expect("cancelled backoff must not block");
        assert_eq!(outcome, MessageOutcome::Requeued);
        assert_eq!(metrics.snapshot().requeued, 1);
        assert_eq!(broker.len(DELETE_STREAM), 1);
    }

    #[tokio::test]
    async fn test_run_stops_on_cancel() {
        let broker = Arc::new(MemoryStreamBroker::new());
        let consumer = consumer(
            broker,
            Arc::new(FlakyStorage::new(0)),
            Arc::new(QueueMetrics::default()),
        );
        let cancel = CancellationToken::new();
        let handle = consumer.spawn(cancel.clone());
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("consumer did not stop")
            .unwrap();
    }
}
