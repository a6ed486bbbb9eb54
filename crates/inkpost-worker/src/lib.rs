//! Asynchronous media file deletion.
//!
//! Deleting a media record publishes a [`DeleteTask`](inkpost_core::models::DeleteTask)
//! on a durable stream. A [`DeleteConsumer`] removes the file, retrying with
//! exponential backoff by republishing. When no stream is available the
//! queue degrades to an in-process retry loop with the same policy.

pub mod broker;
pub mod consumer;
pub mod metrics;
pub mod queue;

pub use broker::{MemoryStreamBroker, PgStreamBroker, StreamBroker, StreamMessage};
pub use consumer::{ConsumerConfig, DeleteConsumer, MessageOutcome};
pub use metrics::{QueueMetrics, QueueMetricsSnapshot};
pub use queue::{
    delete_file, FileDeleteQueue, PublishOutcome, RetryPolicy, DELETE_GROUP, DELETE_STREAM,
};
