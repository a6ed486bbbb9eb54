use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for the delete pipeline, shared by the queue and its consumer.
#[derive(Debug, Default)]
pub struct QueueMetrics {
    published: AtomicU64,
    fallback: AtomicU64,
    deleted: AtomicU64,
    requeued: AtomicU64,
    terminal_failures: AtomicU64,
    malformed: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueMetricsSnapshot {
    pub published: u64,
    pub fallback: u64,
    pub deleted: u64,
    pub requeued: u64,
    pub terminal_failures: u64,
    pub malformed: u64,
}

impl QueueMetrics {
    pub fn record_published(&self) {
        self.published.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fallback(&self) {
        self.fallback.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_deleted(&self) {
        self.deleted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_requeued(&self) {
        self.requeued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_terminal_failure(&self) {
        self.terminal_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_malformed(&self) {
        self.malformed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> QueueMetricsSnapshot {
        QueueMetricsSnapshot {
            published: self.published.load(Ordering::Relaxed),
            fallback: self.fallback.load(Ordering::Relaxed),
            deleted: self.deleted.load(Ordering::Relaxed),
            requeued: self.requeued.load(Ordering::Relaxed),
            terminal_failures: self.terminal_failures.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
        }
    }
}
