use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::OrphanSweep;

/// Runs an [`OrphanSweep`] on a fixed interval until cancelled.
pub struct SweepScheduler {
    sweep: Arc<OrphanSweep>,
    every: Duration,
}

impl SweepScheduler {
    pub fn new(sweep: Arc<OrphanSweep>, every: Duration) -> Self {
        Self { sweep, every }
    }

    /// Start the background task. The first sweep runs immediately.
    /// Returns a JoinHandle for graceful shutdown.
    pub fn start(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(self.every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            tracing::info!(
                interval_secs = self.every.as_secs(),
                root = %self.sweep.root().display(),
                "Orphan sweep scheduler started"
            );

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                tracing::info!("Starting scheduled orphan sweep");
                if let Err(e) = self.sweep.execute().await {
                    tracing::error!(error = %e, "Orphan sweep failed");
                }
            }

            tracing::info!("Orphan sweep scheduler stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cleanup::ReferencedFiles;
    use async_trait::async_trait;
    use inkpost_core::AppError;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counting(AtomicUsize);

    #[async_trait]
    impl ReferencedFiles for Counting {
        async fn referenced_file_paths(&self) -> Result<HashSet<String>, AppError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(HashSet::new())
        }
    }

    #[tokio::test]
    async fn test_runs_immediately_and_stops_on_cancel() {
        let dir = tempfile::tempdir().unwrap();
        let counter = Arc::new(Counting::default());
        let sweep = Arc::new(OrphanSweep::new(dir.path(), counter.clone(), Duration::ZERO));

        let cancel = CancellationToken::new();
        let handle = SweepScheduler::new(sweep, Duration::from_secs(3600)).start(cancel.clone());

        tokio::time::sleep(Duration::from_millis(100)).await;
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("scheduler should stop")
            .unwrap();

        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
    }
}
