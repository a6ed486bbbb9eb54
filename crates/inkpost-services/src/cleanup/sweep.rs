use async_trait::async_trait;
use inkpost_core::AppError;
use inkpost_db::MediaRepository;
use serde::Serialize;
use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use walkdir::WalkDir;

/// Source of the file paths that must be kept.
#[async_trait]
pub trait ReferencedFiles: Send + Sync {
    /// Paths relative to the media root, `/`-separated.
    async fn referenced_file_paths(&self) -> Result<HashSet<String>, AppError>;
}

#[async_trait]
impl ReferencedFiles for MediaRepository {
    async fn referenced_file_paths(&self) -> Result<HashSet<String>, AppError> {
        Ok(self
            .list_all_referenced_file_paths()
            .await?
            .into_iter()
            .collect())
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SweepStats {
    pub scanned: usize,
    pub orphans_found: usize,
    pub deleted: usize,
    pub failed: usize,
    pub skipped_recent: usize,
}

struct DiskFile {
    relative: String,
    modified: Option<SystemTime>,
}

pub struct OrphanSweep {
    root: PathBuf,
    referenced: Arc<dyn ReferencedFiles>,
    min_age: Duration,
}

impl OrphanSweep {
    pub fn new(root: impl Into<PathBuf>, referenced: Arc<dyn ReferencedFiles>, min_age: Duration) -> Self {
        Self {
            root: root.into(),
            referenced,
            min_age,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Walk the media root and delete every regular file that is not
    /// referenced. Files younger than `min_age` are left alone since their
    /// row may not be committed yet.
    #[tracing::instrument(skip(self), fields(cleanup.operation = "orphan_sweep", root = %self.root.display()))]
    pub async fn execute(&self) -> Result<SweepStats, AppError> {
        let mut stats = SweepStats::default();

        if !tokio::fs::try_exists(&self.root).await.unwrap_or(false) {
            tracing::debug!("Media root does not exist, nothing to sweep");
            return Ok(stats);
        }

        // list the disk before loading references: a file written after the
        // reference load would otherwise look orphaned
        let root = self.root.clone();
        let (files, walk_failures) = tokio::task::spawn_blocking(move || list_files(&root))
            .await
            .map_err(|e| AppError::Internal(format!("Sweep walk panicked: {}", e)))?;
        stats.scanned = files.len();
        stats.failed += walk_failures;

        let referenced = self.referenced.referenced_file_paths().await?;
        let now = SystemTime::now();

        for file in files {
            if referenced.contains(&file.relative) {
                continue;
            }
            stats.orphans_found += 1;

            let Some(modified) = file.modified else {
                stats.failed += 1;
                continue;
            };
            let age = now.duration_since(modified).unwrap_or(Duration::ZERO);
            if age < self.min_age {
                stats.skipped_recent += 1;
                continue;
            }

            match tokio::fs::remove_file(self.root.join(&file.relative)).await {
                Ok(()) => {
                    stats.deleted += 1;
                    tracing::debug!(file_path = %file.relative, "Deleted orphaned file");
                }
                Err(e) if e.kind() == ErrorKind::NotFound => stats.deleted += 1,
                Err(e) => {
                    stats.failed += 1;
                    tracing::warn!(error = %e, file_path = %file.relative, "Failed to delete orphaned file");
                }
            }
        }

        tracing::info!(
            scanned = stats.scanned,
            orphans_found = stats.orphans_found,
            deleted = stats.deleted,
            failed = stats.failed,
            skipped_recent = stats.skipped_recent,
            "Orphan sweep finished"
        );

        Ok(stats)
    }
}

/// Regular files under `root` with their `/`-joined relative paths, plus the
/// number of entries that could not be read.
fn list_files(root: &Path) -> (Vec<DiskFile>, usize) {
    let mut files = Vec::new();
    let mut failures = 0;

    for entry in WalkDir::new(root).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read media directory entry");
                failures += 1;
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let Ok(relative) = entry.path().strip_prefix(root) else {
            failures += 1;
            continue;
        };
        let Some(relative) = relative
            .components()
            .map(|c| c.as_os_str().to_str())
            .collect::<Option<Vec<_>>>()
        else {
            tracing::warn!(path = %entry.path().display(), "Skipping non UTF-8 file name");
            failures += 1;
            continue;
        };

        let modified = entry.metadata().ok().and_then(|m| m.modified().ok());
        files.push(DiskFile {
            relative: relative.join("/"),
            modified,
        });
    }

    (files, failures)
}
