//! Storage abstraction trait
//!
//! This module defines the Storage trait that media backends implement.

use async_trait::async_trait;
use inkpost_core::AppError;
use std::path::Path;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(key) => AppError::NotFound(format!("File not found: {}", key)),
            StorageError::InvalidKey(key) => AppError::BadRequest(format!("Invalid file path: {}", key)),
            other => AppError::Internal(other.to_string()),
        }
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Storage abstraction trait
///
/// Keys are paths relative to the media root (see the crate root documentation).
#[async_trait]
pub trait Storage: Send + Sync {
    /// Write `data` under `storage_key` and return the public URL.
    async fn put(&self, storage_key: &str, data: Vec<u8>) -> StorageResult<String>;

    /// Read a file by its storage key
    async fn read(&self, storage_key: &str) -> StorageResult<Vec<u8>>;

    /// Delete a file by its storage key.
    ///
    /// Deleting a key that does not exist succeeds.
    async fn delete(&self, storage_key: &str) -> StorageResult<()>;

    /// Check if a file exists
    async fn exists(&self, storage_key: &str) -> StorageResult<bool>;

    /// Public URL for a key
    fn url_for(&self, storage_key: &str) -> String;

    /// Root directory the keys are resolved against.
    fn root(&self) -> &Path;
}
