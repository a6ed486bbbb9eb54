use crate::{LocalStorage, Storage, StorageResult};
use inkpost_core::Config;
use std::sync::Arc;

/// Create the media storage backend from configuration.
pub async fn create_storage(config: &Config) -> StorageResult<Arc<dyn Storage>> {
    let storage = LocalStorage::new(config.media_dir(), config.media_base_url().to_string()).await?;

    tracing::info!(
        media_dir = %config.media_dir(),
        base_url = %config.media_base_url(),
        "Local media storage initialized"
    );

    Ok(Arc::new(storage))
}
