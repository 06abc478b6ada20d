use crate::{LocalStorage, Storage, StorageResult};
use datadock_core::Config;
use std::sync::Arc;

/// Create the storage backend for original uploads, rooted at `MEDIA_ROOT`.
pub async fn create_storage(config: &Config) -> StorageResult<Arc<dyn Storage>> {
    let storage = LocalStorage::new(config.media_root()).await?;
    tracing::info!(
        base_path = %storage.base_path().display(),
        "Local storage initialized"
    );
    Ok(Arc::new(storage))
}
