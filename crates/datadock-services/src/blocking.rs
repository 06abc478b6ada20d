use datadock_core::AppError;
use datadock_storage::StorageError;

/// Run CPU-bound parsing off the async runtime
pub(crate) async fn run_blocking<T, F>(f: F) -> Result<T, AppError>
where
    F: FnOnce() -> Result<T, AppError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AppError::Internal(format!("blocking task failed: {}", e)))?
}

pub(crate) fn storage_error(key: &str, err: StorageError) -> AppError {
    match err {
        StorageError::NotFound(_) => AppError::NotFound(format!("Stored file '{}' not found", key)),
        other => AppError::Storage(other.to_string()),
    }
}
