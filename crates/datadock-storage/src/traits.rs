//! Storage abstraction trait

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Save failed: {0}")]
    SaveFailed(String),

    #[error("Read failed: {0}")]
    ReadFailed(String),

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

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Chunked object contents
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, StorageError>> + Send>>;

/// Durable object storage
///
/// **Key format:** `user_{owner_id}/{filename}`, see [`crate::keys`].
#[async_trait]
pub trait Storage: Send + Sync {
    /// Persist `data` under `key` and return the key actually used.
    ///
    /// An existing object is never overwritten: when `key` is taken, a short
    /// random suffix is inserted before the extension.
    async fn save(&self, key: &str, data: Vec<u8>) -> StorageResult<String>;

    /// Read the whole object
    async fn open(&self, key: &str) -> StorageResult<Vec<u8>>;

    /// Read the object as a stream of chunks
    async fn open_stream(&self, key: &str) -> StorageResult<ByteStream>;

    /// Delete an object; deleting a missing object succeeds.
    async fn delete(&self, key: &str) -> StorageResult<()>;

    async fn exists(&self, key: &str) -> StorageResult<bool>;
}
