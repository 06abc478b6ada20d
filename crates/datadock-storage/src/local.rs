use crate::keys::with_suffix;
use crate::traits::{ByteStream, Storage, StorageError, StorageResult};
use async_trait::async_trait;
use futures::StreamExt;
use rand::Rng;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;

const MAX_NAME_ATTEMPTS: usize = 100;
const SUFFIX_LEN: usize = 7;

/// Local filesystem storage implementation
#[derive(Clone, Debug)]
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    /// Create a new LocalStorage rooted at `base_path` (e.g. `MEDIA_ROOT`)
    pub async fn new(base_path: impl Into<PathBuf>) -> StorageResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(&base_path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        Ok(LocalStorage { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Convert storage key to filesystem path.
    ///
    /// Only plain relative components are accepted, so a key can never
    /// resolve outside the base directory.
    fn key_to_path(&self, storage_key: &str) -> StorageResult<PathBuf> {
        if storage_key.is_empty()
            || storage_key.starts_with('/')
            || storage_key.contains('\\')
        {
            return Err(StorageError::InvalidKey(format!(
                "Storage key contains invalid characters: {}",
                storage_key
            )));
        }

        let relative = Path::new(storage_key);
        if !relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
        {
            return Err(StorageError::InvalidKey(format!(
                "Storage key resolves outside storage directory: {}",
                storage_key
            )));
        }

        Ok(self.base_path.join(relative))
    }

    async fn ensure_parent_dir(&self, path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    fn random_suffix() -> String {
        rand::rng()
            .sample_iter(&rand::distr::Alphanumeric)
            .take(SUFFIX_LEN)
            .map(char::from)
            .collect()
    }

    /// Create the file exclusively, so concurrent savers never share a name.
    async fn create_exclusive(&self, key: &str) -> StorageResult<Option<(String, fs::File)>> {
        let path = self.key_to_path(key)?;
        self.ensure_parent_dir(&path).await?;
        match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => Ok(Some((key.to_string(), file))),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(None),
            Err(e) => Err(StorageError::SaveFailed(format!(
                "Failed to create file {}: {}",
                path.display(),
                e
            ))),
        }
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn save(&self, key: &str, data: Vec<u8>) -> StorageResult<String> {
        let start = std::time::Instant::now();

        let mut created = self.create_exclusive(key).await?;
        let mut attempts = 1;
        while created.is_none() {
            if attempts >= MAX_NAME_ATTEMPTS {
                return Err(StorageError::SaveFailed(format!(
                    "No free name found for {} after {} attempts",
                    key, attempts
                )));
            }
            created = self
                .create_exclusive(&with_suffix(key, &Self::random_suffix()))
                .await?;
            attempts += 1;
        }
        let Some((stored_key, mut file)) = created else {
            return Err(StorageError::SaveFailed(key.to_string()));
        };

        let path = self.key_to_path(&stored_key)?;
        let write = async {
            file.write_all(&data).await?;
            file.sync_all().await
        };
        if let Err(e) = write.await {
            let _ = fs::remove_file(&path).await;
            return Err(StorageError::SaveFailed(format!(
                "Failed to write file {}: {}",
                path.display(),
                e
            )));
        }

        tracing::info!(
            path = %path.display(),
            key = %stored_key,
            requested_key = %key,
            size_bytes = data.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage save successful"
        );

        Ok(stored_key)
    }

    async fn open(&self, key: &str) -> StorageResult<Vec<u8>> {
        let path = self.key_to_path(key)?;

        match fs::read(&path).await {
            Ok(data) => {
                tracing::debug!(key = %key, size_bytes = data.len(), "Local storage read");
                Ok(data)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StorageError::NotFound(key.to_string())),
            Err(e) => Err(StorageError::ReadFailed(format!(
                "Failed to read file {}: {}",
                path.display(),
                e
            ))),
        }
    }

    async fn open_stream(&self, key: &str) -> StorageResult<ByteStream> {
        let path = self.key_to_path(key)?;

        let file = match fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StorageError::NotFound(key.to_string()))
            }
            Err(e) => {
                return Err(StorageError::ReadFailed(format!(
                    "Failed to open file {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        let stream = ReaderStream::new(file).map(|chunk| chunk.map_err(StorageError::from));
        Ok(Box::pin(stream))
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let path = self.key_to_path(key)?;

        match fs::remove_file(&path).await {
            Ok(()) => {
                tracing::info!(path = %path.display(), key = %key, "Local storage delete successful");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::DeleteFailed(format!(
                "Failed to delete file {}: {}",
                path.display(),
                e
            ))),
        }
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        let path = self.key_to_path(key)?;
        Ok(fs::try_exists(&path).await.unwrap_or(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;

    #[tokio::test]
    async fn test_save_open_delete() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path()).await.unwrap();

        let key = storage
            .save("user_1/data.csv", b"a,b\n1,2\n".to_vec())
            .await
            .unwrap();
        assert_eq!(key, "user_1/data.csv");
        assert!(storage.exists(&key).await.unwrap());
        assert_eq!(storage.open(&key).await.unwrap(), b"a,b\n1,2\n");

        storage.delete(&key).await.unwrap();
        assert!(!storage.exists(&key).await.unwrap());
        // Deleting again is not an error
        storage.delete(&key).await.unwrap();
    }

    #[tokio::test]
    async fn test_save_never_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path()).await.unwrap();

        let first = storage.save("user_1/data.csv", b"first".to_vec()).await.unwrap();
        let second = storage.save("user_1/data.csv", b"second".to_vec()).await.unwrap();

        assert_ne!(first, second);
        assert!(second.starts_with("user_1/data_"));
        assert!(second.ends_with(".csv"));
        assert_eq!(storage.open(&first).await.unwrap(), b"first");
        assert_eq!(storage.open(&second).await.unwrap(), b"second");
    }

    #[tokio::test]
    async fn test_open_missing_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path()).await.unwrap();
        assert!(matches!(
            storage.open("user_1/missing.csv").await,
            Err(StorageError::NotFound(_))
        ));
        assert!(matches!(
            storage.open_stream("user_1/missing.csv").await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_open_stream_yields_contents() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path()).await.unwrap();
        let key = storage.save("user_1/a.csv", b"x;y\n".to_vec()).await.unwrap();

        let chunks: Vec<bytes::Bytes> = storage
            .open_stream(&key)
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        let joined: Vec<u8> = chunks.into_iter().flatten().collect();
        assert_eq!(joined, b"x;y\n");
    }

    #[tokio::test]
    async fn test_rejects_traversal_keys() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path()).await.unwrap();
        for key in ["../escape.csv", "../x", "/etc/passwd", "user_1/../../x", ""] {
            assert!(
                matches!(storage.open(key).await, Err(StorageError::InvalidKey(_))),
                "{} should be rejected",
                key
            );
        }
    }

    #[tokio::test]
    async fn test_double_dots_inside_a_name_are_allowed() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path()).await.unwrap();

        let key = storage
            .save("user_1/alice_q3..final.csv", b"q3".to_vec())
            .await
            .unwrap();
        assert_eq!(key, "user_1/alice_q3..final.csv");
        assert_eq!(storage.open(&key).await.unwrap(), b"q3");
    }
}
