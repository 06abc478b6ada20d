//! Record lifecycle: cascade delete and explicit cache refresh

use crate::blocking::{run_blocking, storage_error};
use datadock_core::{AppError, DataFile};
use datadock_db::DataFileStore;
use datadock_storage::Storage;
use datadock_tabular::{cache_original, CacheManager, FillMode, SheetFillReport};
use std::sync::Arc;
use uuid::Uuid;

/// What a cascade delete removed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeleteReport {
    pub bytes_deleted: bool,
    pub cache_purged: bool,
    pub record_deleted: bool,
}

#[derive(Clone)]
pub struct DataFileLifecycle {
    records: Arc<dyn DataFileStore>,
    storage: Arc<dyn Storage>,
    cache: CacheManager,
}

impl DataFileLifecycle {
    pub fn new(records: Arc<dyn DataFileStore>, storage: Arc<dyn Storage>, cache: CacheManager) -> Self {
        Self {
            records,
            storage,
            cache,
        }
    }

    pub async fn get(&self, id: Uuid) -> Result<DataFile, AppError> {
        self.records
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("File {} not found", id)))
    }

    /// Delete the stored bytes, the cache directory and the row.
    ///
    /// Bytes or cache that are already gone are fine. Failing to remove
    /// either is logged and does not keep the row alive.
    #[tracing::instrument(skip(self, record), fields(record_id = %record.id, key = %record.file_path))]
    pub async fn delete(&self, record: &DataFile) -> Result<DeleteReport, AppError> {
        let mut report = DeleteReport::default();

        match self.storage.delete(&record.file_path).await {
            Ok(()) => report.bytes_deleted = true,
            Err(e) => tracing::error!(error = %e, "Failed to delete stored bytes"),
        }

        let cache = self.cache.clone();
        let (owner_id, record_id) = (record.owner_id, record.id);
        match tokio::task::spawn_blocking(move || cache.purge(owner_id, record_id)).await {
            Ok(Ok(())) => report.cache_purged = true,
            Ok(Err(e)) => tracing::error!(error = %e, "Failed to purge cache directory"),
            Err(e) => tracing::error!(error = %e, "Cache purge task failed"),
        }

        report.record_deleted = self.records.delete(record.id).await?;

        tracing::info!(
            bytes_deleted = report.bytes_deleted,
            cache_purged = report.cache_purged,
            record_deleted = report.record_deleted,
            "File deleted"
        );
        Ok(report)
    }

    /// Re-parse the original and overwrite every cache artifact of the record
    #[tracing::instrument(skip(self, record), fields(record_id = %record.id))]
    pub async fn refresh_cache(&self, record: &DataFile) -> Result<SheetFillReport, AppError> {
        let bytes = self
            .storage
            .open(&record.file_path)
            .await
            .map_err(|e| storage_error(&record.file_path, e))?;

        let cache = self.cache.clone();
        let target = record.clone();
        let report =
            run_blocking(move || Ok(cache_original(&cache, &target, bytes, FillMode::Overwrite)?))
                .await?;

        tracing::info!(
            written = report.written.len(),
            empty = report.empty.len(),
            failed = report.failed.len(),
            "Cache refreshed"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use datadock_core::{CacheSettings, NewDataFile};
    use datadock_db::InMemoryDataFileStore;
    use datadock_storage::{owner_key, LocalStorage};
    use datadock_tabular::CacheKey;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        records: InMemoryDataFileStore,
        storage: Arc<LocalStorage>,
        cache: CacheManager,
        lifecycle: DataFileLifecycle,
    }

    async fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let records = InMemoryDataFileStore::new();
        let storage = Arc::new(LocalStorage::new(dir.path().join("media")).await.unwrap());
        let cache = CacheManager::detect(CacheSettings::with_root(dir.path().join("cache")));
        Fixture {
            lifecycle: DataFileLifecycle::new(
                Arc::new(records.clone()),
                storage.clone(),
                cache.clone(),
            ),
            records,
            storage,
            cache,
            _dir: dir,
        }
    }

    impl Fixture {
        async fn stored_csv(&self) -> DataFile {
            let owner = Uuid::new_v4();
            let key = self
                .storage
                .save(&owner_key(owner, "bob_report.csv"), b"a;b\n1;x\n2;y\n".to_vec())
                .await
                .unwrap();
            self.records
                .create(NewDataFile {
                    owner_id: owner,
                    title: "bob_report".to_string(),
                    file_path: key,
                })
                .await
                .unwrap()
        }
    }

    #[tokio::test]
    async fn test_refresh_then_delete_cascades() {
        let f = fixture().await;
        let record = f.stored_csv().await;

        let report = f.lifecycle.refresh_cache(&record).await.unwrap();
        assert_eq!(report.written, vec!["data"]);
        assert!(f.cache.exists(&CacheKey::for_record(&record, None)));

        let deleted = f.lifecycle.delete(&record).await.unwrap();
        assert_eq!(
            deleted,
            DeleteReport {
                bytes_deleted: true,
                cache_purged: true,
                record_deleted: true,
            }
        );
        assert!(!f.storage.exists(&record.file_path).await.unwrap());
        assert!(!f.cache.record_dir(record.owner_id, record.id).exists());
        assert!(matches!(
            f.lifecycle.get(record.id).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_without_cache_succeeds() {
        let f = fixture().await;
        let record = f.stored_csv().await;

        let deleted = f.lifecycle.delete(&record).await.unwrap();
        assert!(deleted.cache_purged);
        assert!(deleted.record_deleted);
    }

    #[tokio::test]
    async fn test_refresh_overwrites_existing_artifact() {
        let f = fixture().await;
        let record = f.stored_csv().await;

        f.lifecycle.refresh_cache(&record).await.unwrap();
        let again = f.lifecycle.refresh_cache(&record).await.unwrap();

        assert_eq!(again.written, vec!["data"]);
        assert!(again.already_cached.is_empty());
    }

    #[tokio::test]
    async fn test_refresh_missing_bytes_is_not_found() {
        let f = fixture().await;
        let record = f.stored_csv().await;
        f.storage.delete(&record.file_path).await.unwrap();

        let result = f.lifecycle.refresh_cache(&record).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }
}
