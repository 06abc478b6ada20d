//! Analysis query façade
//!
//! Resolves the table behind a record for interactive analysis. Parquet
//! originals are read as they are. Everything else is served from the
//! columnar cache when possible and parsed from the original bytes on a
//! miss, filling the cache on the way out.
//!
//! Two requests missing the same (record, sheet) at once both parse and
//! write. The writes are content-identical and each one replaces the file
//! atomically, so the last writer wins.

use crate::blocking::{run_blocking, storage_error};
use arrow::record_batch::RecordBatch;
use datadock_core::{AppError, DataFile, FileKind};
use datadock_storage::Storage;
use datadock_tabular::{encode_ipc_stream, load_normalized, sheet_names, CacheKey, CacheManager};
use serde::Serialize;
use std::sync::Arc;

/// What the caller asked for
#[derive(Debug, Clone, Default)]
pub struct AnalysisRequest {
    /// Workbook sheet; unknown names fall back to the first sheet
    pub sheet: Option<String>,
    /// Skip the cache and re-parse the original
    pub refresh: bool,
}

/// Where a result came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableSource {
    /// Parquet original, read directly
    Native,
    Cache,
    /// Parsed from the original bytes
    Parsed,
}

#[derive(Debug, Clone)]
pub struct AnalysisResult {
    pub batch: RecordBatch,
    pub sheet: Option<String>,
    pub source: TableSource,
}

impl AnalysisResult {
    pub fn is_empty(&self) -> bool {
        self.batch.num_rows() == 0 || self.batch.num_columns() == 0
    }

    /// Arrow IPC stream bytes of the result
    pub fn to_arrow_stream(&self) -> Result<Vec<u8>, AppError> {
        Ok(encode_ipc_stream(&self.batch)?)
    }
}

/// Sheet selector data for the analysis page
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SheetOverview {
    pub sheet_names: Vec<String>,
    pub selected_sheet: Option<String>,
}

impl SheetOverview {
    /// Apply the sheet-validity fallback to `requested`
    pub fn resolve(sheet_names: Vec<String>, requested: Option<&str>) -> Self {
        let selected_sheet = match requested {
            Some(name) if sheet_names.iter().any(|s| s == name) => Some(name.to_string()),
            _ => sheet_names.first().cloned(),
        };
        Self {
            sheet_names,
            selected_sheet,
        }
    }
}

#[derive(Clone)]
pub struct AnalysisService {
    storage: Arc<dyn Storage>,
    cache: CacheManager,
}

impl AnalysisService {
    pub fn new(storage: Arc<dyn Storage>, cache: CacheManager) -> Self {
        Self { storage, cache }
    }

    pub fn cache(&self) -> &CacheManager {
        &self.cache
    }

    fn analyzable_kind(record: &DataFile) -> Result<FileKind, AppError> {
        record.kind().ok_or_else(|| {
            AppError::InvalidInput(format!(
                "File type '{}' cannot be analyzed online",
                record.extension()
            ))
        })
    }

    async fn load_original(&self, record: &DataFile) -> Result<Vec<u8>, AppError> {
        self.storage
            .open(&record.file_path)
            .await
            .map_err(|e| storage_error(&record.file_path, e))
    }

    /// Sheet names of a workbook record; empty for single-table formats.
    #[tracing::instrument(skip(self, record), fields(record_id = %record.id))]
    pub async fn sheet_names(&self, record: &DataFile) -> Result<Vec<String>, AppError> {
        let kind = Self::analyzable_kind(record)?;
        if !kind.is_workbook() {
            return Ok(Vec::new());
        }
        let bytes = self.load_original(record).await?;
        run_blocking(move || Ok(sheet_names(kind, bytes)?)).await
    }

    /// Sheet names plus the sheet the page should open with
    pub async fn sheet_overview(
        &self,
        record: &DataFile,
        requested: Option<&str>,
    ) -> Result<SheetOverview, AppError> {
        self.cache.require_backend()?;
        let names = self.sheet_names(record).await?;
        Ok(SheetOverview::resolve(names, requested))
    }

    #[tracing::instrument(skip(self, record, request), fields(record_id = %record.id, sheet = ?request.sheet, refresh = request.refresh))]
    pub async fn analyze(
        &self,
        record: &DataFile,
        request: &AnalysisRequest,
    ) -> Result<AnalysisResult, AppError> {
        let kind = Self::analyzable_kind(record)?;
        self.cache.require_backend()?;

        if kind.is_columnar() {
            let bytes = self.load_original(record).await?;
            let loaded = run_blocking(move || Ok(load_normalized(kind, bytes, None)?)).await?;
            return Ok(AnalysisResult {
                batch: loaded.batch,
                sheet: None,
                source: TableSource::Native,
            });
        }

        // Workbooks cache per sheet, so a missing selector is resolved first.
        let mut original = None;
        let mut sheet = if kind.is_workbook() {
            request.sheet.clone()
        } else {
            None
        };
        if kind.is_workbook() && sheet.is_none() {
            let bytes = self.load_original(record).await?;
            let probe = bytes.clone();
            let names = run_blocking(move || Ok(sheet_names(kind, probe)?)).await?;
            sheet = names.into_iter().next();
            original = Some(bytes);
        }

        if !request.refresh {
            let key = CacheKey::for_record(record, sheet.as_deref());
            let cache = self.cache.clone();
            if let Some(batch) = run_blocking(move || Ok(cache.read(&key)?)).await? {
                tracing::debug!("Serving table from cache");
                return Ok(AnalysisResult {
                    batch,
                    sheet,
                    source: TableSource::Cache,
                });
            }
        }

        let bytes = match original {
            Some(bytes) => bytes,
            None => self.load_original(record).await?,
        };
        let requested = sheet.clone();
        let loaded =
            run_blocking(move || Ok(load_normalized(kind, bytes, requested.as_deref())?)).await?;

        if loaded.is_empty() {
            tracing::info!("Parsed table is empty, nothing cached");
            return Ok(AnalysisResult {
                batch: loaded.batch,
                sheet: loaded.sheet,
                source: TableSource::Parsed,
            });
        }

        let key = CacheKey::for_record(record, loaded.sheet.as_deref());
        let cache = self.cache.clone();
        let batch = loaded.batch.clone();
        match tokio::task::spawn_blocking(move || cache.write(&batch, &key)).await {
            Ok(Ok(path)) => tracing::debug!(path = %path.display(), "Cache filled"),
            Ok(Err(e)) => tracing::warn!(error = %e, "Cache write failed, serving without cache"),
            Err(e) => tracing::warn!(error = %e, "Cache write task failed"),
        }

        Ok(AnalysisResult {
            batch: loaded.batch,
            sheet: loaded.sheet,
            source: TableSource::Parsed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Float64Array, Int64Array};
    use arrow::datatypes::{DataType, Field, Schema};
    use chrono::Utc;
    use datadock_core::{CacheSettings, User};
    use datadock_storage::{owner_key, LocalStorage};
    use datadock_tabular::{CacheCapability, DEFAULT_SHEET};
    use parquet::arrow::ArrowWriter;
    use tempfile::TempDir;
    use uuid::Uuid;

    const CSV: &str = "Artikel,Preis,Menge\nKaffee,\"3,50\",2\nTee,\"2,10\",5\n";

    struct Fixture {
        _dir: TempDir,
        storage: Arc<LocalStorage>,
        service: AnalysisService,
        owner: User,
    }

    async fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let storage = Arc::new(LocalStorage::new(dir.path().join("media")).await.unwrap());
        let cache = CacheManager::detect(CacheSettings::with_root(dir.path().join("cache")));
        Fixture {
            service: AnalysisService::new(storage.clone(), cache),
            storage,
            owner: User::new("alice"),
            _dir: dir,
        }
    }

    impl Fixture {
        async fn upload(&self, filename: &str, bytes: Vec<u8>) -> DataFile {
            let key = self
                .storage
                .save(&owner_key(self.owner.id, filename), bytes)
                .await
                .unwrap();
            DataFile {
                id: Uuid::new_v4(),
                owner_id: self.owner.id,
                title: filename.to_string(),
                file_path: key,
                uploaded_at: Utc::now(),
            }
        }
    }

    fn prices(result: &AnalysisResult) -> Vec<f64> {
        result
            .batch
            .column(1)
            .as_any()
            .downcast_ref::<Float64Array>()
            .unwrap()
            .values()
            .to_vec()
    }

    #[tokio::test]
    async fn test_miss_parses_and_fills_cache() {
        let f = fixture().await;
        let record = f.upload("alice_prices.csv", CSV.as_bytes().to_vec()).await;

        let first = f.service.analyze(&record, &AnalysisRequest::default()).await.unwrap();
        assert_eq!(first.source, TableSource::Parsed);
        assert_eq!(prices(&first), vec![3.5, 2.1]);
        assert!(f
            .service
            .cache()
            .exists(&CacheKey::for_record(&record, Some(DEFAULT_SHEET))));

        let second = f.service.analyze(&record, &AnalysisRequest::default()).await.unwrap();
        assert_eq!(second.source, TableSource::Cache);
        assert_eq!(second.batch.schema().fields(), first.batch.schema().fields());
        assert_eq!(prices(&second), vec![3.5, 2.1]);
    }

    #[tokio::test]
    async fn test_refresh_bypasses_cache() {
        let f = fixture().await;
        let record = f.upload("alice_prices.csv", CSV.as_bytes().to_vec()).await;
        f.service.analyze(&record, &AnalysisRequest::default()).await.unwrap();

        let refreshed = f
            .service
            .analyze(
                &record,
                &AnalysisRequest {
                    sheet: None,
                    refresh: true,
                },
            )
            .await
            .unwrap();
        assert_eq!(refreshed.source, TableSource::Parsed);
    }

    #[tokio::test]
    async fn test_empty_table_is_not_cached() {
        let f = fixture().await;
        let record = f.upload("alice_blank.csv", b"a,b\n,\n".to_vec()).await;

        let result = f.service.analyze(&record, &AnalysisRequest::default()).await.unwrap();

        assert!(result.is_empty());
        assert!(!f
            .service
            .cache()
            .record_dir(record.owner_id, record.id)
            .exists());
    }

    #[tokio::test]
    async fn test_parquet_original_is_read_natively() {
        let f = fixture().await;
        let schema = Arc::new(Schema::new(vec![Field::new("n", DataType::Int64, false)]));
        let batch =
            RecordBatch::try_new(schema.clone(), vec![Arc::new(Int64Array::from(vec![1, 2, 3]))])
                .unwrap();
        let mut bytes = Vec::new();
        let mut writer = ArrowWriter::try_new(&mut bytes, schema, None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();
        let record = f.upload("alice_native.parquet", bytes).await;

        let result = f.service.analyze(&record, &AnalysisRequest::default()).await.unwrap();

        assert_eq!(result.source, TableSource::Native);
        assert_eq!(result.batch.num_rows(), 3);
        assert!(!f
            .service
            .cache()
            .record_dir(record.owner_id, record.id)
            .exists());
    }

    #[tokio::test]
    async fn test_missing_bytes_is_not_found() {
        let f = fixture().await;
        let record = DataFile {
            id: Uuid::new_v4(),
            owner_id: f.owner.id,
            title: "gone".to_string(),
            file_path: owner_key(f.owner.id, "gone.csv"),
            uploaded_at: Utc::now(),
        };

        let result = f.service.analyze(&record, &AnalysisRequest::default()).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_unanalyzable_extension_is_invalid_input() {
        let f = fixture().await;
        let record = f.upload("alice_notes.txt", b"hello".to_vec()).await;

        let result = f.service.analyze(&record, &AnalysisRequest::default()).await;
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
        assert!(f.service.sheet_names(&record).await.is_err());
    }

    #[tokio::test]
    async fn test_undetectable_csv_is_a_parse_error() {
        let f = fixture().await;
        let record = f.upload("alice_binary.csv", Vec::new()).await;

        let result = f.service.analyze(&record, &AnalysisRequest::default()).await;
        assert!(matches!(result, Err(AppError::Parse(_))));
    }

    #[tokio::test]
    async fn test_unavailable_backend_fails_analysis() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Arc::new(LocalStorage::new(dir.path().join("media")).await.unwrap());
        let cache = CacheManager::new(
            CacheSettings::with_root(dir.path().join("cache")),
            CacheCapability::Unavailable("zstd codec disabled".to_string()),
        );
        let service = AnalysisService::new(storage.clone(), cache);
        let owner = Uuid::new_v4();
        let key = storage
            .save(&owner_key(owner, "a.csv"), CSV.as_bytes().to_vec())
            .await
            .unwrap();
        let record = DataFile {
            id: Uuid::new_v4(),
            owner_id: owner,
            title: "a".to_string(),
            file_path: key,
            uploaded_at: Utc::now(),
        };

        let result = service.analyze(&record, &AnalysisRequest::default()).await;
        assert!(matches!(result, Err(AppError::CacheBackendUnavailable(_))));
    }

    #[tokio::test]
    async fn test_arrow_stream_encoding() {
        let f = fixture().await;
        let record = f.upload("alice_prices.csv", CSV.as_bytes().to_vec()).await;
        let result = f.service.analyze(&record, &AnalysisRequest::default()).await.unwrap();

        let bytes = result.to_arrow_stream().unwrap();
        assert!(!bytes.is_empty());
    }

    #[test]
    fn test_sheet_overview_fallback() {
        let names = vec!["Umsatz".to_string(), "Kosten".to_string()];

        let picked = SheetOverview::resolve(names.clone(), Some("Kosten"));
        assert_eq!(picked.selected_sheet.as_deref(), Some("Kosten"));

        let fallback = SheetOverview::resolve(names, Some("fehlt"));
        assert_eq!(fallback.selected_sheet.as_deref(), Some("Umsatz"));

        let none = SheetOverview::resolve(Vec::new(), Some("Umsatz"));
        assert_eq!(none.selected_sheet, None);
    }

    #[tokio::test]
    async fn test_single_table_formats_have_no_sheets() {
        let f = fixture().await;
        let record = f.upload("alice_prices.csv", CSV.as_bytes().to_vec()).await;

        let overview = f.service.sheet_overview(&record, Some("x")).await.unwrap();
        assert!(overview.sheet_names.is_empty());
        assert_eq!(overview.selected_sheet, None);
    }

    #[test]
    fn test_empty_result() {
        let result = AnalysisResult {
            batch: RecordBatch::new_empty(Arc::new(Schema::empty())),
            sheet: None,
            source: TableSource::Parsed,
        };
        assert!(result.is_empty());
    }
}
