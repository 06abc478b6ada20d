//! Columnar cache manager
//!
//! Normalized tables are persisted as Parquet files, one per
//! `(owner, record, sheet)` under
//! `{root}/user_{owner_id}/{record_id}/{sheet_slug}.parquet`.
//!
//! Writes go to a temporary file in the target directory and are renamed
//! into place, so readers never observe a partial file. Two concurrent
//! writers for the same key both succeed; the last rename wins.

use crate::error::{CacheError, TableError};
use arrow::array::Int64Array;
use arrow::compute::concat_batches;
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use datadock_core::{CacheCompression, CacheSettings, DataFile};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, GzipLevel, ZstdLevel};
use parquet::file::properties::WriterProperties;
use std::fs::{self, File};
use std::io::{Cursor, ErrorKind};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

/// Sheet name used for single-table formats
pub const DEFAULT_SHEET: &str = "data";

const CACHE_EXTENSION: &str = "parquet";
const MAX_SLUG_CHARS: usize = 128;

/// Filesystem-safe form of a sheet name: trimmed, runs of anything but
/// word characters and `-` replaced by `_`, at most 128 characters;
/// `sheet` when nothing is left.
pub fn slugify_sheet(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut in_run = false;
    for c in name.trim().chars() {
        if c.is_alphanumeric() || c == '_' || c == '-' {
            slug.push(c);
            in_run = false;
        } else if !in_run {
            slug.push('_');
            in_run = true;
        }
    }

    let slug: String = slug.chars().take(MAX_SLUG_CHARS).collect();
    if slug.is_empty() {
        "sheet".to_string()
    } else {
        slug
    }
}

/// Identity of one cached artifact
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub owner_id: Uuid,
    pub record_id: Uuid,
    pub sheet: String,
}

impl CacheKey {
    /// A missing sheet name means [`DEFAULT_SHEET`].
    pub fn new(owner_id: Uuid, record_id: Uuid, sheet: Option<&str>) -> Self {
        Self {
            owner_id,
            record_id,
            sheet: sheet.unwrap_or(DEFAULT_SHEET).to_string(),
        }
    }

    pub fn for_record(record: &DataFile, sheet: Option<&str>) -> Self {
        Self::new(record.owner_id, record.id, sheet)
    }
}

/// Whether the Parquet backend can encode and decode with the configured
/// settings. Detected once at startup; an unavailable backend makes every
/// cache read or write fail with [`CacheError::BackendUnavailable`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheCapability {
    Available,
    Unavailable(String),
}

impl CacheCapability {
    /// Round-trip a one-row batch through the configured writer settings
    pub fn detect(settings: &CacheSettings) -> Self {
        match probe(settings) {
            Ok(()) => CacheCapability::Available,
            Err(e) => {
                tracing::error!(error = %e, "Columnar cache backend unavailable");
                CacheCapability::Unavailable(e.to_string())
            }
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, CacheCapability::Available)
    }
}

fn probe(settings: &CacheSettings) -> Result<(), CacheError> {
    let schema = Arc::new(Schema::new(vec![Field::new("probe", DataType::Int64, false)]));
    let batch = RecordBatch::try_new(schema.clone(), vec![Arc::new(Int64Array::from(vec![1]))])?;

    let mut buffer = Cursor::new(Vec::new());
    let mut writer = ArrowWriter::try_new(&mut buffer, schema, Some(writer_properties(settings)?))?;
    writer.write(&batch)?;
    writer.close()?;

    let bytes = bytes::Bytes::from(buffer.into_inner());
    let rows: usize = ParquetRecordBatchReaderBuilder::try_new(bytes)?
        .build()?
        .map(|b| b.map(|b| b.num_rows()))
        .sum::<Result<usize, _>>()?;

    if rows == 1 {
        Ok(())
    } else {
        Err(CacheError::BackendUnavailable(format!(
            "probe read back {} rows",
            rows
        )))
    }
}

fn writer_properties(settings: &CacheSettings) -> Result<WriterProperties, CacheError> {
    let compression = match settings.compression {
        CacheCompression::Zstd => Compression::ZSTD(ZstdLevel::try_new(settings.compression_level)?),
        CacheCompression::Gzip => {
            let level = u32::try_from(settings.compression_level).map_err(|_| {
                CacheError::BackendUnavailable(format!(
                    "invalid gzip level {}",
                    settings.compression_level
                ))
            })?;
            Compression::GZIP(GzipLevel::try_new(level)?)
        }
        CacheCompression::Snappy => Compression::SNAPPY,
        CacheCompression::Uncompressed => Compression::UNCOMPRESSED,
    };

    Ok(WriterProperties::builder()
        .set_compression(compression)
        .set_dictionary_enabled(settings.use_dictionary)
        .build())
}

/// Outcome of an idempotent write
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheFill {
    Written(PathBuf),
    AlreadyCached(PathBuf),
}

/// Whether existing artifacts are kept or replaced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillMode {
    IfMissing,
    Overwrite,
}

/// Per-sheet outcome of a multi-sheet fill
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SheetFillReport {
    pub written: Vec<String>,
    pub already_cached: Vec<String>,
    /// Sheets that normalized to an empty table; nothing is written for them.
    pub empty: Vec<String>,
    pub failed: Vec<String>,
}

/// Reads and writes normalized tables as Parquet files
#[derive(Debug, Clone)]
pub struct CacheManager {
    settings: Arc<CacheSettings>,
    capability: CacheCapability,
}

impl CacheManager {
    pub fn new(settings: CacheSettings, capability: CacheCapability) -> Self {
        Self {
            settings: Arc::new(settings),
            capability,
        }
    }

    /// Probe the backend and build the manager
    pub fn detect(settings: CacheSettings) -> Self {
        let capability = CacheCapability::detect(&settings);
        Self::new(settings, capability)
    }

    pub fn root(&self) -> &Path {
        &self.settings.root
    }

    pub fn capability(&self) -> &CacheCapability {
        &self.capability
    }

    pub fn record_dir(&self, owner_id: Uuid, record_id: Uuid) -> PathBuf {
        self.settings
            .root
            .join(format!("user_{}", owner_id))
            .join(record_id.to_string())
    }

    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.record_dir(key.owner_id, key.record_id)
            .join(format!("{}.{}", slugify_sheet(&key.sheet), CACHE_EXTENSION))
    }

    pub fn exists(&self, key: &CacheKey) -> bool {
        self.path_for(key).is_file()
    }

    /// Fail with [`CacheError::BackendUnavailable`] when the probe failed at startup
    pub fn require_backend(&self) -> Result<(), CacheError> {
        match &self.capability {
            CacheCapability::Available => Ok(()),
            CacheCapability::Unavailable(reason) => {
                Err(CacheError::BackendUnavailable(reason.clone()))
            }
        }
    }

    /// Write (or replace) the artifact for `key`
    #[tracing::instrument(skip(self, batch), fields(cache.sheet = %key.sheet, cache.rows = batch.num_rows()))]
    pub fn write(&self, batch: &RecordBatch, key: &CacheKey) -> Result<PathBuf, CacheError> {
        self.require_backend()?;
        let path = self.path_for(key);
        let dir = self.record_dir(key.owner_id, key.record_id);
        fs::create_dir_all(&dir)?;

        let mut temp = tempfile::Builder::new()
            .prefix(".")
            .suffix(".tmp")
            .tempfile_in(&dir)?;
        {
            let mut writer = ArrowWriter::try_new(
                temp.as_file_mut(),
                batch.schema(),
                Some(writer_properties(&self.settings)?),
            )?;
            writer.write(batch)?;
            writer.close()?;
        }
        temp.persist(&path).map_err(|e| CacheError::Io(e.error))?;

        tracing::debug!(path = %path.display(), "Cache artifact written");
        Ok(path)
    }

    /// Write only when no artifact exists yet
    pub fn ensure(&self, batch: &RecordBatch, key: &CacheKey) -> Result<CacheFill, CacheError> {
        self.require_backend()?;
        let path = self.path_for(key);
        if path.is_file() {
            return Ok(CacheFill::AlreadyCached(path));
        }
        self.write(batch, key).map(CacheFill::Written)
    }

    /// Read the artifact for `key`; `Ok(None)` on a miss.
    pub fn read(&self, key: &CacheKey) -> Result<Option<RecordBatch>, CacheError> {
        self.require_backend()?;
        let path = self.path_for(key);
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
        let schema = builder.schema().clone();
        let batches = builder.build()?.collect::<Result<Vec<_>, _>>()?;
        Ok(Some(concat_batches(&schema, &batches)?))
    }

    /// Fill the artifacts of several sheets of one record.
    ///
    /// `build` produces the normalized batch of a sheet. A sheet whose build
    /// or write fails is logged and skipped; the others are still filled.
    pub fn fill_sheets<F>(
        &self,
        owner_id: Uuid,
        record_id: Uuid,
        sheets: &[String],
        mode: FillMode,
        mut build: F,
    ) -> Result<SheetFillReport, CacheError>
    where
        F: FnMut(&str) -> Result<RecordBatch, TableError>,
    {
        self.require_backend()?;
        let mut report = SheetFillReport::default();

        for sheet in sheets {
            let key = CacheKey::new(owner_id, record_id, Some(sheet));
            if mode == FillMode::IfMissing && self.exists(&key) {
                report.already_cached.push(sheet.clone());
                continue;
            }

            let batch = match build(sheet) {
                Ok(batch) => batch,
                Err(e) => {
                    tracing::warn!(sheet = %sheet, error = %e, "Skipping sheet that failed to convert");
                    report.failed.push(sheet.clone());
                    continue;
                }
            };
            if batch.num_rows() == 0 || batch.num_columns() == 0 {
                report.empty.push(sheet.clone());
                continue;
            }

            match self.write(&batch, &key) {
                Ok(_) => report.written.push(sheet.clone()),
                Err(e) => {
                    tracing::warn!(sheet = %sheet, error = %e, "Failed to cache sheet");
                    report.failed.push(sheet.clone());
                }
            }
        }

        Ok(report)
    }

    /// Remove every artifact of a record. A missing directory is fine.
    pub fn purge(&self, owner_id: Uuid, record_id: Uuid) -> Result<(), CacheError> {
        let dir = self.record_dir(owner_id, record_id);
        match fs::remove_dir_all(&dir) {
            Ok(()) => {
                tracing::debug!(path = %dir.display(), "Cache directory purged");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
