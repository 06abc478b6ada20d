//! Reader and normalizer pipelines shared by ingestion, analysis and cache
//! maintenance. Everything here is blocking; async callers run it on the
//! blocking pool.

use crate::cache::{CacheFill, CacheKey, CacheManager, FillMode, SheetFillReport};
use crate::error::{CacheError, TableError};
use crate::normalize::{normalize, to_record_batch};
use crate::reader::{read_csv, read_parquet, read_pickle, Workbook};
use crate::table::Table;
use arrow::datatypes::Schema;
use arrow::record_batch::RecordBatch;
use datadock_core::{DataFile, FileKind};
use std::sync::Arc;

/// A normalized table and the sheet it came from
#[derive(Debug, Clone)]
pub struct LoadedTable {
    pub batch: RecordBatch,
    /// Resolved sheet for workbooks, `None` for single-table formats
    pub sheet: Option<String>,
}

impl LoadedTable {
    pub fn is_empty(&self) -> bool {
        self.batch.num_rows() == 0 || self.batch.num_columns() == 0
    }
}

fn empty_batch() -> RecordBatch {
    RecordBatch::new_empty(Arc::new(Schema::empty()))
}

fn normalized_batch(table: Table) -> Result<RecordBatch, TableError> {
    let table = normalize(table);
    if table.is_empty() {
        return Ok(empty_batch());
    }
    to_record_batch(&table)
}

/// Parse and normalize a file.
///
/// For workbooks the requested sheet is used when it exists, otherwise the
/// first sheet; a workbook without sheets yields an empty table. Parquet
/// files are read as they are.
pub fn load_normalized(
    kind: FileKind,
    bytes: Vec<u8>,
    sheet: Option<&str>,
) -> Result<LoadedTable, TableError> {
    match kind {
        FileKind::Csv => Ok(LoadedTable {
            batch: normalized_batch(read_csv(&bytes)?)?,
            sheet: None,
        }),
        FileKind::Pickle => Ok(LoadedTable {
            batch: normalized_batch(read_pickle(&bytes)?)?,
            sheet: None,
        }),
        FileKind::Parquet => Ok(LoadedTable {
            batch: read_parquet(bytes)?,
            sheet: None,
        }),
        FileKind::Excel => {
            let mut workbook = Workbook::open(bytes)?;
            let Some(resolved) = workbook.resolve_sheet(sheet) else {
                return Ok(LoadedTable {
                    batch: empty_batch(),
                    sheet: None,
                });
            };
            let batch = normalized_batch(workbook.read_sheet(&resolved)?)?;
            Ok(LoadedTable {
                batch,
                sheet: Some(resolved),
            })
        }
    }
}

/// Sheet names of a workbook; single-table formats have none.
pub fn sheet_names(kind: FileKind, bytes: Vec<u8>) -> Result<Vec<String>, TableError> {
    match kind {
        FileKind::Excel => Ok(Workbook::open(bytes)?.sheet_names()),
        _ => Ok(Vec::new()),
    }
}

/// Build the cache artifacts of a record from its original bytes.
///
/// Workbooks get one artifact per sheet, other formats one artifact under
/// the default sheet name. Parquet originals are served natively and get
/// none. With [`FillMode::IfMissing`] existing artifacts are kept.
pub fn cache_original(
    cache: &CacheManager,
    record: &DataFile,
    bytes: Vec<u8>,
    mode: FillMode,
) -> Result<SheetFillReport, CacheError> {
    let kind = record.kind().ok_or_else(|| {
        TableError::UnsupportedFormat(format!("unsupported extension '{}'", record.extension()))
    })?;

    match kind {
        FileKind::Parquet => Ok(SheetFillReport::default()),
        FileKind::Excel => {
            let mut workbook = Workbook::open(bytes)?;
            let sheets = workbook.sheet_names();
            cache.fill_sheets(record.owner_id, record.id, &sheets, mode, |sheet| {
                normalized_batch(workbook.read_sheet(sheet)?)
            })
        }
        FileKind::Csv | FileKind::Pickle => {
            let key = CacheKey::for_record(record, None);
            let mut report = SheetFillReport::default();
            if mode == FillMode::IfMissing && cache.exists(&key) {
                report.already_cached.push(key.sheet);
                return Ok(report);
            }

            let batch = load_normalized(kind, bytes, None)?.batch;
            if batch.num_rows() == 0 || batch.num_columns() == 0 {
                report.empty.push(key.sheet);
                return Ok(report);
            }

            let fill = match mode {
                FillMode::IfMissing => cache.ensure(&batch, &key)?,
                FillMode::Overwrite => CacheFill::Written(cache.write(&batch, &key)?),
            };
            match fill {
                CacheFill::Written(_) => report.written.push(key.sheet),
                CacheFill::AlreadyCached(_) => report.already_cached.push(key.sheet),
            }
            Ok(report)
        }
    }
}
