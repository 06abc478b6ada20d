//! Tabular ingestion core
//!
//! Raw bytes of a CSV, Excel, pickle or Parquet file go through the
//! [`reader`] (structure and encoding recovery), the [`normalize`] pass
//! (column names, blank elision, type inference) and end up as an Arrow
//! [`RecordBatch`](arrow::record_batch::RecordBatch) that the
//! [`cache::CacheManager`] persists as a Parquet sidecar.

pub mod cache;
pub mod error;
pub mod ipc;
pub mod load;
pub mod normalize;
pub mod reader;
pub mod table;

pub use cache::{
    slugify_sheet, CacheCapability, CacheFill, CacheKey, CacheManager, FillMode, SheetFillReport,
    DEFAULT_SHEET,
};
pub use error::{CacheError, TableError};
pub use ipc::{encode_ipc_stream, ARROW_STREAM_CONTENT_TYPE};
pub use load::{cache_original, load_normalized, sheet_names, LoadedTable};
pub use normalize::{normalize, sanitize_column_names, to_record_batch};
pub use table::{Column, ColumnData, Table};
