//! Datadock Services Layer
//!
//! Orchestration on top of storage, the record store and the tabular core:
//! the analysis façade used by the HTTP layer and the record lifecycle
//! (cascade delete, explicit cache refresh) used by the HTTP layer and the
//! CLI. Keep HTTP handling thin in datadock-api.

pub mod analysis;
pub mod lifecycle;

mod blocking;

pub use analysis::{AnalysisRequest, AnalysisResult, AnalysisService, SheetOverview, TableSource};
pub use datadock_storage::{create_storage, LocalStorage, Storage, StorageError};
pub use datadock_tabular::{CacheCapability, CacheManager, ARROW_STREAM_CONTENT_TYPE};
pub use lifecycle::{DataFileLifecycle, DeleteReport};
