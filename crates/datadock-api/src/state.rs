//! Application state shared by all handlers

use datadock_db::{DataFileStore, UserRegistry};
use datadock_services::{AnalysisService, DataFileLifecycle};
use datadock_storage::Storage;
use datadock_tabular::CacheManager;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserRegistry>,
    pub records: Arc<dyn DataFileStore>,
    pub storage: Arc<dyn Storage>,
    pub analysis: AnalysisService,
    pub lifecycle: DataFileLifecycle,
}

impl AppState {
    pub fn new(
        users: Arc<dyn UserRegistry>,
        records: Arc<dyn DataFileStore>,
        storage: Arc<dyn Storage>,
        cache: CacheManager,
    ) -> Self {
        Self {
            analysis: AnalysisService::new(storage.clone(), cache.clone()),
            lifecycle: DataFileLifecycle::new(records.clone(), storage.clone(), cache),
            users,
            records,
            storage,
        }
    }
}
