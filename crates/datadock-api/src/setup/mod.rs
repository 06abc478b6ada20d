//! Application setup and initialization

pub mod routes;
pub mod server;

use crate::state::AppState;
use anyhow::{Context, Result};
use datadock_core::Config;
use datadock_db::{PostgresDataFileRepository, PostgresUserRepository};
use datadock_services::{create_storage, CacheManager};
use std::sync::Arc;

/// Initialize telemetry, the database, storage and the cache backend, then
/// build the router.
pub async fn initialize_app(config: Config) -> Result<(Arc<AppState>, axum::Router)> {
    datadock_infra::init_telemetry(config.environment())
        .map_err(|e| anyhow::anyhow!("Failed to initialize telemetry: {}", e))?;

    tracing::info!("Configuration loaded and validated successfully");

    let pool = datadock_db::setup_database(&config).await?;
    let storage = create_storage(&config)
        .await
        .context("Failed to initialize storage")?;

    let cache = CacheManager::detect(config.cache_settings().clone());
    if !cache.capability().is_available() {
        tracing::warn!("Analysis is disabled until the cache backend is available");
    }

    let state = Arc::new(AppState::new(
        Arc::new(PostgresUserRepository::new(pool.clone())),
        Arc::new(PostgresDataFileRepository::new(pool)),
        storage,
        cache,
    ));

    let router = routes::router(state.clone());
    Ok((state, router))
}
