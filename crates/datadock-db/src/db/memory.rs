//! In-memory repository implementations
//!
//! These mirror the Postgres repositories closely enough to drive ingestion,
//! analysis and HTTP tests without a database.

use crate::db::data_files::DataFileStore;
use crate::db::users::UserRegistry;
use async_trait::async_trait;
use chrono::Utc;
use datadock_core::{AppError, DataFile, NewDataFile, User};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// In-memory user registry
#[derive(Clone, Default)]
pub struct InMemoryUserRegistry {
    users: Arc<RwLock<Vec<User>>>,
}

impl InMemoryUserRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_users(users: impl IntoIterator<Item = User>) -> Self {
        Self {
            users: Arc::new(RwLock::new(users.into_iter().collect())),
        }
    }

    pub async fn insert(&self, user: User) {
        self.users.write().await.push(user);
    }
}

#[async_trait]
impl UserRegistry for InMemoryUserRegistry {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let wanted = username.to_lowercase();
        Ok(self
            .users
            .read()
            .await
            .iter()
            .find(|u| u.username.to_lowercase() == wanted)
            .cloned())
    }

    async fn get(&self, id: Uuid) -> Result<Option<User>, AppError> {
        Ok(self.users.read().await.iter().find(|u| u.id == id).cloned())
    }
}

/// In-memory record store
#[derive(Clone, Default)]
pub struct InMemoryDataFileStore {
    records: Arc<RwLock<HashMap<Uuid, DataFile>>>,
    fail_creates: Arc<AtomicBool>,
}

impl InMemoryDataFileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `create` fail with a persistence error
    pub fn set_fail_creates(&self, fail: bool) {
        self.fail_creates.store(fail, Ordering::SeqCst);
    }

    pub async fn insert(&self, record: DataFile) {
        self.records.write().await.insert(record.id, record);
    }

    pub async fn all(&self) -> Vec<DataFile> {
        self.records.read().await.values().cloned().collect()
    }
}

#[async_trait]
impl DataFileStore for InMemoryDataFileStore {
    async fn create(&self, new: NewDataFile) -> Result<DataFile, AppError> {
        if self.fail_creates.load(Ordering::SeqCst) {
            return Err(AppError::RecordPersistence(
                "record store rejected the insert".to_string(),
            ));
        }

        let record = DataFile {
            id: Uuid::new_v4(),
            owner_id: new.owner_id,
            title: new.title,
            file_path: new.file_path,
            uploaded_at: Utc::now(),
        };
        self.records.write().await.insert(record.id, record.clone());
        Ok(record)
    }

    async fn exists_for_owner(&self, owner_id: Uuid, title: &str) -> Result<bool, AppError> {
        Ok(self
            .records
            .read()
            .await
            .values()
            .any(|r| r.owner_id == owner_id && r.title == title))
    }

    async fn get(&self, id: Uuid) -> Result<Option<DataFile>, AppError> {
        Ok(self.records.read().await.get(&id).cloned())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        Ok(self.records.write().await.remove(&id).is_some())
    }
}
