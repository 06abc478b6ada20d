use crate::db::transaction::TransactionGuard;
use async_trait::async_trait;
use datadock_core::{AppError, DataFile, NewDataFile};
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

/// Persistence of Stored File Records
#[async_trait]
pub trait DataFileStore: Send + Sync {
    /// Create a record atomically: either it exists with all fields afterwards or not at all.
    async fn create(&self, new: NewDataFile) -> Result<DataFile, AppError>;

    /// Duplicate check used by ingestion
    async fn exists_for_owner(&self, owner_id: Uuid, title: &str) -> Result<bool, AppError>;

    async fn get(&self, id: Uuid) -> Result<Option<DataFile>, AppError>;

    /// Delete the row; `false` when it did not exist.
    async fn delete(&self, id: Uuid) -> Result<bool, AppError>;
}

/// Postgres-backed record store
#[derive(Clone)]
pub struct PostgresDataFileRepository {
    pool: PgPool,
}

impl PostgresDataFileRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DataFileStore for PostgresDataFileRepository {
    #[tracing::instrument(skip(self, new), fields(db.table = "data_files", db.operation = "insert", owner_id = %new.owner_id))]
    async fn create(&self, new: NewDataFile) -> Result<DataFile, AppError> {
        let persistence = |e: anyhow::Error| AppError::RecordPersistence(format!("{:#}", e));

        let mut tx = TransactionGuard::begin(&self.pool)
            .await
            .map_err(persistence)?;

        let inserted = sqlx::query_as::<Postgres, DataFile>(
            r#"
            INSERT INTO data_files (owner_id, title, file_path)
            VALUES ($1, $2, $3)
            RETURNING id, owner_id, title, file_path, uploaded_at
            "#,
        )
        .bind(new.owner_id)
        .bind(&new.title)
        .bind(&new.file_path)
        .fetch_one(tx.conn().map_err(persistence)?)
        .await;

        match inserted {
            Ok(record) => {
                tx.commit().await.map_err(persistence)?;
                Ok(record)
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::warn!(error = %rollback_err, "Rollback after failed insert failed");
                }
                Err(AppError::RecordPersistence(e.to_string()))
            }
        }
    }

    #[tracing::instrument(skip(self), fields(db.table = "data_files", db.operation = "select"))]
    async fn exists_for_owner(&self, owner_id: Uuid, title: &str) -> Result<bool, AppError> {
        let exists = sqlx::query_scalar::<Postgres, bool>(
            "SELECT EXISTS(SELECT 1 FROM data_files WHERE owner_id = $1 AND title = $2)",
        )
        .bind(owner_id)
        .bind(title)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    #[tracing::instrument(skip(self), fields(db.table = "data_files", db.operation = "select", db.record_id = %id))]
    async fn get(&self, id: Uuid) -> Result<Option<DataFile>, AppError> {
        let record = sqlx::query_as::<Postgres, DataFile>(
            "SELECT id, owner_id, title, file_path, uploaded_at FROM data_files WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    #[tracing::instrument(skip(self), fields(db.table = "data_files", db.operation = "delete", db.record_id = %id))]
    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM data_files WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
