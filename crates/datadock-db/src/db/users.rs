use async_trait::async_trait;
use datadock_core::{AppError, User};
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

/// Read access to user accounts.
///
/// A missing user is `Ok(None)`, never an error.
#[async_trait]
pub trait UserRegistry: Send + Sync {
    /// Case-insensitive exact match on the username
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AppError>;

    async fn get(&self, id: Uuid) -> Result<Option<User>, AppError>;
}

/// Postgres-backed user registry
#[derive(Clone)]
pub struct PostgresUserRepository {
    pool: PgPool,
}

impl PostgresUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRegistry for PostgresUserRepository {
    #[tracing::instrument(skip(self), fields(db.table = "users", db.operation = "select"))]
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<Postgres, User>(
            "SELECT id, username, created_at FROM users WHERE LOWER(username) = LOWER($1) LIMIT 1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    #[tracing::instrument(skip(self), fields(db.table = "users", db.operation = "select", db.record_id = %id))]
    async fn get(&self, id: Uuid) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<Postgres, User>(
            "SELECT id, username, created_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }
}
