//! Repository implementations for SQLite storage

pub mod attempt;
pub mod lock;
pub mod password;
pub mod user;

pub use attempt::SqliteLoginAttemptRepository;
pub use lock::SqliteAccountLockRepository;
pub use password::SqlitePasswordRepository;
pub use user::SqliteUserRepository;

use async_trait::async_trait;
use bastion_core::{
    Error,
    error::StorageError,
    repositories::{
        AccountLockRepositoryProvider, LoginAttemptRepositoryProvider,
        PasswordRepositoryProvider, RepositoryProvider, UserRepositoryProvider,
    },
};
use bastion_migration::MigrationManager;
use sqlx::SqlitePool;
use std::sync::Arc;

use crate::migrations::{self, SqliteMigrationManager};

/// Log a query failure and replace it with a generic storage error.
pub(crate) fn db_error(context: &'static str) -> impl FnOnce(sqlx::Error) -> Error {
    move |e| {
        tracing::error!(error = %e, "{context}");
        StorageError::Database(context.to_string()).into()
    }
}

/// Repository provider implementation for SQLite
///
/// This struct implements all the individual repository provider traits
/// as well as the unified `RepositoryProvider` trait.
pub struct SqliteRepositoryProvider {
    pool: SqlitePool,
    user: Arc<SqliteUserRepository>,
    password: Arc<SqlitePasswordRepository>,
    attempts: Arc<SqliteLoginAttemptRepository>,
    locks: Arc<SqliteAccountLockRepository>,
}

impl SqliteRepositoryProvider {
    pub fn new(pool: SqlitePool) -> Self {
        let user = Arc::new(SqliteUserRepository::new(pool.clone()));
        let password = Arc::new(SqlitePasswordRepository::new(pool.clone()));
        let attempts = Arc::new(SqliteLoginAttemptRepository::new(pool.clone()));
        let locks = Arc::new(SqliteAccountLockRepository::new(pool.clone()));

        Self {
            pool,
            user,
            password,
            attempts,
            locks,
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl UserRepositoryProvider for SqliteRepositoryProvider {
    type UserRepo = SqliteUserRepository;

    fn user(&self) -> &Self::UserRepo {
        &self.user
    }
}

impl PasswordRepositoryProvider for SqliteRepositoryProvider {
    type PasswordRepo = SqlitePasswordRepository;

    fn password(&self) -> &Self::PasswordRepo {
        &self.password
    }
}

impl LoginAttemptRepositoryProvider for SqliteRepositoryProvider {
    type AttemptRepo = SqliteLoginAttemptRepository;

    fn attempts(&self) -> &Self::AttemptRepo {
        &self.attempts
    }
}

impl AccountLockRepositoryProvider for SqliteRepositoryProvider {
    type LockRepo = SqliteAccountLockRepository;

    fn locks(&self) -> &Self::LockRepo {
        &self.locks
    }
}

#[async_trait]
impl RepositoryProvider for SqliteRepositoryProvider {
    async fn migrate(&self) -> Result<(), Error> {
        let manager = SqliteMigrationManager::new(self.pool.clone());
        manager.initialize().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to initialize migrations");
            StorageError::Migration("Failed to initialize migrations".to_string())
        })?;

        manager.up(&migrations::all()).await.map_err(|e| {
            tracing::error!(error = %e, "Failed to run migrations");
            StorageError::Migration("Failed to run migrations".to_string())
        })?;

        Ok(())
    }

    async fn health_check(&self) -> Result<(), Error> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Database(e.to_string()))?;
        Ok(())
    }
}
