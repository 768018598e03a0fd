//! SQLite storage backend
//!
//! Implements every repository trait from `bastion_core::repositories` on top of a single
//! [`SqlitePool`]. Timestamps are stored as unix seconds.
//!
//! ```rust,no_run
//! use bastion_core::RepositoryProvider;
//! use bastion_storage_sqlite::{SqliteRepositoryProvider, connect};
//!
//! # async fn example() -> Result<(), bastion_core::Error> {
//! let pool = connect("sqlite://bastion.db?mode=rwc").await?;
//! let repositories = SqliteRepositoryProvider::new(pool);
//! repositories.migrate().await?;
//! # Ok(())
//! # }
//! ```

pub mod migrations;
pub mod repositories;

use bastion_core::{Error, error::StorageError};
use chrono::{DateTime, Utc};
pub use repositories::SqliteRepositoryProvider;
use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};

/// Open a connection pool for `database_url`.
pub async fn connect(database_url: &str) -> Result<SqlitePool, Error> {
    SqlitePoolOptions::new()
        .connect(database_url)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to connect to database");
            StorageError::Connection("Failed to connect to database".to_string()).into()
        })
}

/// Decode a stored unix timestamp.
pub(crate) fn from_timestamp(ts: i64) -> Result<DateTime<Utc>, Error> {
    DateTime::from_timestamp(ts, 0)
        .ok_or_else(|| StorageError::Database(format!("Invalid timestamp: {ts}")).into())
}
