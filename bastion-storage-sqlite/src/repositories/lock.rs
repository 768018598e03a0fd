//! SQLite implementation of account lock storage.

use async_trait::async_trait;
use bastion_core::{
    AccountLock, Error, NewAccountLock, UserId, repositories::AccountLockRepository,
};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::{from_timestamp, repositories::db_error};

pub struct SqliteAccountLockRepository {
    pool: SqlitePool,
}

impl SqliteAccountLockRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn find_active(
        &self,
        column: &str,
        key: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<AccountLock>, Error> {
        sqlx::query_as::<_, SqliteAccountLock>(&format!(
            r#"
            SELECT {COLUMNS} FROM account_locks
            WHERE {column} = ? AND released_at IS NULL AND locked_until > ?
            ORDER BY locked_until DESC
            LIMIT 1
            "#
        ))
        .bind(key)
        .bind(now.timestamp())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("Failed to look up active lock"))?
        .map(AccountLock::try_from)
        .transpose()
    }

    async fn release_where(&self, column: &str, key: &str, now: DateTime<Utc>) -> Result<u64, Error> {
        // Expired rows are left for release_expired so they keep the expiry reason.
        let result = sqlx::query(&format!(
            "UPDATE account_locks SET released_at = ?1 \
             WHERE {column} = ?2 AND released_at IS NULL AND locked_until > ?1"
        ))
        .bind(now.timestamp())
        .bind(key)
        .execute(&self.pool)
        .await
        .map_err(db_error("Failed to release locks"))?;

        Ok(result.rows_affected())
    }
}

const COLUMNS: &str =
    "id, user_id, identifier_hash, locked_until, lock_reason, locked_by_ip, created_at, released_at";

#[derive(Debug, sqlx::FromRow)]
struct SqliteAccountLock {
    id: String,
    user_id: Option<String>,
    identifier_hash: String,
    locked_until: i64,
    lock_reason: String,
    locked_by_ip: Option<String>,
    created_at: i64,
    released_at: Option<i64>,
}

impl TryFrom<SqliteAccountLock> for AccountLock {
    type Error = Error;

    fn try_from(row: SqliteAccountLock) -> Result<Self, Self::Error> {
        Ok(AccountLock {
            id: row.id,
            user_id: row.user_id.map(UserId::from),
            identifier_hash: row.identifier_hash,
            locked_until: from_timestamp(row.locked_until)?,
            lock_reason: row.lock_reason,
            locked_by_ip: row.locked_by_ip,
            created_at: from_timestamp(row.created_at)?,
            released_at: row.released_at.map(from_timestamp).transpose()?,
        })
    }
}

#[async_trait]
impl AccountLockRepository for SqliteAccountLockRepository {
    async fn create(
        &self,
        lock: NewAccountLock,
        now: DateTime<Utc>,
    ) -> Result<AccountLock, Error> {
        sqlx::query_as::<_, SqliteAccountLock>(&format!(
            r#"
            INSERT INTO account_locks
                (id, user_id, identifier_hash, locked_until, lock_reason, locked_by_ip, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING {COLUMNS}
            "#
        ))
        .bind(&lock.id)
        .bind(lock.user_id.as_ref().map(|id| id.as_str()))
        .bind(&lock.identifier_hash)
        .bind(lock.locked_until.timestamp())
        .bind(&lock.lock_reason)
        .bind(&lock.locked_by_ip)
        .bind(now.timestamp())
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("Failed to create lock"))?
        .try_into()
    }

    async fn find_active_by_identifier(
        &self,
        identifier_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<AccountLock>, Error> {
        self.find_active("identifier_hash", identifier_hash, now)
            .await
    }

    async fn find_active_by_user_id(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Option<AccountLock>, Error> {
        self.find_active("user_id", user_id.as_str(), now).await
    }

    async fn release_by_user_id(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<u64, Error> {
        self.release_where("user_id", user_id.as_str(), now).await
    }

    async fn release_by_identifier(
        &self,
        identifier_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<u64, Error> {
        self.release_where("identifier_hash", identifier_hash, now)
            .await
    }

    async fn release_expired(&self, now: DateTime<Utc>) -> Result<u64, Error> {
        let result = sqlx::query(
            "UPDATE account_locks SET released_at = ?1 \
             WHERE released_at IS NULL AND locked_until <= ?1",
        )
        .bind(now.timestamp())
        .execute(&self.pool)
        .await
        .map_err(db_error("Failed to release expired locks"))?;

        Ok(result.rows_affected())
    }

    async fn clean_old(&self, before: DateTime<Utc>) -> Result<u64, Error> {
        let result = sqlx::query(
            "DELETE FROM account_locks WHERE released_at IS NOT NULL AND created_at < ?",
        )
        .bind(before.timestamp())
        .execute(&self.pool)
        .await
        .map_err(db_error("Failed to clean up old locks"))?;

        Ok(result.rows_affected())
    }
}
