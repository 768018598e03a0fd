//! SQLite implementation of the login attempt ledger.

use async_trait::async_trait;
use bastion_core::{
    Error, FailureReason, IpAddress, LoginAttempt, UserId, error::StorageError,
    repositories::LoginAttemptRepository,
};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::{from_timestamp, repositories::db_error};

pub struct SqliteLoginAttemptRepository {
    pool: SqlitePool,
}

impl SqliteLoginAttemptRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn count(&self, sql: &str, key: &str, since: DateTime<Utc>) -> Result<u32, Error> {
        let count: i64 = sqlx::query_scalar(sql)
            .bind(key)
            .bind(since.timestamp())
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("Failed to count login attempts"))?;
        Ok(count as u32)
    }

    async fn recent(&self, sql: &str, key: &str, limit: u32) -> Result<Vec<LoginAttempt>, Error> {
        sqlx::query_as::<_, SqliteLoginAttempt>(sql)
            .bind(key)
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("Failed to fetch login attempts"))?
            .into_iter()
            .map(LoginAttempt::try_from)
            .collect()
    }
}

const COLUMNS: &str = "id, identifier_hash, ip_address, success, attempted_at, user_agent, \
                       device_id, failure_reason, user_id";

#[derive(Debug, sqlx::FromRow)]
struct SqliteLoginAttempt {
    id: i64,
    identifier_hash: String,
    ip_address: String,
    success: bool,
    attempted_at: i64,
    user_agent: Option<String>,
    device_id: Option<String>,
    failure_reason: Option<String>,
    user_id: Option<String>,
}

impl TryFrom<SqliteLoginAttempt> for LoginAttempt {
    type Error = Error;

    fn try_from(row: SqliteLoginAttempt) -> Result<Self, Self::Error> {
        let failure_reason = row
            .failure_reason
            .map(|reason| reason.parse::<FailureReason>())
            .transpose()
            .map_err(StorageError::Database)?;

        Ok(LoginAttempt {
            id: Some(row.id),
            identifier_hash: row.identifier_hash,
            ip_address: IpAddress::try_from(row.ip_address)?,
            user_agent: row.user_agent,
            success: row.success,
            user_id: row.user_id.map(UserId::from),
            failure_reason,
            device_id: row.device_id,
            attempted_at: from_timestamp(row.attempted_at)?,
        })
    }
}

#[async_trait]
impl LoginAttemptRepository for SqliteLoginAttemptRepository {
    async fn save(&self, attempt: &LoginAttempt) -> Result<LoginAttempt, Error> {
        let row = sqlx::query_as::<_, SqliteLoginAttempt>(&format!(
            r#"
            INSERT INTO login_attempts
                (identifier_hash, ip_address, success, attempted_at, user_agent, device_id,
                 failure_reason, user_id)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING {COLUMNS}
            "#
        ))
        .bind(&attempt.identifier_hash)
        .bind(attempt.ip_address.as_str())
        .bind(attempt.success)
        .bind(attempt.attempted_at.timestamp())
        .bind(&attempt.user_agent)
        .bind(&attempt.device_id)
        .bind(attempt.failure_reason.map(|r| r.as_str()))
        .bind(attempt.user_id.as_ref().map(|id| id.as_str()))
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("Failed to record login attempt"))?;

        row.try_into()
    }

    async fn count_by_ip_since(
        &self,
        ip: &IpAddress,
        since: DateTime<Utc>,
    ) -> Result<u32, Error> {
        self.count(
            "SELECT COUNT(*) FROM login_attempts WHERE ip_address = ? AND attempted_at >= ?",
            ip.as_str(),
            since,
        )
        .await
    }

    async fn count_failures_by_ip_since(
        &self,
        ip: &IpAddress,
        since: DateTime<Utc>,
    ) -> Result<u32, Error> {
        self.count(
            "SELECT COUNT(*) FROM login_attempts \
             WHERE ip_address = ? AND attempted_at >= ? AND success = 0",
            ip.as_str(),
            since,
        )
        .await
    }

    async fn count_failures_by_identifier_since(
        &self,
        identifier_hash: &str,
        since: DateTime<Utc>,
    ) -> Result<u32, Error> {
        self.count(
            "SELECT COUNT(*) FROM login_attempts \
             WHERE identifier_hash = ? AND attempted_at >= ? AND success = 0",
            identifier_hash,
            since,
        )
        .await
    }

    async fn count_distinct_identifiers_by_ip_since(
        &self,
        ip: &IpAddress,
        since: DateTime<Utc>,
    ) -> Result<u32, Error> {
        self.count(
            "SELECT COUNT(DISTINCT identifier_hash) FROM login_attempts \
             WHERE ip_address = ? AND attempted_at >= ?",
            ip.as_str(),
            since,
        )
        .await
    }

    async fn find_recent_by_ip(
        &self,
        ip: &IpAddress,
        limit: u32,
    ) -> Result<Vec<LoginAttempt>, Error> {
        self.recent(
            &format!(
                "SELECT {COLUMNS} FROM login_attempts WHERE ip_address = ? \
                 ORDER BY attempted_at DESC, id DESC LIMIT ?"
            ),
            ip.as_str(),
            limit,
        )
        .await
    }

    async fn find_recent_by_identifier(
        &self,
        identifier_hash: &str,
        limit: u32,
    ) -> Result<Vec<LoginAttempt>, Error> {
        self.recent(
            &format!(
                "SELECT {COLUMNS} FROM login_attempts WHERE identifier_hash = ? \
                 ORDER BY attempted_at DESC, id DESC LIMIT ?"
            ),
            identifier_hash,
            limit,
        )
        .await
    }

    async fn clean_old_attempts(&self, before: DateTime<Utc>) -> Result<u64, Error> {
        let result = sqlx::query("DELETE FROM login_attempts WHERE attempted_at < ?")
            .bind(before.timestamp())
            .execute(&self.pool)
            .await
            .map_err(db_error("Failed to clean up old login attempts"))?;

        Ok(result.rows_affected())
    }
}
