use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{Error, IpAddress, LoginAttempt};

/// Append-only ledger of login attempts.
///
/// Every count is over attempts with `attempted_at >= since`. Identifiers are only ever
/// passed in hashed form.
#[async_trait]
pub trait LoginAttemptRepository: Send + Sync + 'static {
    /// Persist an attempt. The returned record carries the storage-assigned id.
    async fn save(&self, attempt: &LoginAttempt) -> Result<LoginAttempt, Error>;

    /// All attempts from `ip`, successful or not.
    async fn count_by_ip_since(&self, ip: &IpAddress, since: DateTime<Utc>)
    -> Result<u32, Error>;

    async fn count_failures_by_ip_since(
        &self,
        ip: &IpAddress,
        since: DateTime<Utc>,
    ) -> Result<u32, Error>;

    async fn count_failures_by_identifier_since(
        &self,
        identifier_hash: &str,
        since: DateTime<Utc>,
    ) -> Result<u32, Error>;

    /// Number of distinct identifier hashes tried from `ip`.
    async fn count_distinct_identifiers_by_ip_since(
        &self,
        ip: &IpAddress,
        since: DateTime<Utc>,
    ) -> Result<u32, Error>;

    /// Most recent attempts from `ip`, newest first.
    async fn find_recent_by_ip(
        &self,
        ip: &IpAddress,
        limit: u32,
    ) -> Result<Vec<LoginAttempt>, Error>;

    /// Most recent attempts for an identifier, newest first.
    async fn find_recent_by_identifier(
        &self,
        identifier_hash: &str,
        limit: u32,
    ) -> Result<Vec<LoginAttempt>, Error>;

    /// Delete attempts older than `before`. Returns the number of rows removed.
    async fn clean_old_attempts(&self, before: DateTime<Utc>) -> Result<u64, Error>;
}
