use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{AccountLock, Error, NewAccountLock, UserId};

/// Storage for identifier and account locks.
///
/// Release operations only stamp `released_at` on rows that are still unreleased, so
/// calling them twice is harmless. Rows are only deleted by [`Self::clean_old`].
#[async_trait]
pub trait AccountLockRepository: Send + Sync + 'static {
    async fn create(&self, lock: NewAccountLock, now: DateTime<Utc>)
    -> Result<AccountLock, Error>;

    /// The active lock for an identifier with the latest `locked_until`, if any.
    async fn find_active_by_identifier(
        &self,
        identifier_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<AccountLock>, Error>;

    /// The active lock for a user with the latest `locked_until`, if any.
    async fn find_active_by_user_id(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Option<AccountLock>, Error>;

    /// Release every active lock for a user. Returns the number of rows released.
    ///
    /// Expired rows are left to [`AccountLockRepository::release_expired`].
    async fn release_by_user_id(&self, user_id: &UserId, now: DateTime<Utc>)
    -> Result<u64, Error>;

    /// Release every active lock for an identifier.
    async fn release_by_identifier(
        &self,
        identifier_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<u64, Error>;

    /// Stamp `released_at` on unreleased locks whose `locked_until` has passed.
    async fn release_expired(&self, now: DateTime<Utc>) -> Result<u64, Error>;

    /// Delete released locks created before `before`.
    async fn clean_old(&self, before: DateTime<Utc>) -> Result<u64, Error>;
}
