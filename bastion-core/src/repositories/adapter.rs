use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    AccountLock, Error, IpAddress, LoginAttempt, NewAccountLock, NewUser, User, UserId,
    repositories::{
        AccountLockRepository, LoginAttemptRepository, PasswordRepository, RepositoryProvider,
        UserRepository,
    },
};

/// Adapter that wraps a RepositoryProvider and implements individual repository traits
pub struct UserRepositoryAdapter<R: RepositoryProvider> {
    provider: Arc<R>,
}

impl<R: RepositoryProvider> UserRepositoryAdapter<R> {
    pub fn new(provider: Arc<R>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<R: RepositoryProvider> UserRepository for UserRepositoryAdapter<R> {
    async fn create(&self, user: NewUser) -> Result<User, Error> {
        self.provider.user().create(user).await
    }

    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, Error> {
        self.provider.user().find_by_id(id).await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, Error> {
        self.provider.user().find_by_email(email).await
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, Error> {
        self.provider.user().find_by_username(username).await
    }
}

pub struct PasswordRepositoryAdapter<R: RepositoryProvider> {
    provider: Arc<R>,
}

impl<R: RepositoryProvider> PasswordRepositoryAdapter<R> {
    pub fn new(provider: Arc<R>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<R: RepositoryProvider> PasswordRepository for PasswordRepositoryAdapter<R> {
    async fn set_password_hash(&self, user_id: &UserId, hash: &str) -> Result<(), Error> {
        self.provider.password().set_password_hash(user_id, hash).await
    }

    async fn get_password_hash(&self, user_id: &UserId) -> Result<Option<String>, Error> {
        self.provider.password().get_password_hash(user_id).await
    }
}

pub struct LoginAttemptRepositoryAdapter<R: RepositoryProvider> {
    provider: Arc<R>,
}

impl<R: RepositoryProvider> LoginAttemptRepositoryAdapter<R> {
    pub fn new(provider: Arc<R>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<R: RepositoryProvider> LoginAttemptRepository for LoginAttemptRepositoryAdapter<R> {
    async fn save(&self, attempt: &LoginAttempt) -> Result<LoginAttempt, Error> {
        self.provider.attempts().save(attempt).await
    }

    async fn count_by_ip_since(
        &self,
        ip: &IpAddress,
        since: DateTime<Utc>,
    ) -> Result<u32, Error> {
        self.provider.attempts().count_by_ip_since(ip, since).await
    }

    async fn count_failures_by_ip_since(
        &self,
        ip: &IpAddress,
        since: DateTime<Utc>,
    ) -> Result<u32, Error> {
        self.provider
            .attempts()
            .count_failures_by_ip_since(ip, since)
            .await
    }

    async fn count_failures_by_identifier_since(
        &self,
        identifier_hash: &str,
        since: DateTime<Utc>,
    ) -> Result<u32, Error> {
        self.provider
            .attempts()
            .count_failures_by_identifier_since(identifier_hash, since)
            .await
    }

    async fn count_distinct_identifiers_by_ip_since(
        &self,
        ip: &IpAddress,
        since: DateTime<Utc>,
    ) -> Result<u32, Error> {
        self.provider
            .attempts()
            .count_distinct_identifiers_by_ip_since(ip, since)
            .await
    }

    async fn find_recent_by_ip(
        &self,
        ip: &IpAddress,
        limit: u32,
    ) -> Result<Vec<LoginAttempt>, Error> {
        self.provider.attempts().find_recent_by_ip(ip, limit).await
    }

    async fn find_recent_by_identifier(
        &self,
        identifier_hash: &str,
        limit: u32,
    ) -> Result<Vec<LoginAttempt>, Error> {
        self.provider
            .attempts()
            .find_recent_by_identifier(identifier_hash, limit)
            .await
    }

    async fn clean_old_attempts(&self, before: DateTime<Utc>) -> Result<u64, Error> {
        self.provider.attempts().clean_old_attempts(before).await
    }
}

pub struct AccountLockRepositoryAdapter<R: RepositoryProvider> {
    provider: Arc<R>,
}

impl<R: RepositoryProvider> AccountLockRepositoryAdapter<R> {
    pub fn new(provider: Arc<R>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<R: RepositoryProvider> AccountLockRepository for AccountLockRepositoryAdapter<R> {
    async fn create(
        &self,
        lock: NewAccountLock,
        now: DateTime<Utc>,
    ) -> Result<AccountLock, Error> {
        self.provider.locks().create(lock, now).await
    }

    async fn find_active_by_identifier(
        &self,
        identifier_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<AccountLock>, Error> {
        self.provider
            .locks()
            .find_active_by_identifier(identifier_hash, now)
            .await
    }

    async fn find_active_by_user_id(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Option<AccountLock>, Error> {
        self.provider
            .locks()
            .find_active_by_user_id(user_id, now)
            .await
    }

    async fn release_by_user_id(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<u64, Error> {
        self.provider.locks().release_by_user_id(user_id, now).await
    }

    async fn release_by_identifier(
        &self,
        identifier_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<u64, Error> {
        self.provider
            .locks()
            .release_by_identifier(identifier_hash, now)
            .await
    }

    async fn release_expired(&self, now: DateTime<Utc>) -> Result<u64, Error> {
        self.provider.locks().release_expired(now).await
    }

    async fn clean_old(&self, before: DateTime<Utc>) -> Result<u64, Error> {
        self.provider.locks().clean_old(before).await
    }
}
