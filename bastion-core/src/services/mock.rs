//! In-memory repositories shared by the service tests.

use std::{collections::HashSet, sync::Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    AccountLock, Counter, CounterStore, Error, IpAddress, LoginAttempt, NewAccountLock, NewUser, User, UserId,
    error::StorageError,
    repositories::{
        AccountLockRepository, LoginAttemptRepository, PasswordRepository, UserRepository,
    },
};

#[derive(Default)]
pub struct MockAttemptRepository {
    pub attempts: Mutex<Vec<LoginAttempt>>,
}

impl MockAttemptRepository {
    fn matching(&self, filter: impl Fn(&LoginAttempt) -> bool) -> Vec<LoginAttempt> {
        self.attempts
            .lock()
            .unwrap()
            .iter()
            .filter(|a| filter(a))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl LoginAttemptRepository for MockAttemptRepository {
    async fn save(&self, attempt: &LoginAttempt) -> Result<LoginAttempt, Error> {
        let mut attempts = self.attempts.lock().unwrap();
        let mut saved = attempt.clone();
        saved.id = Some(attempts.len() as i64 + 1);
        attempts.push(saved.clone());
        Ok(saved)
    }

    async fn count_by_ip_since(
        &self,
        ip: &IpAddress,
        since: DateTime<Utc>,
    ) -> Result<u32, Error> {
        Ok(self
            .matching(|a| &a.ip_address == ip && a.attempted_at >= since)
            .len() as u32)
    }

    async fn count_failures_by_ip_since(
        &self,
        ip: &IpAddress,
        since: DateTime<Utc>,
    ) -> Result<u32, Error> {
        Ok(self
            .matching(|a| &a.ip_address == ip && !a.success && a.attempted_at >= since)
            .len() as u32)
    }

    async fn count_failures_by_identifier_since(
        &self,
        identifier_hash: &str,
        since: DateTime<Utc>,
    ) -> Result<u32, Error> {
        Ok(self
            .matching(|a| {
                a.identifier_hash == identifier_hash && !a.success && a.attempted_at >= since
            })
            .len() as u32)
    }

    async fn count_distinct_identifiers_by_ip_since(
        &self,
        ip: &IpAddress,
        since: DateTime<Utc>,
    ) -> Result<u32, Error> {
        let distinct: HashSet<String> = self
            .matching(|a| &a.ip_address == ip && a.attempted_at >= since)
            .into_iter()
            .map(|a| a.identifier_hash)
            .collect();
        Ok(distinct.len() as u32)
    }

    async fn find_recent_by_ip(
        &self,
        ip: &IpAddress,
        limit: u32,
    ) -> Result<Vec<LoginAttempt>, Error> {
        let mut found = self.matching(|a| &a.ip_address == ip);
        found.reverse();
        found.truncate(limit as usize);
        Ok(found)
    }

    async fn find_recent_by_identifier(
        &self,
        identifier_hash: &str,
        limit: u32,
    ) -> Result<Vec<LoginAttempt>, Error> {
        let mut found = self.matching(|a| a.identifier_hash == identifier_hash);
        found.reverse();
        found.truncate(limit as usize);
        Ok(found)
    }

    async fn clean_old_attempts(&self, before: DateTime<Utc>) -> Result<u64, Error> {
        let mut attempts = self.attempts.lock().unwrap();
        let before_len = attempts.len();
        attempts.retain(|a| a.attempted_at >= before);
        Ok((before_len - attempts.len()) as u64)
    }
}

#[derive(Default)]
pub struct MockLockRepository {
    pub locks: Mutex<Vec<AccountLock>>,
}

impl MockLockRepository {
    fn latest_active(
        &self,
        now: DateTime<Utc>,
        filter: impl Fn(&AccountLock) -> bool,
    ) -> Option<AccountLock> {
        self.locks
            .lock()
            .unwrap()
            .iter()
            .filter(|l| l.is_active_at(now) && filter(l))
            .max_by_key(|l| l.locked_until)
            .cloned()
    }

    fn release_where(
        &self,
        now: DateTime<Utc>,
        include_expired: bool,
        filter: impl Fn(&AccountLock) -> bool,
    ) -> u64 {
        let mut released = 0;
        for lock in self.locks.lock().unwrap().iter_mut() {
            if lock.released_at.is_none() && filter(lock) {
                if !include_expired && lock.locked_until <= now {
                    continue;
                }
                lock.release(now);
                released += 1;
            }
        }
        released
    }
}

#[async_trait]
impl AccountLockRepository for MockLockRepository {
    async fn create(
        &self,
        lock: NewAccountLock,
        now: DateTime<Utc>,
    ) -> Result<AccountLock, Error> {
        let lock = lock.into_lock(now);
        self.locks.lock().unwrap().push(lock.clone());
        Ok(lock)
    }

    async fn find_active_by_identifier(
        &self,
        identifier_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<AccountLock>, Error> {
        Ok(self.latest_active(now, |l| l.identifier_hash == identifier_hash))
    }

    async fn find_active_by_user_id(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Option<AccountLock>, Error> {
        Ok(self.latest_active(now, |l| l.user_id.as_ref() == Some(user_id)))
    }

    async fn release_by_user_id(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<u64, Error> {
        Ok(self.release_where(now, false, |l| l.user_id.as_ref() == Some(user_id)))
    }

    async fn release_by_identifier(
        &self,
        identifier_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<u64, Error> {
        Ok(self.release_where(now, false, |l| l.identifier_hash == identifier_hash))
    }

    async fn release_expired(&self, now: DateTime<Utc>) -> Result<u64, Error> {
        Ok(self.release_where(now, true, |l| l.locked_until <= now))
    }

    async fn clean_old(&self, before: DateTime<Utc>) -> Result<u64, Error> {
        let mut locks = self.locks.lock().unwrap();
        let before_len = locks.len();
        locks.retain(|l| l.released_at.is_none() || l.created_at >= before);
        Ok((before_len - locks.len()) as u64)
    }
}

#[derive(Default)]
pub struct MockUserRepository {
    pub users: Mutex<Vec<User>>,
    pub fail: Mutex<bool>,
}

impl MockUserRepository {
    pub fn with_user(self, id: &str, username: &str, email: &str) -> Self {
        self.users.lock().unwrap().push(User {
            id: UserId::new(id),
            username: username.to_string(),
            email: email.to_string(),
            created_at: Utc::now(),
        });
        self
    }

    fn find(&self, filter: impl Fn(&User) -> bool) -> Result<Option<User>, Error> {
        if *self.fail.lock().unwrap() {
            return Err(StorageError::Database("connection reset".into()).into());
        }
        Ok(self.users.lock().unwrap().iter().find(|u| filter(u)).cloned())
    }
}

#[async_trait]
impl UserRepository for MockUserRepository {
    async fn create(&self, user: NewUser) -> Result<User, Error> {
        let user = User {
            id: user.id,
            username: user.username,
            email: user.email,
            created_at: Utc::now(),
        };
        self.users.lock().unwrap().push(user.clone());
        Ok(user)
    }

    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, Error> {
        self.find(|u| &u.id == id)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, Error> {
        self.find(|u| u.email == email)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, Error> {
        self.find(|u| u.username == username)
    }
}

#[derive(Default)]
pub struct MockPasswordRepository {
    pub hashes: Mutex<Vec<(UserId, String)>>,
}

#[async_trait]
impl PasswordRepository for MockPasswordRepository {
    async fn set_password_hash(&self, user_id: &UserId, hash: &str) -> Result<(), Error> {
        let mut hashes = self.hashes.lock().unwrap();
        hashes.retain(|(id, _)| id != user_id);
        hashes.push((user_id.clone(), hash.to_string()));
        Ok(())
    }

    async fn get_password_hash(&self, user_id: &UserId) -> Result<Option<String>, Error> {
        Ok(self
            .hashes
            .lock()
            .unwrap()
            .iter()
            .find(|(id, _)| id == user_id)
            .map(|(_, hash)| hash.clone()))
    }
}

/// A counter store whose every call fails.
pub struct BrokenCounterStore;

fn unavailable() -> Error {
    StorageError::Connection("counter store down".into()).into()
}

#[async_trait]
impl CounterStore for BrokenCounterStore {
    async fn increment(
        &self,
        _key: &str,
        _window: chrono::Duration,
        _now: DateTime<Utc>,
    ) -> Result<Counter, Error> {
        Err(unavailable())
    }

    async fn increment_sliding(
        &self,
        _key: &str,
        _ttl: chrono::Duration,
        _now: DateTime<Utc>,
    ) -> Result<Counter, Error> {
        Err(unavailable())
    }

    async fn get(&self, _key: &str) -> Result<Option<Counter>, Error> {
        Err(unavailable())
    }

    async fn set(&self, _key: &str, _counter: Counter) -> Result<(), Error> {
        Err(unavailable())
    }

    async fn delete(&self, _key: &str) -> Result<(), Error> {
        Err(unavailable())
    }

    async fn sweep(&self, _now: DateTime<Utc>) -> Result<u64, Error> {
        Err(unavailable())
    }
}
