//! Account and identifier lock management.
//!
//! Locks are rows, never flags: creating one is always allowed and "locked" means at least
//! one active row exists for the identifier or user.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::{
    AccountLock, Clock, Error, Event, EventBus, IpAddress, NewAccountLock, UnlockReason, UserId,
    repositories::AccountLockRepository,
};

pub struct LockService<L: AccountLockRepository> {
    repository: Arc<L>,
    clock: Arc<dyn Clock>,
    event_bus: Option<EventBus>,
}

impl<L: AccountLockRepository> LockService<L> {
    pub fn new(repository: Arc<L>, clock: Arc<dyn Clock>) -> Self {
        Self {
            repository,
            clock,
            event_bus: None,
        }
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Create a lock. Existing locks for the same identifier are left alone.
    pub async fn lock_account(
        &self,
        user_id: Option<UserId>,
        identifier_hash: &str,
        reason: &str,
        locked_until: DateTime<Utc>,
        locked_by_ip: Option<&IpAddress>,
    ) -> Result<AccountLock, Error> {
        let lock = NewAccountLock::new(
            user_id,
            identifier_hash,
            reason,
            locked_until,
            locked_by_ip.map(|ip| ip.to_string()),
        );
        let lock = self.repository.create(lock, self.clock.now()).await?;

        tracing::info!(
            lock_id = %lock.id,
            identifier_hash = %lock.identifier_hash,
            locked_until = %lock.locked_until,
            reason = %lock.lock_reason,
            "Lock created"
        );

        Ok(lock)
    }

    pub async fn is_locked_by_identifier(&self, identifier_hash: &str) -> Result<bool, Error> {
        Ok(self
            .repository
            .find_active_by_identifier(identifier_hash, self.clock.now())
            .await?
            .is_some())
    }

    pub async fn is_locked_by_user_id(&self, user_id: &UserId) -> Result<bool, Error> {
        Ok(self
            .repository
            .find_active_by_user_id(user_id, self.clock.now())
            .await?
            .is_some())
    }

    /// The active lock with the latest `locked_until` for the identifier or, when given, the
    /// user.
    pub async fn active_lock_for(
        &self,
        identifier_hash: &str,
        user_id: Option<&UserId>,
    ) -> Result<Option<AccountLock>, Error> {
        let now = self.clock.now();
        let by_identifier = self
            .repository
            .find_active_by_identifier(identifier_hash, now)
            .await?;
        let by_user = match user_id {
            Some(user_id) => self.repository.find_active_by_user_id(user_id, now).await?,
            None => None,
        };

        Ok(match (by_identifier, by_user) {
            (Some(a), Some(b)) => Some(if b.locked_until > a.locked_until { b } else { a }),
            (a, b) => a.or(b),
        })
    }

    /// Seconds until the latest active lock runs out, rounded up. `None` when unlocked.
    pub async fn remaining_seconds(
        &self,
        identifier_hash: &str,
        user_id: Option<&UserId>,
    ) -> Result<Option<u64>, Error> {
        let now = self.clock.now();
        Ok(self
            .active_lock_for(identifier_hash, user_id)
            .await?
            .map(|lock| lock.remaining_seconds_at(now)))
    }

    /// Release every active lock held by a user. Returns the number of locks released.
    pub async fn release(&self, user_id: &UserId, reason: UnlockReason) -> Result<u64, Error> {
        let now = self.clock.now();
        let released = self.repository.release_by_user_id(user_id, now).await?;

        if released > 0 {
            tracing::info!(user_id = %user_id, released, reason = ?reason, "Released user locks");
            self.emit(Event::AccountUnlocked {
                user_id: Some(user_id.clone()),
                identifier_hash: None,
                released,
                reason,
                timestamp: now,
            })
            .await;
        }

        Ok(released)
    }

    /// Release every active lock on an identifier, including ones with no user attached.
    pub async fn release_by_identifier(
        &self,
        identifier_hash: &str,
        reason: UnlockReason,
    ) -> Result<u64, Error> {
        let now = self.clock.now();
        let released = self
            .repository
            .release_by_identifier(identifier_hash, now)
            .await?;

        if released > 0 {
            tracing::info!(identifier_hash = %identifier_hash, released, reason = ?reason, "Released identifier locks");
            self.emit(Event::AccountUnlocked {
                user_id: None,
                identifier_hash: Some(identifier_hash.to_string()),
                released,
                reason,
                timestamp: now,
            })
            .await;
        }

        Ok(released)
    }

    /// Stamp expired, unreleased locks as released.
    pub async fn release_expired_locks(&self) -> Result<u64, Error> {
        let now = self.clock.now();
        let released = self.repository.release_expired(now).await?;

        if released > 0 {
            tracing::info!(released, "Released expired locks");
            self.emit(Event::AccountUnlocked {
                user_id: None,
                identifier_hash: None,
                released,
                reason: UnlockReason::LockoutExpired,
                timestamp: now,
            })
            .await;
        }

        Ok(released)
    }

    /// Delete released locks created before `before`. Active locks are never deleted.
    pub async fn clean_old_locks(&self, before: DateTime<Utc>) -> Result<u64, Error> {
        let deleted = self.repository.clean_old(before).await?;
        if deleted > 0 {
            tracing::info!(deleted, "Cleaned up old lock records");
        }
        Ok(deleted)
    }

    async fn emit(&self, event: Event) {
        if let Some(event_bus) = &self.event_bus {
            event_bus.publish(event).await;
        }
    }
}
