//! Time-bounded account and identifier locks
//!
//! A lock is active while it is unreleased and unexpired. Several locks may exist for the
//! same identifier at once; "locked" means at least one of them is active.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::{UserId, id::generate_prefixed_id};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountLock {
    pub id: String,
    pub user_id: Option<UserId>,
    pub identifier_hash: String,
    pub locked_until: DateTime<Utc>,
    pub lock_reason: String,
    pub locked_by_ip: Option<String>,
    pub created_at: DateTime<Utc>,
    pub released_at: Option<DateTime<Utc>>,
}

impl AccountLock {
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.released_at.is_none() && now < self.locked_until
    }

    pub fn is_active(&self) -> bool {
        self.is_active_at(Utc::now())
    }

    /// Stamp `released_at`. Releasing an already released lock keeps the first timestamp.
    pub fn release(&mut self, now: DateTime<Utc>) {
        if self.released_at.is_none() {
            self.released_at = Some(now);
        }
    }

    /// Time left on the lock, or zero when it is no longer active.
    pub fn remaining_at(&self, now: DateTime<Utc>) -> Duration {
        if self.is_active_at(now) {
            self.locked_until - now
        } else {
            Duration::zero()
        }
    }

    /// Seconds left, rounded up, for the `lockDuration` field clients see.
    pub fn remaining_seconds_at(&self, now: DateTime<Utc>) -> u64 {
        ceil_seconds(self.remaining_at(now))
    }
}

/// Whole seconds in `duration`, rounded up. Negative durations count as zero.
pub fn ceil_seconds(duration: Duration) -> u64 {
    let millis = duration.num_milliseconds();
    if millis <= 0 {
        0
    } else {
        (millis as u64).div_ceil(1000)
    }
}

/// A lock to be created.
#[derive(Debug, Clone)]
pub struct NewAccountLock {
    pub id: String,
    pub user_id: Option<UserId>,
    pub identifier_hash: String,
    pub locked_until: DateTime<Utc>,
    pub lock_reason: String,
    pub locked_by_ip: Option<String>,
}

impl NewAccountLock {
    pub fn new(
        user_id: Option<UserId>,
        identifier_hash: impl Into<String>,
        lock_reason: impl Into<String>,
        locked_until: DateTime<Utc>,
        locked_by_ip: Option<String>,
    ) -> Self {
        Self {
            id: generate_prefixed_id("lck"),
            user_id,
            identifier_hash: identifier_hash.into(),
            locked_until,
            lock_reason: lock_reason.into(),
            locked_by_ip,
        }
    }

    pub fn into_lock(self, created_at: DateTime<Utc>) -> AccountLock {
        AccountLock {
            id: self.id,
            user_id: self.user_id,
            identifier_hash: self.identifier_hash,
            locked_until: self.locked_until,
            lock_reason: self.lock_reason,
            locked_by_ip: self.locked_by_ip,
            created_at,
            released_at: None,
        }
    }
}
