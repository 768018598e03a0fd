//! Ephemeral per-key counters
//!
//! The rate limiter and the backoff service keep their per-IP state behind [`CounterStore`].
//! [`MemoryCounterStore`] is the single-process implementation. Its state is lost on restart
//! and not shared between instances, so with N instances the effective limits are N times
//! the configured ones. A store backed by a shared atomic counter lifts that restriction
//! without touching the services.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;

use crate::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Counter {
    pub count: u32,
    /// When the count was last changed.
    pub updated_at: DateTime<Utc>,
    /// From this instant on the entry is treated as absent.
    pub expires_at: DateTime<Utc>,
}

impl Counter {
    pub fn new(count: u32, now: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            count,
            updated_at: now,
            expires_at: now + ttl,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[async_trait]
pub trait CounterStore: Send + Sync + 'static {
    /// Atomically bump the counter for `key`.
    ///
    /// A missing or expired entry restarts at `1` with `expires_at = now + window`. A live
    /// entry is incremented and keeps its `expires_at`. Returns the entry after the update.
    async fn increment(
        &self,
        key: &str,
        window: Duration,
        now: DateTime<Utc>,
    ) -> Result<Counter, Error>;

    /// Atomically bump the counter for `key` and push its expiry to `now + ttl`.
    ///
    /// A missing or expired entry restarts at `1`. Used for inactivity horizons, where every
    /// hit extends the life of the entry.
    async fn increment_sliding(
        &self,
        key: &str,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<Counter, Error>;

    /// The entry for `key`, expired or not.
    async fn get(&self, key: &str) -> Result<Option<Counter>, Error>;

    async fn set(&self, key: &str, counter: Counter) -> Result<(), Error>;

    async fn delete(&self, key: &str) -> Result<(), Error>;

    /// Drop every entry expired at `now`. Returns how many were removed.
    async fn sweep(&self, now: DateTime<Utc>) -> Result<u64, Error>;
}

#[derive(Debug, Default)]
pub struct MemoryCounterStore {
    entries: DashMap<String, Counter>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn increment(
        &self,
        key: &str,
        window: Duration,
        now: DateTime<Utc>,
    ) -> Result<Counter, Error> {
        let mut entry = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| Counter::new(0, now, window));
        let counter = entry.value_mut();

        if counter.is_expired_at(now) {
            *counter = Counter::new(1, now, window);
        } else {
            counter.count = counter.count.saturating_add(1);
            counter.updated_at = now;
        }

        Ok(*counter)
    }

    async fn increment_sliding(
        &self,
        key: &str,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<Counter, Error> {
        let mut entry = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| Counter::new(0, now, ttl));
        let counter = entry.value_mut();

        let previous = if counter.is_expired_at(now) {
            0
        } else {
            counter.count
        };
        *counter = Counter::new(previous.saturating_add(1), now, ttl);

        Ok(*counter)
    }

    async fn get(&self, key: &str) -> Result<Option<Counter>, Error> {
        Ok(self.entries.get(key).map(|entry| *entry.value()))
    }

    async fn set(&self, key: &str, counter: Counter) -> Result<(), Error> {
        self.entries.insert(key.to_string(), counter);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), Error> {
        self.entries.remove(key);
        Ok(())
    }

    async fn sweep(&self, now: DateTime<Utc>) -> Result<u64, Error> {
        let before = self.entries.len();
        self.entries.retain(|_, counter| !counter.is_expired_at(now));
        Ok(before.saturating_sub(self.entries.len()) as u64)
    }
}
