//! Brute-force and credential-spraying detection.
//!
//! Runs after a failed attempt has been written to the ledger and looks at two signals:
//!
//! - failures for the attempt's identifier within the lockout window, which lock the
//!   identifier once they reach the lockout threshold
//! - attempts from the attempt's IP within the detection window, which raise a graded
//!   [`Event::BruteForceDetected`] once they reach the spray threshold across enough distinct
//!   identifiers
//!
//! Both can fire for the same attempt.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::{
    AccountLock, Clock, Error, Event, IpAddress, LoginAttempt, Severity,
    config::{BruteForceConfig, LockoutConfig},
    repositories::{AccountLockRepository, LoginAttemptRepository},
    services::LockService,
};

pub const LOCK_REASON_TOO_MANY_FAILURES: &str = "Too many failed login attempts";

/// Spraying observed from one IP.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SprayAlert {
    pub ip_address: IpAddress,
    pub attempt_count: u32,
    /// How many of `attempt_count` were refused.
    pub failed_attempts: u32,
    pub distinct_identifiers: u32,
    pub severity: Severity,
}

/// What one detector run found.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Detection {
    /// Failures for the identifier within the lockout window, this attempt included.
    pub failed_attempts: u32,
    /// The lock this run created, if any.
    pub lock: Option<AccountLock>,
    pub spray: Option<SprayAlert>,
}

impl Detection {
    /// Events to publish for this detection, in the order they were decided.
    pub fn events(&self, timestamp: DateTime<Utc>, window_seconds: i64) -> Vec<Event> {
        let mut events = Vec::new();
        if let Some(lock) = &self.lock {
            events.push(Event::AccountLocked {
                lock_id: lock.id.clone(),
                identifier_hash: lock.identifier_hash.clone(),
                user_id: lock.user_id.clone(),
                failure_count: self.failed_attempts,
                locked_until: lock.locked_until,
                ip_address: lock
                    .locked_by_ip
                    .as_deref()
                    .and_then(|ip| IpAddress::create(ip).ok()),
                timestamp,
            });
        }
        if let Some(spray) = &self.spray {
            events.push(Event::BruteForceDetected {
                ip_address: spray.ip_address.clone(),
                attempt_count: spray.attempt_count,
                failed_attempts: spray.failed_attempts,
                distinct_identifiers: spray.distinct_identifiers,
                severity: spray.severity,
                window_seconds,
                timestamp,
            });
        }
        events
    }
}

pub struct BruteForceDetector<A: LoginAttemptRepository, L: AccountLockRepository> {
    attempts: Arc<A>,
    locks: Arc<LockService<L>>,
    lockout: LockoutConfig,
    config: BruteForceConfig,
    clock: Arc<dyn Clock>,
}

impl<A: LoginAttemptRepository, L: AccountLockRepository> BruteForceDetector<A, L> {
    pub fn new(
        attempts: Arc<A>,
        locks: Arc<LockService<L>>,
        lockout: LockoutConfig,
        config: BruteForceConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            attempts,
            locks,
            lockout,
            config,
            clock,
        }
    }

    pub fn config(&self) -> &BruteForceConfig {
        &self.config
    }

    pub fn lockout_config(&self) -> &LockoutConfig {
        &self.lockout
    }

    /// Severity for `attempt_count` attempts from one IP.
    pub fn severity_for(&self, attempt_count: u32) -> Severity {
        if attempt_count >= self.config.critical_threshold {
            Severity::Critical
        } else if attempt_count >= self.config.high_threshold {
            Severity::High
        } else if attempt_count >= self.config.medium_threshold {
            Severity::Medium
        } else {
            Severity::Low
        }
    }

    /// Evaluate a persisted attempt. Successful attempts are ignored.
    pub async fn evaluate(&self, attempt: &LoginAttempt) -> Result<Detection, Error> {
        if attempt.success {
            return Ok(Detection::default());
        }

        let mut detection = Detection::default();

        if self.lockout.enabled {
            self.evaluate_lockout(attempt, &mut detection).await?;
        }

        if self.config.enabled {
            detection.spray = self.evaluate_spray(&attempt.ip_address).await?;
        }

        Ok(detection)
    }

    async fn evaluate_lockout(
        &self,
        attempt: &LoginAttempt,
        detection: &mut Detection,
    ) -> Result<(), Error> {
        let now = self.clock.now();
        let failures = self
            .attempts
            .count_failures_by_identifier_since(&attempt.identifier_hash, now - self.lockout.window)
            .await?;
        detection.failed_attempts = failures;

        if failures < self.lockout.max_failed_attempts {
            return Ok(());
        }

        if self
            .locks
            .is_locked_by_identifier(&attempt.identifier_hash)
            .await?
        {
            tracing::debug!(
                identifier_hash = %attempt.identifier_hash,
                failures,
                "Identifier already locked"
            );
            return Ok(());
        }

        let lock = self
            .locks
            .lock_account(
                attempt.user_id.clone(),
                &attempt.identifier_hash,
                LOCK_REASON_TOO_MANY_FAILURES,
                now + self.lockout.lock_duration,
                Some(&attempt.ip_address),
            )
            .await?;
        detection.lock = Some(lock);

        Ok(())
    }

    async fn evaluate_spray(&self, ip: &IpAddress) -> Result<Option<SprayAlert>, Error> {
        let since = self.clock.now() - self.config.window;
        let attempt_count = self.attempts.count_by_ip_since(ip, since).await?;
        if attempt_count < self.config.spray_threshold {
            return Ok(None);
        }

        let distinct_identifiers = self
            .attempts
            .count_distinct_identifiers_by_ip_since(ip, since)
            .await?;
        if distinct_identifiers < self.config.min_distinct_identifiers {
            return Ok(None);
        }

        let failed_attempts = self.attempts.count_failures_by_ip_since(ip, since).await?;

        Ok(Some(SprayAlert {
            ip_address: ip.clone(),
            attempt_count,
            failed_attempts,
            distinct_identifiers,
            severity: self.severity_for(attempt_count),
        }))
    }
}
