//! Progressive server-side delay for IPs with recent failures.
//!
//! `delay = min(base * 2^(failures - 1), max)`. The counter for an IP is forgotten after a
//! success or after `inactivity_horizon` without a new failure.

use std::{sync::Arc, time::Duration};

use crate::{Clock, CounterStore, Delay, Error, IpAddress, config::BackoffConfig};

pub struct BackoffService {
    store: Arc<dyn CounterStore>,
    config: BackoffConfig,
    clock: Arc<dyn Clock>,
    delay: Arc<dyn Delay>,
}

impl BackoffService {
    pub fn new(
        store: Arc<dyn CounterStore>,
        config: BackoffConfig,
        clock: Arc<dyn Clock>,
        delay: Arc<dyn Delay>,
    ) -> Self {
        Self {
            store,
            config,
            clock,
            delay,
        }
    }

    pub fn config(&self) -> &BackoffConfig {
        &self.config
    }

    fn key(ip: &IpAddress) -> String {
        format!("backoff:{ip}")
    }

    /// Delay owed after `failures` consecutive failures.
    pub fn delay_for(&self, failures: u32) -> Duration {
        if failures == 0 {
            return Duration::ZERO;
        }
        let exponent = (failures - 1).min(31);
        self.config
            .base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.config.max_delay)
    }

    /// Delay owed by `ip` right now. Zero when disabled, unknown, idle, or the store fails.
    pub async fn required_delay(&self, ip: &IpAddress) -> Duration {
        if !self.config.enabled {
            return Duration::ZERO;
        }

        match self.store.get(&Self::key(ip)).await {
            Ok(Some(counter)) if !counter.is_expired_at(self.clock.now()) => {
                self.delay_for(counter.count)
            }
            Ok(_) => Duration::ZERO,
            Err(e) => {
                tracing::warn!(error = %e, ip = %ip, "Backoff store unavailable, skipping delay");
                Duration::ZERO
            }
        }
    }

    /// Suspend the current request for the delay `ip` owes. Returns the delay applied.
    pub async fn apply(&self, ip: &IpAddress) -> Duration {
        let delay = self.required_delay(ip).await;
        if !delay.is_zero() {
            tracing::debug!(ip = %ip, delay_ms = delay.as_millis() as u64, "Applying login backoff");
            self.delay.sleep(delay).await;
        }
        delay
    }

    /// Count a failure for `ip` and restart its inactivity horizon.
    pub async fn record_failure(&self, ip: &IpAddress) {
        if !self.config.enabled {
            return;
        }

        if let Err(e) = self
            .store
            .increment_sliding(&Self::key(ip), self.config.inactivity_horizon, self.clock.now())
            .await
        {
            tracing::warn!(error = %e, ip = %ip, "Failed to record backoff failure");
        }
    }

    /// Forget every failure for `ip`.
    pub async fn record_success(&self, ip: &IpAddress) {
        if let Err(e) = self.reset(ip).await {
            tracing::warn!(error = %e, ip = %ip, "Failed to reset backoff counter");
        }
    }

    pub async fn reset(&self, ip: &IpAddress) -> Result<(), Error> {
        self.store.delete(&Self::key(ip)).await
    }
}
