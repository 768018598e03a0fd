//! Per-IP sliding window on the login endpoint.
//!
//! Counters live in the injected [`CounterStore`]; see its module docs for the
//! per-process caveat. Store failures never block a login.

use std::sync::Arc;

use crate::{
    Clock, CounterStore, Error, IpAddress, LoginError, config::RateLimitConfig, lock::ceil_seconds,
};

pub struct RateLimiter {
    store: Arc<dyn CounterStore>,
    config: RateLimitConfig,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    pub fn new(
        store: Arc<dyn CounterStore>,
        config: RateLimitConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            config,
            clock,
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    fn key(ip: &IpAddress) -> String {
        format!("rate:{ip}")
    }

    /// Count this request against `ip` and reject it once the window is full.
    ///
    /// The first request in a window opens it for `config.window`. Later requests in the same
    /// window never move its end. `retry_after` is the time until the window resets, in whole
    /// seconds rounded up.
    pub async fn check(&self, ip: &IpAddress) -> Result<(), LoginError> {
        if !self.config.enabled {
            return Ok(());
        }

        let now = self.clock.now();
        let counter = match self
            .store
            .increment(&Self::key(ip), self.config.window, now)
            .await
        {
            Ok(counter) => counter,
            Err(e) => {
                tracing::warn!(error = %e, ip = %ip, "Rate limit store unavailable, allowing request");
                return Ok(());
            }
        };

        if counter.count > self.config.max_attempts {
            let retry_after = ceil_seconds(counter.expires_at - now).max(1);
            tracing::debug!(ip = %ip, count = counter.count, retry_after, "Rate limit exceeded");
            return Err(LoginError::RateLimited { retry_after });
        }

        Ok(())
    }

    /// Forget the window for `ip`.
    pub async fn reset(&self, ip: &IpAddress) -> Result<(), Error> {
        self.store.delete(&Self::key(ip)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MemoryCounterStore, clock::ManualClock, services::mock::BrokenCounterStore};
    use chrono::Duration;

    fn limiter(config: RateLimitConfig) -> (RateLimiter, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        let limiter = RateLimiter::new(Arc::new(MemoryCounterStore::new()), config, clock.clone());
        (limiter, clock)
    }

    fn ip(value: &str) -> IpAddress {
        IpAddress::create(value).unwrap()
    }

    #[tokio::test]
    async fn test_sixth_attempt_is_rejected() {
        let (limiter, _clock) = limiter(RateLimitConfig::default());
        let client = ip("203.0.113.7");

        for _ in 0..5 {
            limiter.check(&client).await.unwrap();
        }

        let result = limiter.check(&client).await;
        assert_eq!(result, Err(LoginError::RateLimited { retry_after: 900 }));
    }

    #[tokio::test]
    async fn test_retry_after_counts_down_to_window_reset() {
        let (limiter, clock) = limiter(RateLimitConfig::default());
        let client = ip("203.0.113.7");

        for _ in 0..5 {
            limiter.check(&client).await.unwrap();
        }
        clock.advance(Duration::minutes(10) + Duration::milliseconds(500));

        let result = limiter.check(&client).await;
        assert_eq!(result, Err(LoginError::RateLimited { retry_after: 300 }));
    }

    #[tokio::test]
    async fn test_window_resets_after_expiry() {
        let (limiter, clock) = limiter(RateLimitConfig::default());
        let client = ip("203.0.113.7");

        for _ in 0..6 {
            let _ = limiter.check(&client).await;
        }
        clock.advance(Duration::minutes(15));

        assert!(limiter.check(&client).await.is_ok());
    }

    #[tokio::test]
    async fn test_ips_are_counted_separately() {
        let (limiter, _clock) = limiter(RateLimitConfig::default());

        for _ in 0..5 {
            limiter.check(&ip("10.0.0.1")).await.unwrap();
        }

        assert!(limiter.check(&ip("10.0.0.1")).await.is_err());
        assert!(limiter.check(&ip("10.0.0.2")).await.is_ok());
    }

    #[tokio::test]
    async fn test_disabled_limiter_allows_everything() {
        let (limiter, _clock) = limiter(RateLimitConfig::disabled());
        assert!(!limiter.is_enabled());

        for _ in 0..20 {
            limiter.check(&ip("10.0.0.1")).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_reset_clears_window() {
        let (limiter, _clock) = limiter(RateLimitConfig::default());
        let client = ip("10.0.0.1");
        for _ in 0..6 {
            let _ = limiter.check(&client).await;
        }

        limiter.reset(&client).await.unwrap();

        assert!(limiter.check(&client).await.is_ok());
    }

    #[tokio::test]
    async fn test_store_failure_fails_open() {
        let limiter = RateLimiter::new(
            Arc::new(BrokenCounterStore),
            RateLimitConfig::default(),
            Arc::new(ManualClock::default()),
        );

        for _ in 0..10 {
            assert!(limiter.check(&ip("10.0.0.1")).await.is_ok());
        }
    }
}
