//! Policy configuration
//!
//! Every threshold the pipeline enforces lives here. Defaults are the documented fallbacks;
//! deployments override them through [`BastionConfig`] rather than editing business logic.

use chrono::Duration;

use crate::crypto::DEFAULT_IDENTIFIER_SALT;

/// Per-IP sliding window on the login endpoint.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub enabled: bool,
    /// Attempts allowed per window. The next one is rejected.
    pub max_attempts: u32,
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: 5,
            window: Duration::minutes(15),
        }
    }
}

impl RateLimitConfig {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Three attempts per half hour.
    pub fn strict() -> Self {
        Self {
            enabled: true,
            max_attempts: 3,
            window: Duration::minutes(30),
        }
    }
}

/// Progressive delay applied to IPs with recent failures.
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    pub enabled: bool,
    /// Delay after the first failure; doubled for each further failure.
    pub base_delay: std::time::Duration,
    pub max_delay: std::time::Duration,
    /// Counters idle for longer than this are forgotten.
    pub inactivity_horizon: Duration,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_delay: std::time::Duration::from_millis(500),
            max_delay: std::time::Duration::from_millis(2000),
            inactivity_horizon: Duration::minutes(15),
        }
    }
}

impl BackoffConfig {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }
}

/// Identifier-level lockout.
#[derive(Debug, Clone)]
pub struct LockoutConfig {
    pub enabled: bool,
    /// Failures for one identifier within `window` that create a lock.
    pub max_failed_attempts: u32,
    pub window: Duration,
    pub lock_duration: Duration,
}

impl Default for LockoutConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_failed_attempts: 5,
            window: Duration::minutes(15),
            lock_duration: Duration::minutes(15),
        }
    }
}

impl LockoutConfig {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Lock after three failures in an hour, for one hour.
    pub fn strict() -> Self {
        Self {
            enabled: true,
            max_failed_attempts: 3,
            window: Duration::hours(1),
            lock_duration: Duration::hours(1),
        }
    }
}

/// IP-level credential spraying detection.
#[derive(Debug, Clone)]
pub struct BruteForceConfig {
    pub enabled: bool,
    pub window: Duration,
    /// Attempts from one IP within `window` before an event is considered.
    pub spray_threshold: u32,
    /// The attempts must span at least this many distinct identifiers.
    pub min_distinct_identifiers: u32,
    pub medium_threshold: u32,
    pub high_threshold: u32,
    pub critical_threshold: u32,
}

impl Default for BruteForceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window: Duration::minutes(15),
            spray_threshold: 10,
            min_distinct_identifiers: 3,
            medium_threshold: 20,
            high_threshold: 30,
            critical_threshold: 50,
        }
    }
}

/// How long durable records are kept and how often sweeps run.
#[derive(Debug, Clone)]
pub struct RetentionConfig {
    pub attempt_retention: Duration,
    /// Released locks older than this are deleted.
    pub lock_retention: Duration,
    pub cleanup_interval: std::time::Duration,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            attempt_retention: Duration::days(30),
            lock_retention: Duration::days(90),
            cleanup_interval: std::time::Duration::from_secs(3600),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BastionConfig {
    pub identifier_salt: String,
    pub rate_limit: RateLimitConfig,
    pub backoff: BackoffConfig,
    pub lockout: LockoutConfig,
    pub brute_force: BruteForceConfig,
    pub retention: RetentionConfig,
}

impl Default for BastionConfig {
    fn default() -> Self {
        Self {
            identifier_salt: DEFAULT_IDENTIFIER_SALT.to_string(),
            rate_limit: RateLimitConfig::default(),
            backoff: BackoffConfig::default(),
            lockout: LockoutConfig::default(),
            brute_force: BruteForceConfig::default(),
            retention: RetentionConfig::default(),
        }
    }
}

impl BastionConfig {
    pub fn with_identifier_salt(mut self, salt: impl Into<String>) -> Self {
        self.identifier_salt = salt.into();
        self
    }

    pub fn with_rate_limit(mut self, config: RateLimitConfig) -> Self {
        self.rate_limit = config;
        self
    }

    pub fn with_backoff(mut self, config: BackoffConfig) -> Self {
        self.backoff = config;
        self
    }

    pub fn with_lockout(mut self, config: LockoutConfig) -> Self {
        self.lockout = config;
        self
    }

    pub fn with_brute_force(mut self, config: BruteForceConfig) -> Self {
        self.brute_force = config;
        self
    }

    pub fn with_retention(mut self, config: RetentionConfig) -> Self {
        self.retention = config;
        self
    }
}
