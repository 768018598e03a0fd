//! Command line and environment configuration.
//!
//! Every policy knob is a flag with a `BASTION_*` environment fallback. Defaults match
//! `BastionConfig::default()`.

use std::net::SocketAddr;

use bastion::{
    BastionConfig,
    config::{
        BackoffConfig, BruteForceConfig, LockoutConfig, RateLimitConfig, RetentionConfig,
    },
};
use chrono::Duration;
use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "bastion-server")]
#[command(author, version, about = "Login endpoint with rate limiting, backoff and lockout")]
pub struct Cli {
    /// SQLite connection URL
    #[arg(
        long,
        env = "BASTION_DATABASE_URL",
        default_value = "sqlite://bastion.db?mode=rwc",
        global = true
    )]
    pub database_url: String,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, env = "BASTION_LOG", default_value = "info", global = true)]
    pub log_level: String,

    #[command(flatten)]
    pub policy: PolicyArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Apply migrations and serve the HTTP API
    Serve(ServeArgs),

    /// Apply pending migrations and exit
    Migrate,

    /// Run one cleanup pass and exit
    Sweep,

    /// Create a user with a password
    CreateUser {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long, env = "BASTION_NEW_USER_PASSWORD")]
        password: String,
    },

    /// Release every active lock on an identifier
    Unlock {
        #[arg(long)]
        identifier: String,
    },
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    #[arg(long, env = "BASTION_LISTEN", default_value = "0.0.0.0:3000")]
    pub listen: SocketAddr,

    /// Take the client IP from X-Forwarded-For. Only behind a trusted proxy.
    #[arg(long, env = "BASTION_TRUST_FORWARDED_HEADERS", default_value_t = false)]
    pub trust_forwarded_headers: bool,
}

#[derive(Args, Debug)]
pub struct PolicyArgs {
    /// Secret salt for identifier hashes
    #[arg(long, env = "BASTION_IDENTIFIER_SALT", hide_env_values = true, global = true)]
    pub identifier_salt: Option<String>,

    #[arg(long, env = "BASTION_RATE_LIMIT_ENABLED", default_value_t = true, global = true)]
    pub rate_limit_enabled: bool,

    #[arg(long, env = "BASTION_RATE_LIMIT_MAX_ATTEMPTS", default_value_t = 5, global = true)]
    pub rate_limit_max_attempts: u32,

    #[arg(long, env = "BASTION_RATE_LIMIT_WINDOW_SECS", default_value_t = 900, global = true)]
    pub rate_limit_window_secs: i64,

    #[arg(long, env = "BASTION_BACKOFF_ENABLED", default_value_t = true, global = true)]
    pub backoff_enabled: bool,

    #[arg(long, env = "BASTION_BACKOFF_BASE_MS", default_value_t = 500, global = true)]
    pub backoff_base_ms: u64,

    #[arg(long, env = "BASTION_BACKOFF_MAX_MS", default_value_t = 2000, global = true)]
    pub backoff_max_ms: u64,

    #[arg(long, env = "BASTION_BACKOFF_HORIZON_SECS", default_value_t = 900, global = true)]
    pub backoff_horizon_secs: i64,

    #[arg(long, env = "BASTION_LOCKOUT_ENABLED", default_value_t = true, global = true)]
    pub lockout_enabled: bool,

    #[arg(long, env = "BASTION_LOCKOUT_MAX_FAILURES", default_value_t = 5, global = true)]
    pub lockout_max_failures: u32,

    #[arg(long, env = "BASTION_LOCKOUT_WINDOW_SECS", default_value_t = 900, global = true)]
    pub lockout_window_secs: i64,

    #[arg(long, env = "BASTION_LOCKOUT_DURATION_SECS", default_value_t = 900, global = true)]
    pub lockout_duration_secs: i64,

    #[arg(long, env = "BASTION_BRUTE_FORCE_ENABLED", default_value_t = true, global = true)]
    pub brute_force_enabled: bool,

    #[arg(long, env = "BASTION_BRUTE_FORCE_WINDOW_SECS", default_value_t = 900, global = true)]
    pub brute_force_window_secs: i64,

    #[arg(long, env = "BASTION_SPRAY_THRESHOLD", default_value_t = 10, global = true)]
    pub spray_threshold: u32,

    #[arg(long, env = "BASTION_SPRAY_MIN_IDENTIFIERS", default_value_t = 3, global = true)]
    pub spray_min_identifiers: u32,

    #[arg(long, env = "BASTION_SEVERITY_MEDIUM", default_value_t = 20, global = true)]
    pub severity_medium: u32,

    #[arg(long, env = "BASTION_SEVERITY_HIGH", default_value_t = 30, global = true)]
    pub severity_high: u32,

    #[arg(long, env = "BASTION_SEVERITY_CRITICAL", default_value_t = 50, global = true)]
    pub severity_critical: u32,

    #[arg(long, env = "BASTION_ATTEMPT_RETENTION_DAYS", default_value_t = 30, global = true)]
    pub attempt_retention_days: i64,

    #[arg(long, env = "BASTION_LOCK_RETENTION_DAYS", default_value_t = 90, global = true)]
    pub lock_retention_days: i64,

    #[arg(long, env = "BASTION_CLEANUP_INTERVAL_SECS", default_value_t = 3600, global = true)]
    pub cleanup_interval_secs: u64,
}

impl PolicyArgs {
    pub fn to_config(&self) -> BastionConfig {
        let mut config = BastionConfig::default()
            .with_rate_limit(RateLimitConfig {
                enabled: self.rate_limit_enabled,
                max_attempts: self.rate_limit_max_attempts,
                window: Duration::seconds(self.rate_limit_window_secs),
            })
            .with_backoff(BackoffConfig {
                enabled: self.backoff_enabled,
                base_delay: std::time::Duration::from_millis(self.backoff_base_ms),
                max_delay: std::time::Duration::from_millis(self.backoff_max_ms),
                inactivity_horizon: Duration::seconds(self.backoff_horizon_secs),
            })
            .with_lockout(LockoutConfig {
                enabled: self.lockout_enabled,
                max_failed_attempts: self.lockout_max_failures,
                window: Duration::seconds(self.lockout_window_secs),
                lock_duration: Duration::seconds(self.lockout_duration_secs),
            })
            .with_brute_force(BruteForceConfig {
                enabled: self.brute_force_enabled,
                window: Duration::seconds(self.brute_force_window_secs),
                spray_threshold: self.spray_threshold,
                min_distinct_identifiers: self.spray_min_identifiers,
                medium_threshold: self.severity_medium,
                high_threshold: self.severity_high,
                critical_threshold: self.severity_critical,
            })
            .with_retention(RetentionConfig {
                attempt_retention: Duration::days(self.attempt_retention_days),
                lock_retention: Duration::days(self.lock_retention_days),
                cleanup_interval: std::time::Duration::from_secs(self.cleanup_interval_secs.max(1)),
            });

        if let Some(salt) = &self.identifier_salt {
            config = config.with_identifier_salt(salt.clone());
        }

        config
    }
}
