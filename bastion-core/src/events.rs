use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::{IpAddress, UserId, error::EventError};

/// Reason why a lock was released.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UnlockReason {
    /// Lock period ran out and the sweep stamped it released
    LockoutExpired,
    /// Administrator manually released the lock
    AdminAction,
    /// The account owner proved control, e.g. by resetting the password
    PasswordReset,
}

/// Severity of a brute-force detection, ordered from least to most urgent.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Security events emitted by the login pipeline
///
/// Each variant carries its own typed fields. Identifiers only ever appear hashed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    LoginSucceeded {
        user_id: UserId,
        identifier_hash: String,
        ip_address: IpAddress,
        timestamp: DateTime<Utc>,
    },

    /// Emitted for every refused attempt that reached credential verification.
    LoginFailed {
        identifier_hash: String,
        /// Failures for this identifier in the lockout window, this one included
        failed_attempts: u32,
        ip_address: IpAddress,
        timestamp: DateTime<Utc>,
    },

    /// Emitted when an identifier crosses the lockout threshold.
    ///
    /// This is a security-critical event that should trigger alerts.
    AccountLocked {
        lock_id: String,
        identifier_hash: String,
        user_id: Option<UserId>,
        /// Failures in the window that triggered the lock
        failure_count: u32,
        locked_until: DateTime<Utc>,
        ip_address: Option<IpAddress>,
        timestamp: DateTime<Utc>,
    },

    AccountUnlocked {
        user_id: Option<UserId>,
        identifier_hash: Option<String>,
        /// Number of lock rows released
        released: u64,
        reason: UnlockReason,
        timestamp: DateTime<Utc>,
    },

    /// Emitted when one IP sprays attempts across many identifiers.
    BruteForceDetected {
        ip_address: IpAddress,
        attempt_count: u32,
        failed_attempts: u32,
        distinct_identifiers: u32,
        severity: Severity,
        window_seconds: i64,
        timestamp: DateTime<Utc>,
    },

    RateLimitExceeded {
        ip_address: IpAddress,
        retry_after: u64,
        timestamp: DateTime<Utc>,
    },
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::LoginSucceeded { .. } => "login_succeeded",
            Event::LoginFailed { .. } => "login_failed",
            Event::AccountLocked { .. } => "account_locked",
            Event::AccountUnlocked { .. } => "account_unlocked",
            Event::BruteForceDetected { .. } => "brute_force_detected",
            Event::RateLimitExceeded { .. } => "rate_limit_exceeded",
        }
    }
}

/// A trait for handling events emitted by the event bus
///
/// Implementors of this trait can be registered with the [`EventBus`] to receive and process
/// events. The handler is called asynchronously for each event emitted.
#[async_trait]
pub trait EventHandler: Send + Sync + 'static {
    async fn handle_event(&self, event: &Event) -> Result<(), EventError>;
}

/// Event bus that fans events out to registered handlers
///
/// # Examples
///
/// ```
/// # use std::sync::Arc;
/// # use bastion_core::events::{EventBus, LoggingEventHandler};
/// # async fn example() {
/// let event_bus = EventBus::new();
/// event_bus.register(Arc::new(LoggingEventHandler)).await;
/// # }
/// ```
#[derive(Clone)]
pub struct EventBus {
    handlers: Arc<RwLock<Vec<Arc<dyn EventHandler>>>>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub async fn register(&self, handler: Arc<dyn EventHandler>) {
        self.handlers.write().await.push(handler);
    }

    /// Emit an event to all registered handlers, stopping at the first error
    pub async fn emit(&self, event: &Event) -> Result<(), EventError> {
        for handler in self.handlers.read().await.iter() {
            handler.handle_event(event).await?;
        }

        Ok(())
    }

    /// Emit an event and log instead of returning a handler failure.
    ///
    /// Used on the login path, where a broken audit sink must not change the response.
    pub async fn publish(&self, event: Event) {
        if let Err(e) = self.emit(&event).await {
            tracing::warn!(error = %e, event = event.name(), "Failed to dispatch security event");
        }
    }
}

/// Writes every event to the `tracing` log at a level matching its urgency.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingEventHandler;

#[async_trait]
impl EventHandler for LoggingEventHandler {
    async fn handle_event(&self, event: &Event) -> Result<(), EventError> {
        match event {
            Event::LoginSucceeded {
                user_id,
                ip_address,
                ..
            } => {
                tracing::info!(user_id = %user_id, ip = %ip_address, "Login succeeded");
            }
            Event::LoginFailed {
                identifier_hash,
                failed_attempts,
                ip_address,
                ..
            } => {
                tracing::info!(
                    identifier_hash = %identifier_hash,
                    failed_attempts,
                    ip = %ip_address,
                    "Login failed"
                );
            }
            Event::AccountLocked {
                lock_id,
                identifier_hash,
                failure_count,
                locked_until,
                ..
            } => {
                tracing::warn!(
                    lock_id = %lock_id,
                    identifier_hash = %identifier_hash,
                    failure_count,
                    locked_until = %locked_until,
                    "Account locked"
                );
            }
            Event::AccountUnlocked {
                released, reason, ..
            } => {
                tracing::info!(released, reason = ?reason, "Account unlocked");
            }
            Event::BruteForceDetected {
                ip_address,
                attempt_count,
                failed_attempts,
                distinct_identifiers,
                severity,
                ..
            } => {
                tracing::warn!(
                    ip = %ip_address,
                    attempt_count,
                    failed_attempts,
                    distinct_identifiers,
                    severity = %severity,
                    "Brute force detected"
                );
            }
            Event::RateLimitExceeded {
                ip_address,
                retry_after,
                ..
            } => {
                tracing::info!(ip = %ip_address, retry_after, "Login rate limit exceeded");
            }
        }
        Ok(())
    }
}

/// Keeps every event in memory, for assertions.
#[derive(Debug, Default)]
pub struct RecordingEventHandler {
    events: RwLock<Vec<Event>>,
}

impl RecordingEventHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn events(&self) -> Vec<Event> {
        self.events.read().await.clone()
    }
}

#[async_trait]
impl EventHandler for RecordingEventHandler {
    async fn handle_event(&self, event: &Event) -> Result<(), EventError> {
        self.events.write().await.push(event.clone());
        Ok(())
    }
}
