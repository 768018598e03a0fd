//! # Bastion
//!
//! Bastion guards a password login endpoint against credential stuffing and brute force.
//! Every attempt passes through the same pipeline:
//!
//! 1. a per-IP sliding-window rate limit
//! 2. a progressive server-side delay for IPs with recent failures
//! 3. an identifier lock check
//! 4. credential verification
//! 5. an append to the attempt ledger, followed on failure by brute-force detection
//!
//! Failures never reveal whether the identifier exists.
//!
//! ## Storage Support
//!
//! Bastion ships with a SQLite backend. Any type implementing
//! [`RepositoryProvider`] can be plugged in instead.
//!
//! ## Example
//!
//! ```rust,no_run
//! use bastion::{Bastion, BastionConfig, IpAddress, LoginRequest};
//! use bastion_storage_sqlite::SqliteRepositoryProvider;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let pool = sqlx::SqlitePool::connect("sqlite::memory:").await.unwrap();
//!     let repositories = Arc::new(SqliteRepositoryProvider::new(pool));
//!
//!     let bastion = Bastion::new(repositories, BastionConfig::default());
//!     bastion.migrate().await.unwrap();
//!
//!     let request = LoginRequest::new("carol", "correct-horse", IpAddress::create("10.0.0.1").unwrap());
//!     let _ = bastion.login(request).await;
//! }
//! ```
pub mod builder;

use std::sync::Arc;

use bastion_core::{
    IdentifierHasher, LoginCredentials, NewUser,
    repositories::{
        AccountLockRepositoryAdapter, LoginAttemptRepository, LoginAttemptRepositoryAdapter,
        PasswordRepository, PasswordRepositoryAdapter, UserRepository, UserRepositoryAdapter,
    },
    services::{Authenticator, BackoffService, BruteForceDetector, LockService, RateLimiter},
};
use chrono::{DateTime, Utc};
use tokio::{sync::watch, task::JoinHandle};

/// Re-export core types from bastion_core
///
/// These types are commonly used when working with the Bastion API.
pub use bastion_core::{
    AccountLock, Argon2PasswordVerifier, BastionConfig, Clock, CounterStore, Delay, Event,
    EventBus, EventHandler, FailureReason, IpAddress, LoggingEventHandler, LoginAttempt,
    LoginError, MemoryCounterStore, PasswordVerifier, RepositoryProvider, Severity,
    SystemClock, TokioDelay, UnlockReason, User, UserId, config,
    error::ValidationError,
};

pub use builder::{BastionBuilder, BastionBuilderError};

/// Re-export storage backends
///
/// These storage implementations are available when the corresponding feature is enabled.
#[cfg(feature = "sqlite")]
pub use bastion_storage_sqlite::SqliteRepositoryProvider;

const LOGIN_SUCCESS_MESSAGE: &str = "Login successful";

/// Errors returned by the management side of the facade.
///
/// The login path never returns these; it speaks only [`LoginError`].
#[derive(Debug, thiserror::Error)]
pub enum BastionError {
    /// Error when interacting with storage
    #[error("Storage error: {0}")]
    StorageError(String),
    /// Input rejected before it reached storage
    #[error("Validation error: {0}")]
    ValidationError(String),
    /// Password hashing failed
    #[error("Crypto error: {0}")]
    CryptoError(String),
}

impl From<bastion_core::Error> for BastionError {
    fn from(e: bastion_core::Error) -> Self {
        match e {
            bastion_core::Error::Validation(e) => BastionError::ValidationError(e.to_string()),
            bastion_core::Error::Crypto(e) => BastionError::CryptoError(e.to_string()),
            e => BastionError::StorageError(e.to_string()),
        }
    }
}

/// One inbound login request, as the HTTP layer hands it over.
#[derive(Clone)]
pub struct LoginRequest {
    pub identifier: String,
    pub password: String,
    pub ip_address: IpAddress,
    pub user_agent: Option<String>,
    pub device_id: Option<String>,
}

impl LoginRequest {
    pub fn new(
        identifier: impl Into<String>,
        password: impl Into<String>,
        ip_address: IpAddress,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            password: password.into(),
            ip_address,
            user_agent: None,
            device_id: None,
        }
    }

    pub fn with_user_agent(mut self, user_agent: Option<String>) -> Self {
        self.user_agent = user_agent;
        self
    }

    pub fn with_device_id(mut self, device_id: Option<String>) -> Self {
        self.device_id = device_id;
        self
    }
}

impl std::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRequest")
            .field("identifier", &"[REDACTED]")
            .field("password", &"[REDACTED]")
            .field("ip_address", &self.ip_address)
            .field("user_agent", &self.user_agent)
            .field("device_id", &self.device_id)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginSuccess {
    pub user_id: UserId,
    pub username: String,
    pub message: String,
}

/// Counts from one maintenance pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub released_locks: u64,
    pub deleted_locks: u64,
    pub deleted_attempts: u64,
    pub expired_counters: u64,
}

type Attempts<R> = LoginAttemptRepositoryAdapter<R>;
type Locks<R> = AccountLockRepositoryAdapter<R>;

/// The login defense pipeline
///
/// This is the main entry point. It owns every policy service and runs them in order for
/// each [`LoginRequest`].
///
/// # Example
///
/// ```rust,no_run
/// use bastion::{Bastion, BastionConfig, SqliteRepositoryProvider};
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = sqlx::SqlitePool::connect("sqlite::memory:").await?;
/// let bastion = Bastion::new(
///     Arc::new(SqliteRepositoryProvider::new(pool)),
///     BastionConfig::default(),
/// );
/// bastion.migrate().await?;
/// bastion.create_user("carol", "carol@example.test", "correct-horse").await?;
/// # Ok(())
/// # }
/// ```
pub struct Bastion<R: RepositoryProvider> {
    repositories: Arc<R>,
    config: BastionConfig,
    hasher: IdentifierHasher,
    clock: Arc<dyn Clock>,
    counters: Arc<dyn CounterStore>,
    event_bus: EventBus,
    users: Arc<UserRepositoryAdapter<R>>,
    passwords: Arc<PasswordRepositoryAdapter<R>>,
    attempts: Arc<Attempts<R>>,
    rate_limiter: RateLimiter,
    backoff: BackoffService,
    locks: Arc<LockService<Locks<R>>>,
    detector: BruteForceDetector<Attempts<R>, Locks<R>>,
    authenticator: Authenticator<UserRepositoryAdapter<R>, PasswordRepositoryAdapter<R>>,
}

impl<R: RepositoryProvider> Bastion<R> {
    /// Create a new Bastion instance with the system clock, real sleeps, an in-memory counter
    /// store and Argon2 password verification.
    ///
    /// Use [`BastionBuilder`] to swap any of those.
    pub fn new(repositories: Arc<R>, config: BastionConfig) -> Self {
        BastionBuilder::new()
            .with_repositories(repositories)
            .with_config(config)
            .build_sync()
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn assemble(
        repositories: Arc<R>,
        config: BastionConfig,
        clock: Arc<dyn Clock>,
        delay: Arc<dyn Delay>,
        counters: Arc<dyn CounterStore>,
        verifier: Arc<dyn PasswordVerifier>,
        event_bus: EventBus,
    ) -> Self {
        let users = Arc::new(UserRepositoryAdapter::new(repositories.clone()));
        let passwords = Arc::new(PasswordRepositoryAdapter::new(repositories.clone()));
        let attempts = Arc::new(LoginAttemptRepositoryAdapter::new(repositories.clone()));
        let lock_repository = Arc::new(AccountLockRepositoryAdapter::new(repositories.clone()));

        let locks = Arc::new(
            LockService::new(lock_repository, clock.clone()).with_event_bus(event_bus.clone()),
        );
        let rate_limiter =
            RateLimiter::new(counters.clone(), config.rate_limit.clone(), clock.clone());
        let backoff = BackoffService::new(
            counters.clone(),
            config.backoff.clone(),
            clock.clone(),
            delay,
        );
        let detector = BruteForceDetector::new(
            attempts.clone(),
            locks.clone(),
            config.lockout.clone(),
            config.brute_force.clone(),
            clock.clone(),
        );
        let authenticator = Authenticator::new(users.clone(), passwords.clone(), verifier);

        Self {
            hasher: IdentifierHasher::new(config.identifier_salt.clone()),
            repositories,
            config,
            clock,
            counters,
            event_bus,
            users,
            passwords,
            attempts,
            rate_limiter,
            backoff,
            locks,
            detector,
            authenticator,
        }
    }

    pub fn config(&self) -> &BastionConfig {
        &self.config
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Hash an identifier the way the ledger and lock tables store it.
    pub fn hash_identifier(&self, identifier: &str) -> String {
        self.hasher.hash(identifier.trim())
    }

    /// Apply pending storage migrations.
    pub async fn migrate(&self) -> Result<(), BastionError> {
        self.repositories
            .migrate()
            .await
            .map_err(|e| BastionError::StorageError(e.to_string()))
    }

    /// Check that storage is reachable.
    pub async fn health_check(&self) -> Result<(), BastionError> {
        self.repositories
            .health_check()
            .await
            .map_err(|e| BastionError::StorageError(e.to_string()))
    }

    /// Register a user with a password.
    pub async fn create_user(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<User, BastionError> {
        let new_user = NewUser::builder().username(username).email(email).build()?;
        let hash = self.authenticator.verifier().hash(password)?;

        let user = self.users.create(new_user).await?;
        self.passwords.set_password_hash(&user.id, &hash).await?;

        tracing::info!(user_id = %user.id, "User created");
        Ok(user)
    }

    /// Replace a user's password. Any lock on the user is released as a password reset.
    pub async fn set_password(&self, user_id: &UserId, password: &str) -> Result<(), BastionError> {
        let hash = self.authenticator.verifier().hash(password)?;
        self.passwords.set_password_hash(user_id, &hash).await?;
        self.locks.release(user_id, UnlockReason::PasswordReset).await?;
        Ok(())
    }

    pub async fn get_user(&self, user_id: &UserId) -> Result<Option<User>, BastionError> {
        Ok(self.users.find_by_id(user_id).await?)
    }

    /// Run one login request through the pipeline.
    pub async fn login(&self, request: LoginRequest) -> Result<LoginSuccess, LoginError> {
        let ip = &request.ip_address;

        if let Err(e) = self.rate_limiter.check(ip).await {
            if let LoginError::RateLimited { retry_after } = &e {
                self.event_bus
                    .publish(Event::RateLimitExceeded {
                        ip_address: ip.clone(),
                        retry_after: *retry_after,
                        timestamp: self.clock.now(),
                    })
                    .await;
            }
            return Err(e);
        }

        self.backoff.apply(ip).await;

        let credentials = LoginCredentials::create(&request.identifier, &request.password)?;
        let identifier_hash = self.hasher.hash(credentials.identifier());

        match self.locks.remaining_seconds(&identifier_hash, None).await {
            Ok(Some(lock_duration)) => {
                self.record_refusal(&request, &credentials, None, FailureReason::AccountLocked)
                    .await;
                return Err(LoginError::AccountLocked { lock_duration });
            }
            Ok(None) => {}
            Err(e) => {
                tracing::error!(error = %e, "Failed to read lock state");
                return Err(LoginError::Internal);
            }
        }

        match self.authenticator.authenticate(&credentials).await {
            Some(user) => self.succeed(&request, &credentials, user).await,
            None => Err(self.fail(&request, &credentials).await),
        }
    }

    async fn succeed(
        &self,
        request: &LoginRequest,
        credentials: &LoginCredentials,
        user: User,
    ) -> Result<LoginSuccess, LoginError> {
        let ip = &request.ip_address;
        let identifier_hash = self.hasher.hash(credentials.identifier());

        // The identifier check above only sees locks keyed by what was typed; a lock taken
        // under the user's other identifier is attached to the user id.
        match self
            .locks
            .remaining_seconds(&identifier_hash, Some(&user.id))
            .await
        {
            Ok(Some(lock_duration)) => {
                self.record_refusal(
                    request,
                    credentials,
                    Some(user.id.clone()),
                    FailureReason::AccountLocked,
                )
                .await;
                return Err(LoginError::AccountLocked { lock_duration });
            }
            Ok(None) => {}
            Err(e) => {
                tracing::error!(error = %e, user_id = %user.id, "Failed to read lock state");
                return Err(LoginError::Internal);
            }
        }

        let now = self.clock.now();
        let attempt = LoginAttempt::succeeded(
            &self.hasher,
            credentials.identifier(),
            ip.clone(),
            user.id.clone(),
            now,
        )
        .with_user_agent(request.user_agent.clone())
        .with_device_id(request.device_id.clone());
        if let Err(e) = self.attempts.save(&attempt).await {
            tracing::error!(error = %e, user_id = %user.id, "Failed to record login attempt");
        }

        self.backoff.record_success(ip).await;

        self.event_bus
            .publish(Event::LoginSucceeded {
                user_id: user.id.clone(),
                identifier_hash,
                ip_address: ip.clone(),
                timestamp: now,
            })
            .await;

        Ok(LoginSuccess {
            user_id: user.id,
            username: user.username,
            message: LOGIN_SUCCESS_MESSAGE.to_string(),
        })
    }

    async fn fail(&self, request: &LoginRequest, credentials: &LoginCredentials) -> LoginError {
        let ip = &request.ip_address;
        let now = self.clock.now();

        // Known accounts get their id on the row so a resulting lock covers every identifier.
        let user_id = self.authenticator.resolve(credentials).await;
        let attempt = self
            .record_refusal(request, credentials, user_id, FailureReason::InvalidCredentials)
            .await;
        self.backoff.record_failure(ip).await;

        let detection = match self.detector.evaluate(&attempt).await {
            Ok(detection) => detection,
            Err(e) => {
                tracing::error!(error = %e, ip = %ip, "Brute force evaluation failed");
                Default::default()
            }
        };

        self.event_bus
            .publish(Event::LoginFailed {
                identifier_hash: attempt.identifier_hash.clone(),
                failed_attempts: detection.failed_attempts,
                ip_address: ip.clone(),
                timestamp: now,
            })
            .await;
        for event in detection.events(now, self.config.brute_force.window.num_seconds()) {
            self.event_bus.publish(event).await;
        }

        match detection.lock {
            Some(lock) => LoginError::AccountLocked {
                lock_duration: lock.remaining_seconds_at(now),
            },
            None => LoginError::InvalidCredentials,
        }
    }

    /// Append a failed attempt to the ledger. Storage errors are logged, not returned.
    async fn record_refusal(
        &self,
        request: &LoginRequest,
        credentials: &LoginCredentials,
        user_id: Option<UserId>,
        reason: FailureReason,
    ) -> LoginAttempt {
        let mut attempt = LoginAttempt::failed(
            &self.hasher,
            credentials.identifier(),
            request.ip_address.clone(),
            reason,
            self.clock.now(),
        )
        .with_user_agent(request.user_agent.clone())
        .with_device_id(request.device_id.clone());
        attempt.user_id = user_id;

        match self.attempts.save(&attempt).await {
            Ok(saved) => saved,
            Err(e) => {
                tracing::error!(
                    error = %e,
                    ip = %request.ip_address,
                    reason = %reason,
                    "Failed to record login attempt"
                );
                attempt
            }
        }
    }

    /// Release every active lock held by a user.
    pub async fn unlock_user(
        &self,
        user_id: &UserId,
        reason: UnlockReason,
    ) -> Result<u64, BastionError> {
        Ok(self.locks.release(user_id, reason).await?)
    }

    /// Release every active lock on an identifier, whether or not it names a real user.
    pub async fn unlock_identifier(
        &self,
        identifier: &str,
        reason: UnlockReason,
    ) -> Result<u64, BastionError> {
        let identifier_hash = self.hash_identifier(identifier);
        Ok(self
            .locks
            .release_by_identifier(&identifier_hash, reason)
            .await?)
    }

    /// Forget an IP's rate-limit window and backoff counter, e.g. after clearing a false
    /// positive. Ledger rows and locks are untouched.
    pub async fn reset_ip(&self, ip: &IpAddress) -> Result<(), BastionError> {
        self.rate_limiter.reset(ip).await?;
        self.backoff.reset(ip).await?;
        tracing::info!(ip = %ip, "Reset IP throttling");
        Ok(())
    }

    /// Whether an identifier is currently locked.
    pub async fn is_locked(&self, identifier: &str) -> Result<bool, BastionError> {
        let identifier_hash = self.hash_identifier(identifier);
        Ok(self.locks.is_locked_by_identifier(&identifier_hash).await?)
    }

    pub async fn active_lock(&self, identifier: &str) -> Result<Option<AccountLock>, BastionError> {
        let identifier_hash = self.hash_identifier(identifier);
        Ok(self.locks.active_lock_for(&identifier_hash, None).await?)
    }

    /// Most recent ledger entries from an IP, newest first.
    pub async fn recent_attempts_by_ip(
        &self,
        ip: &IpAddress,
        limit: u32,
    ) -> Result<Vec<LoginAttempt>, BastionError> {
        Ok(self.attempts.find_recent_by_ip(ip, limit).await?)
    }

    /// Most recent ledger entries for an identifier, newest first.
    pub async fn recent_attempts_by_identifier(
        &self,
        identifier: &str,
        limit: u32,
    ) -> Result<Vec<LoginAttempt>, BastionError> {
        let identifier_hash = self.hash_identifier(identifier);
        Ok(self
            .attempts
            .find_recent_by_identifier(&identifier_hash, limit)
            .await?)
    }

    /// Run one maintenance pass now.
    pub async fn sweep(&self) -> Result<SweepReport, BastionError> {
        Ok(Maintenance::from(self).run().await?)
    }

    /// Start a background task that runs [`Bastion::sweep`] on the configured interval.
    ///
    /// The task stops once `shutdown` carries `true` or its sender is dropped.
    pub fn start_cleanup_task(&self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        let maintenance = Maintenance::from(self);
        let interval = self.config.retention.cleanup_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            tracing::info!(interval_secs = interval.as_secs(), "Starting cleanup task");

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = maintenance.run().await {
                            tracing::error!(error = %e, "Cleanup pass failed");
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            tracing::info!("Cleanup task shutting down");
                            break;
                        }
                    }
                }
            }
        })
    }
}

/// The pieces a sweep needs, detached from the facade so it can move into a task.
struct Maintenance<R: RepositoryProvider> {
    locks: Arc<LockService<Locks<R>>>,
    attempts: Arc<Attempts<R>>,
    counters: Arc<dyn CounterStore>,
    clock: Arc<dyn Clock>,
    retention: config::RetentionConfig,
}

impl<R: RepositoryProvider> From<&Bastion<R>> for Maintenance<R> {
    fn from(bastion: &Bastion<R>) -> Self {
        Self {
            locks: bastion.locks.clone(),
            attempts: bastion.attempts.clone(),
            counters: bastion.counters.clone(),
            clock: bastion.clock.clone(),
            retention: bastion.config.retention.clone(),
        }
    }
}

impl<R: RepositoryProvider> Maintenance<R> {
    async fn run(&self) -> Result<SweepReport, bastion_core::Error> {
        let now: DateTime<Utc> = self.clock.now();

        let released_locks = self.locks.release_expired_locks().await?;
        let deleted_locks = self
            .locks
            .clean_old_locks(now - self.retention.lock_retention)
            .await?;
        let deleted_attempts = self
            .attempts
            .clean_old_attempts(now - self.retention.attempt_retention)
            .await?;
        let expired_counters = self.counters.sweep(now).await?;

        let report = SweepReport {
            released_locks,
            deleted_locks,
            deleted_attempts,
            expired_counters,
        };
        tracing::debug!(?report, "Cleanup pass complete");
        Ok(report)
    }
}
