//! Builder pattern for constructing Bastion instances
//!
//! Storage must be chosen before [`BastionBuilder::build`] becomes available. Everything else
//! has a production default:
//!
//! | Piece | Default |
//! | --- | --- |
//! | clock | [`SystemClock`] |
//! | delay | [`TokioDelay`] |
//! | counter store | [`MemoryCounterStore`] |
//! | password verifier | [`Argon2PasswordVerifier`] |
//! | event bus | empty [`EventBus`] |
//!
//! ```rust,no_run
//! use bastion::BastionBuilder;
//! use bastion::config::LockoutConfig;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let bastion = BastionBuilder::new()
//!     .with_sqlite("sqlite://bastion.db?mode=rwc")
//!     .await?
//!     .with_lockout(LockoutConfig::strict())
//!     .apply_migrations(true)
//!     .build()
//!     .await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use bastion_core::config::{
    BackoffConfig, BruteForceConfig, LockoutConfig, RateLimitConfig, RetentionConfig,
};

use crate::{
    Argon2PasswordVerifier, Bastion, BastionConfig, Clock, CounterStore, Delay, EventBus,
    MemoryCounterStore, PasswordVerifier, RepositoryProvider, SystemClock, TokioDelay,
};

#[derive(Debug, thiserror::Error)]
pub enum BastionBuilderError {
    #[error("Failed to connect to storage: {0}")]
    StorageConnection(String),

    #[error("Failed to apply migrations: {0}")]
    Migration(String),
}

/// Marker type: no storage configured yet.
pub struct NoStorage;

/// Marker type: storage configured.
pub struct WithStorage<R: RepositoryProvider> {
    repositories: Arc<R>,
}

pub struct BastionBuilder<Storage> {
    storage: Storage,
    config: BastionConfig,
    clock: Arc<dyn Clock>,
    delay: Arc<dyn Delay>,
    counters: Arc<dyn CounterStore>,
    verifier: Arc<dyn PasswordVerifier>,
    event_bus: EventBus,
    apply_migrations: bool,
}

impl Default for BastionBuilder<NoStorage> {
    fn default() -> Self {
        Self::new()
    }
}

impl BastionBuilder<NoStorage> {
    pub fn new() -> Self {
        Self {
            storage: NoStorage,
            config: BastionConfig::default(),
            clock: Arc::new(SystemClock),
            delay: Arc::new(TokioDelay),
            counters: Arc::new(MemoryCounterStore::new()),
            verifier: Arc::new(Argon2PasswordVerifier),
            event_bus: EventBus::new(),
            apply_migrations: false,
        }
    }

    /// Use an existing repository provider.
    pub fn with_repositories<R: RepositoryProvider>(
        self,
        repositories: Arc<R>,
    ) -> BastionBuilder<WithStorage<R>> {
        self.with_storage(WithStorage { repositories })
    }

    fn with_storage<S>(self, storage: S) -> BastionBuilder<S> {
        BastionBuilder {
            storage,
            config: self.config,
            clock: self.clock,
            delay: self.delay,
            counters: self.counters,
            verifier: self.verifier,
            event_bus: self.event_bus,
            apply_migrations: self.apply_migrations,
        }
    }
}

#[cfg(feature = "sqlite")]
impl BastionBuilder<NoStorage> {
    /// Configure SQLite storage by connecting to the given URL.
    ///
    /// * `url` - SQLite connection URL (e.g., "sqlite::memory:" or "sqlite://path/to/db.sqlite")
    pub async fn with_sqlite(
        self,
        url: &str,
    ) -> Result<BastionBuilder<WithStorage<crate::SqliteRepositoryProvider>>, BastionBuilderError>
    {
        let pool = bastion_storage_sqlite::connect(url)
            .await
            .map_err(|e| BastionBuilderError::StorageConnection(e.to_string()))?;

        Ok(self.with_sqlite_pool(pool))
    }

    /// Configure SQLite storage with an existing connection pool.
    pub fn with_sqlite_pool(
        self,
        pool: sqlx::SqlitePool,
    ) -> BastionBuilder<WithStorage<crate::SqliteRepositoryProvider>> {
        self.with_repositories(Arc::new(crate::SqliteRepositoryProvider::new(pool)))
    }
}

impl<Storage> BastionBuilder<Storage> {
    /// Replace the whole policy configuration.
    pub fn with_config(mut self, config: BastionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_identifier_salt(mut self, salt: impl Into<String>) -> Self {
        self.config = self.config.with_identifier_salt(salt);
        self
    }

    pub fn with_rate_limit(mut self, config: RateLimitConfig) -> Self {
        self.config = self.config.with_rate_limit(config);
        self
    }

    pub fn with_backoff(mut self, config: BackoffConfig) -> Self {
        self.config = self.config.with_backoff(config);
        self
    }

    pub fn with_lockout(mut self, config: LockoutConfig) -> Self {
        self.config = self.config.with_lockout(config);
        self
    }

    pub fn with_brute_force(mut self, config: BruteForceConfig) -> Self {
        self.config = self.config.with_brute_force(config);
        self
    }

    pub fn with_retention(mut self, config: RetentionConfig) -> Self {
        self.config = self.config.with_retention(config);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// How backoff delays are served. Tests swap in a recorder.
    pub fn with_delay(mut self, delay: Arc<dyn Delay>) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_counter_store(mut self, counters: Arc<dyn CounterStore>) -> Self {
        self.counters = counters;
        self
    }

    pub fn with_password_verifier(mut self, verifier: Arc<dyn PasswordVerifier>) -> Self {
        self.verifier = verifier;
        self
    }

    /// Share an event bus, typically one with handlers already registered.
    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = event_bus;
        self
    }

    /// Run storage migrations during [`BastionBuilder::build`]. Off by default.
    pub fn apply_migrations(mut self, apply: bool) -> Self {
        self.apply_migrations = apply;
        self
    }
}

impl<R: RepositoryProvider> BastionBuilder<WithStorage<R>> {
    pub async fn build(self) -> Result<Bastion<R>, BastionBuilderError> {
        let apply_migrations = self.apply_migrations;
        let bastion = self.build_sync();

        if apply_migrations {
            bastion
                .migrate()
                .await
                .map_err(|e| BastionBuilderError::Migration(e.to_string()))?;
        }

        Ok(bastion)
    }

    pub(crate) fn build_sync(self) -> Bastion<R> {
        Bastion::assemble(
            self.storage.repositories,
            self.config,
            self.clock,
            self.delay,
            self.counters,
            self.verifier,
            self.event_bus,
        )
    }
}
