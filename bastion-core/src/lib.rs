//! Core functionality for the bastion login defense pipeline
//!
//! This crate contains the domain types, repository traits and services that together
//! record login attempts, throttle abusive clients, and lock identifiers under attack.
//!
//! Storage backends implement the traits in [`repositories`], while the services in
//! [`services`] hold the policies: [`services::RateLimiter`], [`services::BackoffService`],
//! [`services::LockService`], [`services::BruteForceDetector`] and
//! [`services::Authenticator`]. The `bastion` crate composes them into a single login call.
//!
//! See [`LoginAttempt`] for the ledger record and [`AccountLock`] for the lock aggregate.
pub mod attempt;
pub mod clock;
pub mod config;
pub mod counter;
pub mod credentials;
pub mod crypto;
pub mod error;
pub mod events;
pub mod id;
pub mod lock;
pub mod repositories;
pub mod services;
pub mod user;

pub use attempt::{FailureReason, LoginAttempt};
pub use clock::{Clock, Delay, ManualClock, RecordingDelay, SystemClock, TokioDelay};
pub use config::BastionConfig;
pub use counter::{Counter, CounterStore, MemoryCounterStore};
pub use credentials::{IpAddress, LoginCredentials};
pub use crypto::{Argon2PasswordVerifier, IdentifierHasher, PasswordVerifier};
pub use error::{Error, LoginError};
pub use events::{
    Event, EventBus, EventHandler, LoggingEventHandler, RecordingEventHandler, Severity,
    UnlockReason,
};
pub use lock::{AccountLock, NewAccountLock};
pub use repositories::RepositoryProvider;
pub use user::{NewUser, User, UserId};
