//! Repository traits for data access layer
//!
//! Services reach storage only through these traits.
//!
//! - Individual `*Repository` traits define the operations for each data domain
//! - Individual `*RepositoryProvider` traits provide access to each repository type
//! - [`RepositoryProvider`] combines all provider traits plus lifecycle methods

pub mod adapter;
pub mod attempt;
pub mod lock;
pub mod password;
pub mod user;

pub use adapter::{
    AccountLockRepositoryAdapter, LoginAttemptRepositoryAdapter, PasswordRepositoryAdapter,
    UserRepositoryAdapter,
};
pub use attempt::LoginAttemptRepository;
pub use lock::AccountLockRepository;
pub use password::PasswordRepository;
pub use user::UserRepository;

use async_trait::async_trait;

use crate::Error;

/// Provider trait for user repository access.
pub trait UserRepositoryProvider: Send + Sync + 'static {
    type UserRepo: UserRepository;

    fn user(&self) -> &Self::UserRepo;
}

/// Provider trait for password repository access.
pub trait PasswordRepositoryProvider: Send + Sync + 'static {
    type PasswordRepo: PasswordRepository;

    fn password(&self) -> &Self::PasswordRepo;
}

/// Provider trait for the login attempt ledger.
pub trait LoginAttemptRepositoryProvider: Send + Sync + 'static {
    type AttemptRepo: LoginAttemptRepository;

    fn attempts(&self) -> &Self::AttemptRepo;
}

/// Provider trait for account lock storage.
pub trait AccountLockRepositoryProvider: Send + Sync + 'static {
    type LockRepo: AccountLockRepository;

    fn locks(&self) -> &Self::LockRepo;
}

/// Provider trait that storage implementations must implement to provide all repositories.
///
/// # Implementing a Custom Storage Backend
///
/// 1. Implement each individual `*Repository` trait for your backend
/// 2. Implement each individual `*RepositoryProvider` trait
/// 3. Implement the `RepositoryProvider` trait with `migrate()` and `health_check()`
///
/// ```rust,ignore
/// use bastion_core::repositories::*;
///
/// struct MyStorage { /* ... */ }
///
/// impl LoginAttemptRepositoryProvider for MyStorage {
///     type AttemptRepo = MyAttemptRepository;
///     fn attempts(&self) -> &Self::AttemptRepo { &self.attempts }
/// }
///
/// // ... implement other provider traits ...
///
/// #[async_trait]
/// impl RepositoryProvider for MyStorage {
///     async fn migrate(&self) -> Result<(), Error> { /* ... */ }
///     async fn health_check(&self) -> Result<(), Error> { /* ... */ }
/// }
/// ```
#[async_trait]
pub trait RepositoryProvider:
    UserRepositoryProvider
    + PasswordRepositoryProvider
    + LoginAttemptRepositoryProvider
    + AccountLockRepositoryProvider
{
    /// Run migrations for all repositories
    async fn migrate(&self) -> Result<(), Error>;

    /// Health check for all repositories
    async fn health_check(&self) -> Result<(), Error>;
}
