//! Service layer for business logic
//!
//! Each service owns one policy of the login pipeline. The `bastion` crate wires them
//! together in the order a request passes through them.

pub mod auth;
pub mod backoff;
pub mod brute_force;
pub mod lock;
pub mod rate_limit;

#[cfg(test)]
pub(crate) mod mock;

pub use auth::Authenticator;
pub use backoff::BackoffService;
pub use brute_force::{BruteForceDetector, Detection, SprayAlert};
pub use lock::LockService;
pub use rate_limit::RateLimiter;
