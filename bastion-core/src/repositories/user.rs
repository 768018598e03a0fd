use async_trait::async_trait;

use crate::{Error, NewUser, User, UserId};

/// Repository for user data access
#[async_trait]
pub trait UserRepository: Send + Sync + 'static {
    /// Create a new user
    async fn create(&self, user: NewUser) -> Result<User, Error>;

    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, Error>;

    /// Exact match on the stored email
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, Error>;

    /// Exact match on the stored username
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, Error>;
}
