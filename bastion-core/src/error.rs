use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Event error: {0}")]
    Event(#[from] EventError),

    #[error("Cryptographic error: {0}")]
    Crypto(#[from] CryptoError),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Record not found")]
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Invalid IP address format: {0}")]
    InvalidIpFormat(String),

    #[error("Invalid credentials format: {0}")]
    InvalidCredentialsFormat(String),

    #[error("Missing required field: {0}")]
    MissingField(String),
}

#[derive(Debug, Error)]
pub enum EventError {
    #[error("Event bus error: {0}")]
    BusError(String),

    #[error("Event handler error: {0}")]
    HandlerError(String),
}

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Password hashing failed: {0}")]
    PasswordHash(String),
}

impl Error {
    pub fn is_validation_error(&self) -> bool {
        matches!(self, Error::Validation(_))
    }

    pub fn is_storage_error(&self) -> bool {
        matches!(self, Error::Storage(_))
    }
}

/// The closed set of outcomes a rejected login can produce.
///
/// Every variant maps to exactly one response code at the HTTP boundary. Authentication
/// failures never say whether the identifier exists, and lockouts never say whether the lock
/// is keyed by identifier or by user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoginError {
    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("Too many login attempts, retry after {retry_after} seconds")]
    RateLimited { retry_after: u64 },

    #[error("Account is temporarily locked for {lock_duration} seconds")]
    AccountLocked { lock_duration: u64 },

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Login is temporarily unavailable")]
    Internal,
}

impl LoginError {
    /// Stable machine-readable code for this outcome.
    pub fn code(&self) -> &'static str {
        match self {
            LoginError::Validation(_) => "INVALID_REQUEST",
            LoginError::RateLimited { .. } => "RATE_LIMITED",
            LoginError::AccountLocked { .. } => "ACCOUNT_LOCKED",
            LoginError::InvalidCredentials => "INVALID_CREDENTIALS",
            LoginError::Internal => "INTERNAL_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let validation_error =
            Error::Validation(ValidationError::InvalidIpFormat("999.1.1.1".to_string()));
        assert_eq!(
            validation_error.to_string(),
            "Validation error: Invalid IP address format: 999.1.1.1"
        );

        let storage_error = Error::Storage(StorageError::NotFound);
        assert_eq!(storage_error.to_string(), "Storage error: Record not found");
    }

    #[test]
    fn test_error_classification() {
        assert!(Error::Validation(ValidationError::MissingField("ip".into())).is_validation_error());
        assert!(Error::Storage(StorageError::Database("down".into())).is_storage_error());
        assert!(!Error::Storage(StorageError::NotFound).is_validation_error());
    }

    #[test]
    fn test_login_error_codes() {
        assert_eq!(LoginError::InvalidCredentials.code(), "INVALID_CREDENTIALS");
        assert_eq!(LoginError::RateLimited { retry_after: 3 }.code(), "RATE_LIMITED");
        assert_eq!(
            LoginError::AccountLocked { lock_duration: 600 }.code(),
            "ACCOUNT_LOCKED"
        );
        assert_eq!(
            LoginError::from(ValidationError::InvalidCredentialsFormat("x".into())).code(),
            "INVALID_REQUEST"
        );
        assert_eq!(LoginError::Internal.code(), "INTERNAL_ERROR");
    }

    #[test]
    fn test_login_error_messages_carry_guidance() {
        assert_eq!(
            LoginError::RateLimited { retry_after: 42 }.to_string(),
            "Too many login attempts, retry after 42 seconds"
        );
        assert_eq!(
            LoginError::AccountLocked { lock_duration: 600 }.to_string(),
            "Account is temporarily locked for 600 seconds"
        );
    }
}
