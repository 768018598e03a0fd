//! Validated login inputs
//!
//! [`IpAddress`] and [`LoginCredentials`] are rejected at construction when malformed, so
//! everything downstream of the HTTP boundary can assume well-formed values.
use std::{
    fmt,
    net::IpAddr,
    sync::LazyLock,
};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

static EMAIL_SHAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("Invalid email regex pattern"));

const LOOPBACK_ALIASES: [&str; 3] = ["localhost", "127.0.0.1", "::1"];

const IDENTIFIER_MIN_LEN: usize = 3;
const IDENTIFIER_MAX_LEN: usize = 255;
const PASSWORD_MIN_LEN: usize = 8;
const PASSWORD_MAX_LEN: usize = 255;

/// A client address: IPv4, IPv6, or one of the loopback aliases.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IpAddress(String);

impl IpAddress {
    pub fn create(value: &str) -> Result<Self, ValidationError> {
        let value = value.trim();

        if LOOPBACK_ALIASES.contains(&value) || value.parse::<IpAddr>().is_ok() {
            Ok(Self(value.to_string()))
        } else {
            Err(ValidationError::InvalidIpFormat(value.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

}

impl From<IpAddr> for IpAddress {
    fn from(ip: IpAddr) -> Self {
        Self(ip.to_string())
    }
}

impl TryFrom<String> for IpAddress {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::create(&value)
    }
}

impl From<IpAddress> for String {
    fn from(ip: IpAddress) -> Self {
        ip.0
    }
}

impl fmt::Display for IpAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An identifier (email or username) and password pair as submitted to the login endpoint.
#[derive(Clone, PartialEq, Eq)]
pub struct LoginCredentials {
    identifier: String,
    password: String,
    is_email: bool,
}

impl LoginCredentials {
    /// Trim and classify `identifier`, then check both length bounds.
    ///
    /// Lengths are counted in characters, not bytes.
    pub fn create(identifier: &str, password: &str) -> Result<Self, ValidationError> {
        let identifier = identifier.trim();

        let identifier_len = identifier.chars().count();
        if !(IDENTIFIER_MIN_LEN..=IDENTIFIER_MAX_LEN).contains(&identifier_len) {
            return Err(ValidationError::InvalidCredentialsFormat(format!(
                "Identifier must be between {IDENTIFIER_MIN_LEN} and {IDENTIFIER_MAX_LEN} characters"
            )));
        }

        let password_len = password.chars().count();
        if !(PASSWORD_MIN_LEN..=PASSWORD_MAX_LEN).contains(&password_len) {
            return Err(ValidationError::InvalidCredentialsFormat(format!(
                "Password must be between {PASSWORD_MIN_LEN} and {PASSWORD_MAX_LEN} characters"
            )));
        }

        Ok(Self {
            identifier: identifier.to_string(),
            password: password.to_string(),
            is_email: EMAIL_SHAPE.is_match(identifier),
        })
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn is_email_login(&self) -> bool {
        self.is_email
    }

    pub fn is_username_login(&self) -> bool {
        !self.is_email
    }
}

impl fmt::Debug for LoginCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginCredentials")
            .field("identifier", &self.identifier)
            .field("password", &"[REDACTED]")
            .field("is_email", &self.is_email)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ip_address_accepts_v4_v6_and_loopback() {
        assert!(IpAddress::create("192.168.1.10").is_ok());
        assert!(IpAddress::create("2001:db8::1").is_ok());
        assert!(IpAddress::create("::1").is_ok());
        assert!(IpAddress::create("localhost").is_ok());
        assert!(IpAddress::create("127.0.0.1").is_ok());
    }

    #[test]
    fn test_ip_address_rejects_garbage() {
        for value in ["", "999.1.1.1", "example.com", "10.0.0", "::g"] {
            assert_eq!(
                IpAddress::create(value),
                Err(ValidationError::InvalidIpFormat(value.to_string())),
                "{value} should be rejected"
            );
        }
    }

    #[test]
    fn test_ip_address_compares_by_value() {
        assert_eq!(
            IpAddress::create("10.0.0.1").unwrap(),
            IpAddress::create(" 10.0.0.1 ").unwrap()
        );
    }

    #[test]
    fn test_credentials_classify_email_and_username() {
        let email = LoginCredentials::create("  alice@example.test ", "correct-horse").unwrap();
        assert!(email.is_email_login());
        assert_eq!(email.identifier(), "alice@example.test");

        let username = LoginCredentials::create("carol", "correct-horse").unwrap();
        assert!(username.is_username_login());

        let not_email = LoginCredentials::create("carol@localhost", "correct-horse").unwrap();
        assert!(not_email.is_username_login());
    }

    #[test]
    fn test_credentials_length_bounds() {
        assert!(LoginCredentials::create("ab", "password1").is_err());
        assert!(LoginCredentials::create("   ab   ", "password1").is_err());
        assert!(LoginCredentials::create("abc", "password1").is_ok());
        assert!(LoginCredentials::create(&"a".repeat(256), "password1").is_err());
        assert!(LoginCredentials::create(&"a".repeat(255), "password1").is_ok());

        assert!(LoginCredentials::create("carol", "short").is_err());
        assert!(LoginCredentials::create("carol", "12345678").is_ok());
        assert!(LoginCredentials::create("carol", &"p".repeat(256)).is_err());
    }

    #[test]
    fn test_credentials_debug_redacts_password() {
        let credentials = LoginCredentials::create("carol", "hunter2hunter2").unwrap();
        let debug = format!("{credentials:?}");
        assert!(!debug.contains("hunter2hunter2"));
        assert!(debug.contains("[REDACTED]"));
    }
}
