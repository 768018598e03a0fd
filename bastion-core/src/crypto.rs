//! Identifier hashing and password verification
//!
//! Login identifiers are personal data, so the ledger and lock tables only ever see a salted
//! SHA-256 digest of them. The digest is deterministic for a given salt, which is what lets
//! attempts for the same identifier be correlated across requests and restarts.
//!
//! Password hashes are checked through [`PasswordVerifier`] so the hashing primitive stays a
//! collaborator. [`Argon2PasswordVerifier`] is the default, backed by `password-auth`.

use std::sync::LazyLock;

use sha2::{Digest, Sha256};

use crate::{Error, error::CryptoError};

/// Salt used when none is configured. Hashes made with it are only as private as this
/// source file.
pub const DEFAULT_IDENTIFIER_SALT: &str = "bastion-default-identifier-salt";

/// Salted one-way hashing of login identifiers.
#[derive(Clone)]
pub struct IdentifierHasher {
    salt: String,
}

impl IdentifierHasher {
    /// Create a hasher with the process-wide salt.
    ///
    /// An empty or default salt is accepted so logins keep working, but it is reported with
    /// a warning since identifier hashes then become guessable.
    pub fn new(salt: impl Into<String>) -> Self {
        let salt = salt.into();
        if salt.is_empty() || salt == DEFAULT_IDENTIFIER_SALT {
            tracing::warn!(
                "Identifier hash salt is missing or set to the default; configure a secret salt"
            );
        }
        Self { salt }
    }

    /// Hex-encoded `SHA-256(identifier ‖ salt)`
    pub fn hash(&self, identifier: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(identifier.as_bytes());
        hasher.update(self.salt.as_bytes());
        hex::encode(hasher.finalize())
    }
}

impl Default for IdentifierHasher {
    fn default() -> Self {
        Self::new(DEFAULT_IDENTIFIER_SALT)
    }
}

impl std::fmt::Debug for IdentifierHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentifierHasher")
            .field("salt", &"[REDACTED]")
            .finish()
    }
}

/// External password-hash primitive.
pub trait PasswordVerifier: Send + Sync + 'static {
    /// Check `password` against a stored hash. A mismatch is `Ok(false)`, not an error.
    fn verify(&self, password: &str, hash: &str) -> Result<bool, Error>;

    /// Produce a storable hash for `password`.
    fn hash(&self, password: &str) -> Result<String, Error>;

    /// A hash that no submitted password is expected to match.
    ///
    /// Verified against when an identifier does not resolve to an account, so that unknown
    /// identifiers cost the same as wrong passwords.
    fn dummy_hash(&self) -> &str;
}

static ARGON2_DUMMY_HASH: LazyLock<String> =
    LazyLock::new(|| password_auth::generate_hash("bastion-dummy-password-for-timing"));

/// Argon2id hashing through the `password-auth` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct Argon2PasswordVerifier;

impl PasswordVerifier for Argon2PasswordVerifier {
    fn verify(&self, password: &str, hash: &str) -> Result<bool, Error> {
        match password_auth::verify_password(password, hash) {
            Ok(()) => Ok(true),
            Err(password_auth::VerifyError::PasswordInvalid) => Ok(false),
            Err(e) => Err(CryptoError::PasswordHash(e.to_string()).into()),
        }
    }

    fn hash(&self, password: &str) -> Result<String, Error> {
        Ok(password_auth::generate_hash(password))
    }

    fn dummy_hash(&self) -> &str {
        &ARGON2_DUMMY_HASH
    }
}
