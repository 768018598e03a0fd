//! The login attempt ledger record
//!
//! One [`LoginAttempt`] is built per login request that gets past input validation, whether
//! it succeeds or not. Records are append-only; the only deletion path is the retention
//! sweep in [`crate::repositories::LoginAttemptRepository::clean_old_attempts`].

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{IdentifierHasher, IpAddress, UserId};

/// Why an attempt was refused. Never distinguishes unknown identifiers from wrong passwords.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    InvalidCredentials,
    AccountLocked,
    InternalError,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::InvalidCredentials => "invalid_credentials",
            FailureReason::AccountLocked => "account_locked",
            FailureReason::InternalError => "internal_error",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FailureReason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "invalid_credentials" => Ok(FailureReason::InvalidCredentials),
            "account_locked" => Ok(FailureReason::AccountLocked),
            "internal_error" => Ok(FailureReason::InternalError),
            other => Err(format!("Unknown failure reason: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginAttempt {
    /// Assigned by storage on save.
    pub id: Option<i64>,
    pub identifier_hash: String,
    pub ip_address: IpAddress,
    pub user_agent: Option<String>,
    pub success: bool,
    pub user_id: Option<UserId>,
    pub failure_reason: Option<FailureReason>,
    pub device_id: Option<String>,
    pub attempted_at: DateTime<Utc>,
}

impl LoginAttempt {
    /// Build a ledger record, hashing `identifier` on the way in.
    #[allow(clippy::too_many_arguments)]
    pub fn create(
        hasher: &IdentifierHasher,
        identifier: &str,
        ip_address: IpAddress,
        user_agent: Option<String>,
        success: bool,
        user_id: Option<UserId>,
        failure_reason: Option<FailureReason>,
        device_id: Option<String>,
        attempted_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: None,
            identifier_hash: hasher.hash(identifier),
            ip_address,
            user_agent,
            success,
            user_id,
            failure_reason,
            device_id,
            attempted_at,
        }
    }

    pub fn succeeded(
        hasher: &IdentifierHasher,
        identifier: &str,
        ip_address: IpAddress,
        user_id: UserId,
        attempted_at: DateTime<Utc>,
    ) -> Self {
        Self::create(
            hasher,
            identifier,
            ip_address,
            None,
            true,
            Some(user_id),
            None,
            None,
            attempted_at,
        )
    }

    pub fn failed(
        hasher: &IdentifierHasher,
        identifier: &str,
        ip_address: IpAddress,
        reason: FailureReason,
        attempted_at: DateTime<Utc>,
    ) -> Self {
        Self::create(
            hasher,
            identifier,
            ip_address,
            None,
            false,
            None,
            Some(reason),
            None,
            attempted_at,
        )
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
