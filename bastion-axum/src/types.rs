use bastion::{IpAddress, LoginSuccess};
use serde::{Deserialize, Serialize};

#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub identifier: String,
    pub password: String,
    #[serde(default)]
    pub device_id: Option<String>,
}

impl std::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRequest")
            .field("identifier", &"[REDACTED]")
            .field("password", &"[REDACTED]")
            .field("device_id", &self.device_id)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub success: bool,
    pub user_id: String,
    pub username: String,
    pub message: String,
}

impl From<LoginSuccess> for LoginResponse {
    fn from(success: LoginSuccess) -> Self {
        Self {
            success: true,
            user_id: success.user_id.into_inner(),
            username: success.username,
            message: success.message,
        }
    }
}

/// Body of every non-2xx response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lock_duration: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Where the request came from, as far as the pipeline cares.
#[derive(Debug, Clone)]
pub struct ClientInfo {
    pub ip: IpAddress,
    pub user_agent: Option<String>,
    /// From the `X-Device-Id` header. A `deviceId` in the body takes precedence.
    pub device_id: Option<String>,
}

/// Which headers may override the socket address as the client IP.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ClientIpSource {
    /// Peer address of the TCP connection.
    #[default]
    ConnectInfo,
    /// Last hop of `X-Forwarded-For`, then `X-Real-IP`, then the peer address. Only safe
    /// behind exactly one proxy that appends to these headers.
    ForwardedHeaders,
}
