use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use bastion::{BastionError, LoginError};
use thiserror::Error;

use crate::types::ErrorResponse;

const INTERNAL_ERROR_MESSAGE: &str = "An unexpected error occurred";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Login(#[from] LoginError),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),
}

impl From<BastionError> for ApiError {
    fn from(err: BastionError) -> Self {
        match err {
            BastionError::ValidationError(msg) => ApiError::BadRequest(msg),
            other => ApiError::Unavailable(other.to_string()),
        }
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Login(LoginError::Validation(_)) | ApiError::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Login(LoginError::RateLimited { .. }) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Login(LoginError::AccountLocked { .. }) => StatusCode::LOCKED,
            ApiError::Login(LoginError::InvalidCredentials) => StatusCode::UNAUTHORIZED,
            ApiError::Login(LoginError::Internal) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn body(&self) -> ErrorResponse {
        let (error, message) = match self {
            ApiError::Login(LoginError::Internal) => {
                (LoginError::Internal.code(), INTERNAL_ERROR_MESSAGE.to_string())
            }
            ApiError::Login(err) => (err.code(), err.to_string()),
            ApiError::BadRequest(msg) => ("INVALID_REQUEST", msg.clone()),
            ApiError::Unavailable(_) => (
                "SERVICE_UNAVAILABLE",
                "Service temporarily unavailable".to_string(),
            ),
        };

        ErrorResponse {
            error: error.to_string(),
            message,
            retry_after: match self {
                ApiError::Login(LoginError::RateLimited { retry_after }) => Some(*retry_after),
                _ => None,
            },
            lock_duration: match self {
                ApiError::Login(LoginError::AccountLocked { lock_duration }) => {
                    Some(*lock_duration)
                }
                _ => None,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Unavailable(ref detail) = self {
            tracing::error!(error = %detail, "Request failed");
        }

        let status = self.status();
        let body = self.body();
        let mut response = (status, Json(body)).into_response();

        if let ApiError::Login(LoginError::RateLimited { retry_after }) = self {
            if let Ok(value) = HeaderValue::from_str(&retry_after.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }

        response
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;
