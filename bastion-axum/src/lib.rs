//! # Bastion Axum Integration
//!
//! HTTP surface for the bastion login pipeline:
//!
//! | Route | Response |
//! | --- | --- |
//! | `POST /login` | 200, or 400 / 401 / 423 / 429 / 500 with `{error, message}` |
//! | `GET /health` | 200, or 503 when storage is unreachable |
//!
//! Rate-limited responses carry a `Retry-After` header and `retryAfter` in the body; locked
//! responses carry `lockDuration`.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::{net::SocketAddr, sync::Arc};
//! use axum::Router;
//! use bastion::{Bastion, BastionConfig, SqliteRepositoryProvider};
//!
//! #[tokio::main]
//! async fn main() {
//!     let pool = sqlx::SqlitePool::connect("sqlite://bastion.db").await.unwrap();
//!     let repositories = Arc::new(SqliteRepositoryProvider::new(pool));
//!     let bastion = Arc::new(Bastion::new(repositories, BastionConfig::default()));
//!
//!     let app = Router::new().nest("/auth", bastion_axum::routes(bastion).build());
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();
//!     axum::serve(
//!         listener,
//!         app.into_make_service_with_connect_info::<SocketAddr>(),
//!     )
//!     .await
//!     .unwrap();
//! }
//! ```
//!
//! The client IP comes from the connection, so the router must be served with
//! `into_make_service_with_connect_info::<SocketAddr>()`.

mod error;
mod extractors;
mod routes;
mod types;

pub use error::{ApiError, Result};
pub use routes::{AppState, create_router};
pub use types::{
    ClientInfo, ClientIpSource, ErrorResponse, HealthResponse, LoginRequest, LoginResponse,
};

use axum::Router;
use bastion::{Bastion, RepositoryProvider};
use std::sync::Arc;

/// Create the login routes for your Axum application.
///
/// The returned builder can be nested at any path (e.g., "/auth").
pub fn routes<R>(bastion: Arc<Bastion<R>>) -> BastionRouterBuilder<R>
where
    R: RepositoryProvider + 'static,
{
    BastionRouterBuilder {
        bastion,
        ip_source: ClientIpSource::default(),
    }
}

/// Builder for configuring the login routes
pub struct BastionRouterBuilder<R: RepositoryProvider> {
    bastion: Arc<Bastion<R>>,
    ip_source: ClientIpSource,
}

impl<R: RepositoryProvider + 'static> BastionRouterBuilder<R> {
    /// Take the client IP from `X-Forwarded-For` / `X-Real-IP`.
    ///
    /// Only enable this behind a reverse proxy that sets those headers itself; otherwise any
    /// client can pick its own rate-limit bucket.
    pub fn trust_forwarded_headers(mut self, trust: bool) -> Self {
        self.ip_source = if trust {
            ClientIpSource::ForwardedHeaders
        } else {
            ClientIpSource::ConnectInfo
        };
        self
    }

    pub fn build(self) -> Router {
        create_router(self.bastion, self.ip_source)
    }
}

impl<R: RepositoryProvider + 'static> From<BastionRouterBuilder<R>> for Router {
    fn from(builder: BastionRouterBuilder<R>) -> Self {
        builder.build()
    }
}
