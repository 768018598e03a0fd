use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    response::IntoResponse,
    routing::{get, post},
};
use bastion::{Bastion, LoginRequest as PipelineRequest, RepositoryProvider};

use crate::{
    error::{ApiError, Result},
    types::*,
};

pub struct AppState<R: RepositoryProvider> {
    pub bastion: Arc<Bastion<R>>,
}

impl<R: RepositoryProvider> Clone for AppState<R> {
    fn clone(&self) -> Self {
        Self {
            bastion: self.bastion.clone(),
        }
    }
}

pub fn create_router<R>(bastion: Arc<Bastion<R>>, ip_source: ClientIpSource) -> Router
where
    R: RepositoryProvider + 'static,
{
    let state = AppState { bastion };

    Router::new()
        .route("/login", post(login_handler))
        .route("/health", get(health_handler))
        .with_state(state)
        .layer(axum::Extension(ip_source))
}

async fn login_handler<R>(
    State(state): State<AppState<R>>,
    client: ClientInfo,
    body: std::result::Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse>
where
    R: RepositoryProvider,
{
    let Json(body) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let request = PipelineRequest::new(body.identifier, body.password, client.ip)
        .with_user_agent(client.user_agent)
        .with_device_id(body.device_id.or(client.device_id));

    let success = state.bastion.login(request).await?;

    Ok(Json(LoginResponse::from(success)))
}

async fn health_handler<R>(State(state): State<AppState<R>>) -> Result<impl IntoResponse>
where
    R: RepositoryProvider,
{
    state.bastion.health_check().await?;

    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    }))
}
