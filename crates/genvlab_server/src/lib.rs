//! HTTP state API for genvlab.
//!
//! # Responsibility
//! - Mount the device/environment read routes and the activation route under
//!   the configured base path.
//! - Serve them until interrupted.
//!
//! # Invariants
//! - Handlers hold no state of their own; every request reaches the registry.
//! - When a token is configured, every route except `health` requires it.

pub mod error;
pub mod middleware;
pub mod routes;

pub use error::ApiError;

use axum::routing::{get, post};
use axum::Router;
use genvlab_core::{
    ConfigError, DeviceRegistry, EnvironmentRegistry, GenvConfig, GenvStateService, StateService,
};
use log::{error, info};
use std::sync::Arc;
use thiserror::Error;

/// Shared handler state.
pub struct AppState<E, D> {
    pub service: Arc<StateService<E, D>>,
}

impl<E, D> Clone for AppState<E, D> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
        }
    }
}

/// Route-level settings taken from `GenvConfig`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiSettings {
    pub base_path: String,
    pub auth_token: Option<String>,
}

impl ApiSettings {
    pub fn from_config(config: &GenvConfig) -> Self {
        Self {
            base_path: config.base_path.clone(),
            auth_token: config.auth_token.clone(),
        }
    }
}

/// Server startup/runtime errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to bind `{addr}`: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("server terminated: {0}")]
    Serve(#[source] std::io::Error),
}

/// Builds the state API router.
pub fn router<E, D>(service: Arc<StateService<E, D>>, settings: &ApiSettings) -> Router
where
    E: EnvironmentRegistry + 'static,
    D: DeviceRegistry + 'static,
{
    let mut api = Router::new()
        .route("/devices", get(routes::list_devices::<E, D>))
        .route("/envs", get(routes::list_environments::<E, D>))
        .route("/find", get(routes::find_environment::<E, D>))
        .route("/activate", post(routes::activate::<E, D>))
        .with_state(AppState { service });

    if let Some(token) = &settings.auth_token {
        let token: Arc<str> = Arc::from(token.as_str());
        api = api.route_layer(axum::middleware::from_fn_with_state(
            token,
            middleware::require_token,
        ));
    }

    let api = api.route("/health", get(routes::health));

    Router::new()
        .nest(&settings.base_path, api)
        .layer(axum::middleware::from_fn(middleware::log_requests))
}

/// Serves the registry-backed API on `config.bind_addr` until Ctrl-C.
pub async fn serve(config: &GenvConfig) -> Result<(), ServerError> {
    let addr = config.socket_addr()?;
    let service = Arc::new(GenvStateService::from_config(config));
    let app = router(service, &ApiSettings::from_config(config));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind {
            addr: addr.to_string(),
            source,
        })?;
    info!(
        "event=server_start module=server status=ok addr={addr} base_path={} auth={}",
        config.base_path,
        config.auth_token.is_some()
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(ServerError::Serve)?;

    info!("event=server_stop module=server status=ok");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("event=server_signal module=server status=error error={err}");
    }
}
