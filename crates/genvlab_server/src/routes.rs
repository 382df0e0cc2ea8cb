//! State API handlers.
//!
//! # Responsibility
//! - Translate HTTP requests into `StateService` calls.
//! - Validate identifiers before the registry is queried.

use crate::error::ApiError;
use crate::AppState;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use genvlab_core::{
    core_version, DeviceBinding, DeviceRegistry, EnvironmentRecord, EnvironmentRegistry, KernelId,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct FindParams {
    pub kernel_id: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ActivateRequest {
    pub eid: String,
    pub kernel_id: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: core_version(),
    })
}

pub async fn list_devices<E, D>(
    State(state): State<AppState<E, D>>,
) -> Result<Json<Vec<DeviceBinding>>, ApiError>
where
    E: EnvironmentRegistry + 'static,
    D: DeviceRegistry + 'static,
{
    Ok(Json(state.service.devices().await?))
}

pub async fn list_environments<E, D>(
    State(state): State<AppState<E, D>>,
) -> Result<Json<Vec<EnvironmentRecord>>, ApiError>
where
    E: EnvironmentRegistry + 'static,
    D: DeviceRegistry + 'static,
{
    Ok(Json(state.service.environments().await?))
}

/// Responds with the bound eid, or `null` when the kernel is unbound.
pub async fn find_environment<E, D>(
    State(state): State<AppState<E, D>>,
    params: Result<Query<FindParams>, QueryRejection>,
) -> Result<Json<Option<String>>, ApiError>
where
    E: EnvironmentRegistry + 'static,
    D: DeviceRegistry + 'static,
{
    let Query(params) = params.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
    let kernel_id = KernelId::parse(params.kernel_id)?;
    Ok(Json(state.service.find(&kernel_id).await?))
}

pub async fn activate<E, D>(
    State(state): State<AppState<E, D>>,
    body: Result<Json<ActivateRequest>, JsonRejection>,
) -> Result<StatusCode, ApiError>
where
    E: EnvironmentRegistry + 'static,
    D: DeviceRegistry + 'static,
{
    let Json(request) = body.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
    let kernel_id = KernelId::parse(request.kernel_id)?;
    state.service.activate(&request.eid, &kernel_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
