//! HTTP error mapping.
//!
//! # Invariants
//! - Every error body is `{"message": ...}` JSON.
//! - Caller mistakes map to 4xx; registry failures map to 502.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use genvlab_core::{IdentifierError, RegistryError};
use log::warn;
use serde::Serialize;
use thiserror::Error;

/// Error returned by state API handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    InvalidIdentifier(#[from] IdentifierError),
    #[error("malformed request: {0}")]
    BadRequest(String),
    #[error("missing or invalid token")]
    Unauthorized,
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    message: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidIdentifier(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Registry(RegistryError::InvalidIdentifier(_)) => StatusCode::BAD_REQUEST,
            // The server was started without a uid to activate with.
            Self::Registry(RegistryError::MissingUid) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Registry(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            warn!(
                "event=api_error module=server status=error code={} error={self}",
                status.as_u16()
            );
        }
        let body = ErrorBody {
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
