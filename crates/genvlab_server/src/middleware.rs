//! Request middleware: shared-token gate and access logging.

use crate::error::ApiError;
use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use log::info;
use std::sync::Arc;
use std::time::Instant;

/// Rejects requests that do not carry the configured token.
///
/// Accepts `Authorization: token <t>` and `Authorization: Bearer <t>`.
pub async fn require_token(
    State(expected): State<Arc<str>>,
    request: Request,
    next: Next,
) -> Response {
    let authorized = matches!(presented_token(request.headers()), Some(token) if token == &*expected);
    if authorized {
        next.run(request).await
    } else {
        info!(
            "event=auth_reject module=server status=error path={}",
            request.uri().path()
        );
        ApiError::Unauthorized.into_response()
    }
}

fn presented_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?.trim();
    let (scheme, token) = value.split_once(' ')?;
    if scheme.eq_ignore_ascii_case("token") || scheme.eq_ignore_ascii_case("bearer") {
        Some(token.trim())
    } else {
        None
    }
}

/// Logs method, path, status and latency of every request.
pub async fn log_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started = Instant::now();

    let response = next.run(request).await;

    let status = if response.status().is_success() {
        "ok"
    } else {
        "error"
    };
    info!(
        "event=http_request module=server status={status} method={method} path={path} code={} elapsed_ms={}",
        response.status().as_u16(),
        started.elapsed().as_millis()
    );
    response
}
