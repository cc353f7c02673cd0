//! Liveness and readiness probes.

use axum::Json;
use axum::http::StatusCode;

/// Body of `GET /health`.
pub const HEALTH_BODY: &str = "Up";
/// Body of `GET /ready`.
pub const READY_BODY: &str = "Ready";
/// Body of `GET /ready` once shutdown has begun.
pub const DRAINING_BODY: &str = "Draining";

/// Liveness: the process is serving HTTP.
pub fn health_check() -> Json<&'static str> {
    Json(HEALTH_BODY)
}

/// Readiness: accepting new sessions unless shutting down.
pub fn ready_check(shutting_down: bool) -> (StatusCode, Json<&'static str>) {
    if shutting_down {
        (StatusCode::SERVICE_UNAVAILABLE, Json(DRAINING_BODY))
    } else {
        (StatusCode::OK, Json(READY_BODY))
    }
}
