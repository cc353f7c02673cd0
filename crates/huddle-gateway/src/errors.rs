//! Gateway errors and their HTTP mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use huddle_bus::BusError;
use serde_json::json;
use thiserror::Error;

/// Errors surfaced by gateway HTTP handlers.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// `/ws` was called with a token that is not pending.
    #[error("unknown token")]
    UnknownToken,

    /// The request body or query could not be used.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The bus rejected a publish needed to complete the request.
    #[error("bus unavailable: {0}")]
    Bus(#[from] BusError),
}

impl GatewayError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::UnknownToken => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Bus(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}
