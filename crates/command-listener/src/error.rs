//! Listener errors.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use fleet_events::CommandDecodeError;
use serde_json::json;

/// Request rejection, mapped to an HTTP response.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Malformed counts (400). The channel is never touched.
    #[error("Bad request: {0}")]
    BadRequest(#[from] CommandDecodeError),

    /// The simulation no longer consumes commands (503).
    #[error("Simulation not accepting commands")]
    Unavailable,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        };

        let body = axum::Json(json!({
            "error": self.to_string(),
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

/// Failure starting or stopping the listener thread.
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    #[error("cannot bind command listener: {0}")]
    Io(#[from] std::io::Error),

    #[error("command listener thread panicked")]
    Panicked,
}
