//! Axum application for runtime fleet growth.
//!
//! One route:
//! - `GET /generate/taxis/{taxis}/passengers/{passengers}` queues a command
//!   and answers with an empty 200.

use axum::extract::{Path, State};
use axum::routing::get;
use axum::Router;
use fleet_events::{Command, CommandSender};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::error::ApiError;

/// State shared by request handlers.
#[derive(Debug, Clone)]
pub struct ListenerState {
    sender: CommandSender,
}

impl ListenerState {
    pub fn new(sender: CommandSender) -> Self {
        Self { sender }
    }
}

/// Create the Axum application.
pub fn create_app(state: ListenerState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route(
            "/generate/taxis/{taxis}/passengers/{passengers}",
            get(generate),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Queue a fleet growth command: `GET /generate/taxis/{taxis}/passengers/{passengers}`
pub async fn generate(
    State(state): State<ListenerState>,
    Path((taxis, passengers)): Path<(String, String)>,
) -> Result<(), ApiError> {
    let command = Command::from_path_params(&taxis, &passengers).map_err(|e| {
        tracing::warn!("Rejected command request: {}", e);
        ApiError::from(e)
    })?;
    state
        .sender
        .put(command)
        .map_err(|_| ApiError::Unavailable)?;
    tracing::info!("Queued command: {}", command);
    Ok(())
}
