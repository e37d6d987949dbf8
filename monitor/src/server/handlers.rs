//! HTTP request handlers

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use tracing::warn;

use crate::errors::MonitorError;
use crate::inspector::InspectTarget;
use crate::server::state::ServerState;
use crate::utils::version_info;

/// Error body returned by failing handlers
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

type HandlerError = (StatusCode, Json<ErrorResponse>);

fn handler_error(status: StatusCode, error: impl ToString) -> HandlerError {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
        }),
    )
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

/// Health check handler
pub async fn health_handler() -> impl IntoResponse {
    let version = version_info();
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "refresh-monitor".to_string(),
        version: version.version,
    })
}

/// Version handler
pub async fn version_handler() -> impl IntoResponse {
    Json(version_info())
}

/// Primary job view
pub async fn view_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    Json(state.store.snapshot())
}

/// Last queue board snapshot
pub async fn queue_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    Json(state.store.board())
}

/// Start job response
#[derive(Debug, Serialize)]
pub struct StartJobResponse {
    pub generation: u64,
}

/// Start a new job. Only one job is tracked at a time.
pub async fn start_job_handler(
    State(state): State<Arc<ServerState>>,
) -> Result<impl IntoResponse, HandlerError> {
    match state.monitor.start_job().await {
        Ok(generation) => Ok((StatusCode::ACCEPTED, Json(StartJobResponse { generation }))),
        Err(MonitorError::SessionError(e)) => Err(handler_error(StatusCode::CONFLICT, e)),
        Err(e) => {
            warn!("Failed to start job: {}", e);
            Err(handler_error(StatusCode::INTERNAL_SERVER_ERROR, e))
        }
    }
}

/// Current inspector view
pub async fn inspector_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    Json(state.store.inspector())
}

/// Open the inspector on a job, replacing any open one
pub async fn open_inspector_handler(
    State(state): State<Arc<ServerState>>,
    Json(target): Json<InspectTarget>,
) -> Result<impl IntoResponse, HandlerError> {
    if target.job_id.trim().is_empty() {
        return Err(handler_error(StatusCode::BAD_REQUEST, "job_id is required"));
    }

    state
        .monitor
        .open_inspector(target)
        .map_err(|e| handler_error(StatusCode::INTERNAL_SERVER_ERROR, e))?;
    Ok(StatusCode::ACCEPTED)
}

/// Close the inspector
pub async fn close_inspector_handler(
    State(state): State<Arc<ServerState>>,
) -> Result<impl IntoResponse, HandlerError> {
    state
        .monitor
        .close_inspector()
        .map_err(|e| handler_error(StatusCode::INTERNAL_SERVER_ERROR, e))?;
    Ok(StatusCode::NO_CONTENT)
}
