//! HTTP server setup

use std::future::Future;
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::app::options::ServerOptions;
use crate::errors::MonitorError;
use crate::server::handlers::{
    close_inspector_handler, health_handler, inspector_handler, open_inspector_handler,
    queue_handler, start_job_handler, version_handler, view_handler,
};
use crate::server::state::ServerState;

/// Build the view server routes
pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        // Health and version
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        // Primary job
        .route("/view", get(view_handler))
        .route("/jobs", post(start_job_handler))
        // Queue board
        .route("/queue", get(queue_handler))
        // Inspector
        .route(
            "/inspector",
            get(inspector_handler)
                .post(open_inspector_handler)
                .delete(close_inspector_handler),
        )
        // State and middleware
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Start the HTTP server
pub async fn serve(
    options: &ServerOptions,
    state: Arc<ServerState>,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<JoinHandle<Result<(), MonitorError>>, MonitorError> {
    let app = router(state);

    let addr = format!("{}:{}", options.host, options.port);
    info!("Starting view server on {}", addr);

    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| MonitorError::ServerError(e.to_string()))?;

    let handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal)
            .await
            .map_err(|e| MonitorError::ServerError(e.to_string()))
    });

    Ok(handle)
}
