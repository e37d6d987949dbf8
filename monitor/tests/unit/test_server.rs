//! View server handler tests

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use futures::stream;
use refresh_api::{JobStatus, QueueSnapshot, SubmitResponse};
use tower::ServiceExt;

use refresh_monitor::app::options::AppOptions;
use refresh_monitor::app::state::AppState;
use refresh_monitor::errors::MonitorError;
use refresh_monitor::http::backend::{Backend, PayloadStream};
use refresh_monitor::server::serve::router;
use refresh_monitor::server::state::ServerState;
use refresh_monitor::view::store::ViewStore;

/// Backend whose calls never complete
struct StalledBackend;

#[async_trait]
impl Backend for StalledBackend {
    async fn submit_job(&self) -> Result<SubmitResponse, MonitorError> {
        std::future::pending().await
    }

    async fn get_status(&self, _job_id: Option<&str>) -> Result<JobStatus, MonitorError> {
        std::future::pending().await
    }

    async fn open_log_stream(&self, _job_id: Option<&str>) -> Result<PayloadStream, MonitorError> {
        Ok(Box::pin(stream::pending()))
    }

    async fn get_queue_snapshot(&self) -> Result<QueueSnapshot, MonitorError> {
        std::future::pending().await
    }
}

fn setup() -> (Router, Arc<ViewStore>) {
    let options = AppOptions {
        console_output: false,
        ..Default::default()
    };
    let (app_state, monitor) = AppState::with_backend(Arc::new(StalledBackend), &options);
    tokio::spawn(monitor.run(Box::pin(std::future::pending())));

    let state = ServerState::new(app_state.handle.clone(), app_state.store.clone());
    (router(Arc::new(state)), app_state.store)
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<&str>) -> (StatusCode, serde_json::Value) {
    let mut request = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            request = request.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let response = app.clone().oneshot(request.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, value)
}

#[tokio::test]
async fn test_health() {
    let (app, _) = setup();
    let (status, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "refresh-monitor");
}

#[tokio::test]
async fn test_start_job_conflicts_while_tracking() {
    let (app, _) = setup();

    let (status, body) = send(&app, "POST", "/jobs", None).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["generation"], 1);

    let (status, body) = send(&app, "POST", "/jobs", None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("already"));

    let (status, body) = send(&app, "GET", "/view", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["progress"]["phase"], "submitting");
}

#[tokio::test]
async fn test_open_inspector_requires_job_id() {
    let (app, _) = setup();
    let (status, _) = send(&app, "POST", "/inspector", Some(r#"{"job_id":"  "}"#)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_inspector_open_and_close() {
    let (app, store) = setup();

    let (status, _) = send(
        &app,
        "POST",
        "/inspector",
        Some(r#"{"job_id":"j2","enqueued_at":"2024-03-01T09:30:00Z"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);

    for _ in 0..100 {
        if store.inspector().target.is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let (status, body) = send(&app, "GET", "/inspector", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["target"]["job_id"], "j2");

    let (status, _) = send(&app, "DELETE", "/inspector", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    for _ in 0..100 {
        if store.inspector().target.is_none() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(store.inspector().target.is_none());
}

#[tokio::test]
async fn test_queue_before_first_fetch() {
    let (app, _) = setup();
    let (status, body) = send(&app, "GET", "/queue", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["snapshot"].is_null());
    assert_eq!(body["stale"], false);
}
