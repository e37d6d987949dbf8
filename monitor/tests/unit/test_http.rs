//! HTTP backend client tests

use futures::StreamExt;
use mockito::Matcher;
use refresh_api::JobState;
use refresh_monitor::errors::MonitorError;
use refresh_monitor::http::backend::Backend;
use refresh_monitor::http::client::HttpClient;

fn client(server: &mockito::ServerGuard) -> HttpClient {
    HttpClient::new(&format!("{}/api", server.url())).unwrap()
}

#[tokio::test]
async fn test_submit_job() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/api/update")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"job_id":"j1","position":2,"status":"queued","message":"queued"}"#)
        .create_async()
        .await;

    let response = client(&server).submit_job().await.unwrap();
    assert_eq!(response.job_id.as_deref(), Some("j1"));
    assert_eq!(response.position, Some(2));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_get_status_with_job_id() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/api/status")
        .match_query(Matcher::UrlEncoded("job_id".into(), "j1".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"job_id":"j1","status":"failed","error":"disk full"}"#)
        .create_async()
        .await;

    let status = client(&server).get_job_status(Some("j1")).await.unwrap();
    assert_eq!(status.status, JobState::Failed);
    assert_eq!(status.error.as_deref(), Some("disk full"));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_unknown_status_value() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/api/status")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"status":"paused"}"#)
        .create_async()
        .await;

    let status = client(&server).get_job_status(None).await.unwrap();
    assert_eq!(status.status, JobState::Unknown);
}

#[tokio::test]
async fn test_error_status_is_backend_error() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/api/queue")
        .with_status(500)
        .with_body("boom")
        .create_async()
        .await;

    match client(&server).get_queue_snapshot().await {
        Err(MonitorError::BackendError(message)) => {
            assert!(message.contains("500"));
            assert!(message.contains("boom"));
        }
        other => panic!("unexpected result: {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn test_queue_snapshot() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/api/queue")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{
                "running": {"id":"j1","status":"running","enqueued_at":1700000000.5},
                "running_flag": true,
                "queued": [{"id":"j2","status":"queued","position":1}],
                "history": [{"id":"j0","status":"completed","updated":true,"finished_at":1699990000}],
                "queue_size": 1
            }"#,
        )
        .create_async()
        .await;

    let snapshot = client(&server).get_queue_snapshot().await.unwrap();
    assert!(snapshot.running_flag);
    assert_eq!(snapshot.running.unwrap().id, "j1");
    assert_eq!(snapshot.queued[0].position, Some(1));
    assert_eq!(snapshot.history[0].updated, Some(true));
    assert_eq!(snapshot.queue_size, Some(1));
}

#[tokio::test]
async fn test_log_stream_payloads() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/api/logs")
        .match_query(Matcher::UrlEncoded("job_id".into(), "j1".into()))
        .with_status(200)
        .with_header("content-type", "text/event-stream")
        .with_body(concat!(
            ": keep-alive\n\n",
            "data: [{\"timestamp\":\"1\",\"level\":\"INFO\",\"message\":\"a\",\"seq\":1}]\n\n",
            "data: [{\"timestamp\":\"2\",\"level\":\"INFO\",\r\n",
            "data: \"message\":\"b\",\"seq\":2}]\r\n\r\n",
        ))
        .create_async()
        .await;

    let backend = client(&server);
    let payloads: Vec<String> = Backend::open_log_stream(&backend, Some("j1"))
        .await
        .unwrap()
        .map(|p| p.unwrap())
        .collect()
        .await;

    assert_eq!(payloads.len(), 2);
    assert!(payloads[0].contains("\"a\""));
    assert_eq!(
        payloads[1],
        "[{\"timestamp\":\"2\",\"level\":\"INFO\",\n\"message\":\"b\",\"seq\":2}]"
    );
    mock.assert_async().await;
}

#[tokio::test]
async fn test_log_stream_rejected() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/api/logs")
        .with_status(404)
        .create_async()
        .await;

    let backend = client(&server);
    assert!(backend.open_log_stream(None).await.is_err());
}
