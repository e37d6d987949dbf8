//! Log stream, inspector and monitor tests against a scripted backend

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use refresh_api::{JobState, JobStatus, QueueSnapshot, SubmitResponse};
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;

use refresh_monitor::board::Cadence;
use refresh_monitor::errors::MonitorError;
use refresh_monitor::http::backend::{Backend, PayloadStream};
use refresh_monitor::inspector::{InspectTarget, JobLogInspector};
use refresh_monitor::session::fsm::Outcome;
use refresh_monitor::stream::ignore::IgnoreFilter;
use refresh_monitor::stream::processor::{LogProcessor, StreamOutput};
use refresh_monitor::view::store::ViewStore;
use refresh_monitor::workers::log_stream::{LogConnector, StreamEvent, RECONNECT_DELAY};
use refresh_monitor::workers::board_poller;
use refresh_monitor::workers::monitor::{JobReport, Monitor};

/// One scripted connection: its payloads, then either end or stay open
struct Connection {
    payloads: Vec<String>,
    hold: bool,
}

fn ends(payloads: &[&str]) -> Connection {
    Connection {
        payloads: payloads.iter().map(|p| p.to_string()).collect(),
        hold: false,
    }
}

fn holds(payloads: &[&str]) -> Connection {
    Connection {
        payloads: payloads.iter().map(|p| p.to_string()).collect(),
        hold: true,
    }
}

#[derive(Default)]
struct FakeBackend {
    connections: Mutex<HashMap<String, VecDeque<Connection>>>,
    opens: Mutex<Vec<(Option<String>, Instant)>>,
    statuses: Mutex<VecDeque<JobStatus>>,
    status_error: Mutex<Option<String>>,
    snapshots: Mutex<Vec<Instant>>,
}

impl FakeBackend {
    fn script(&self, job_id: &str, connections: Vec<Connection>) {
        self.connections
            .lock()
            .unwrap()
            .insert(job_id.to_string(), connections.into());
    }

    fn statuses(&self, statuses: Vec<JobStatus>) {
        *self.statuses.lock().unwrap() = statuses.into();
    }

    fn fail_status(&self, error: &str) {
        *self.status_error.lock().unwrap() = Some(error.to_string());
    }

    fn snapshot_times(&self) -> Vec<Instant> {
        self.snapshots.lock().unwrap().clone()
    }

    fn open_times(&self) -> Vec<Instant> {
        self.opens.lock().unwrap().iter().map(|(_, at)| *at).collect()
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn submit_job(&self) -> Result<SubmitResponse, MonitorError> {
        Ok(SubmitResponse {
            job_id: Some("job-1".to_string()),
            position: None,
            status: Some("running".to_string()),
            message: None,
        })
    }

    async fn get_status(&self, _job_id: Option<&str>) -> Result<JobStatus, MonitorError> {
        if let Some(error) = self.status_error.lock().unwrap().clone() {
            return Err(MonitorError::BackendError(error));
        }
        let mut statuses = self.statuses.lock().unwrap();
        let status = if statuses.len() > 1 {
            statuses.pop_front()
        } else {
            statuses.front().cloned()
        };
        Ok(status.unwrap_or_else(|| JobStatus::new(JobState::Running)))
    }

    async fn open_log_stream(&self, job_id: Option<&str>) -> Result<PayloadStream, MonitorError> {
        self.opens
            .lock()
            .unwrap()
            .push((job_id.map(str::to_string), Instant::now()));

        let key = job_id.unwrap_or_default().to_string();
        let next = self
            .connections
            .lock()
            .unwrap()
            .get_mut(&key)
            .and_then(|c| c.pop_front());

        match next {
            Some(connection) => {
                let payloads = stream::iter(connection.payloads.into_iter().map(Ok));
                if connection.hold {
                    Ok(Box::pin(payloads.chain(stream::pending())))
                } else {
                    Ok(Box::pin(payloads))
                }
            }
            None => Ok(Box::pin(stream::pending())),
        }
    }

    async fn get_queue_snapshot(&self) -> Result<QueueSnapshot, MonitorError> {
        self.snapshots.lock().unwrap().push(Instant::now());
        Ok(QueueSnapshot::default())
    }
}

fn rendered(events: &[StreamEvent]) -> Vec<String> {
    events
        .iter()
        .flat_map(|event| match event {
            StreamEvent::Outputs(outputs) => outputs.clone(),
            _ => Vec::new(),
        })
        .filter_map(|output| match output {
            StreamOutput::Render(entry) => Some(entry.message),
            _ => None,
        })
        .collect()
}

async fn collect(rx: &mut mpsc::UnboundedReceiver<StreamEvent>, count: usize) -> Vec<StreamEvent> {
    let mut events = Vec::with_capacity(count);
    for _ in 0..count {
        events.push(rx.recv().await.unwrap());
    }
    events
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_after_fixed_delay() {
    let backend = Arc::new(FakeBackend::default());
    backend.script("job-1", vec![ends(&[]), ends(&[])]);

    let (tx, mut rx) = mpsc::unbounded_channel();
    let _connector = LogConnector::open(
        backend.clone(),
        Some("job-1".to_string()),
        LogProcessor::primary(IgnoreFilter::default()),
        tx,
        |event| event,
    );

    let events = collect(&mut rx, 5).await;
    assert_eq!(events[0], StreamEvent::Connected);
    assert!(matches!(
        events[1],
        StreamEvent::Disconnected { retry_in, .. } if retry_in == RECONNECT_DELAY
    ));
    assert_eq!(events[2], StreamEvent::Connected);

    let opens = backend.open_times();
    assert_eq!(opens.len(), 3);
    assert_eq!(opens[1] - opens[0], Duration::from_millis(3000));
    assert_eq!(opens[2] - opens[1], Duration::from_millis(3000));
}

#[tokio::test(start_paused = true)]
async fn test_dedup_survives_reconnect() {
    let backend = Arc::new(FakeBackend::default());
    backend.script(
        "job-1",
        vec![
            ends(&[
                r#"[{"timestamp":"1","level":"INFO","message":"one","seq":1},
                    {"timestamp":"2","level":"INFO","message":"two","seq":2}]"#,
            ]),
            holds(&[
                r#"[{"timestamp":"2","level":"INFO","message":"two","seq":2},
                    {"timestamp":"3","level":"INFO","message":"three","seq":3}]"#,
            ]),
        ],
    );

    let (tx, mut rx) = mpsc::unbounded_channel();
    let _connector = LogConnector::open(
        backend.clone(),
        Some("job-1".to_string()),
        LogProcessor::primary(IgnoreFilter::default()),
        tx,
        |event| event,
    );

    // connected, outputs, disconnected, connected, outputs
    let events = collect(&mut rx, 5).await;
    assert_eq!(rendered(&events), vec!["one", "two", "three"]);
}

#[tokio::test(start_paused = true)]
async fn test_malformed_payload_is_skipped() {
    let backend = Arc::new(FakeBackend::default());
    backend.script(
        "job-1",
        vec![holds(&[
            "not json",
            r#"{"message":"object"}"#,
            r#"[{"timestamp":"1","level":"INFO","message":"kept"}]"#,
        ])],
    );

    let (tx, mut rx) = mpsc::unbounded_channel();
    let _connector = LogConnector::open(
        backend.clone(),
        Some("job-1".to_string()),
        LogProcessor::primary(IgnoreFilter::default()),
        tx,
        |event| event,
    );

    let events = collect(&mut rx, 2).await;
    assert_eq!(rendered(&events), vec!["kept"]);
}

#[tokio::test(start_paused = true)]
async fn test_close_stops_reconnecting() {
    let backend = Arc::new(FakeBackend::default());
    backend.script("job-1", vec![ends(&[])]);

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut connector = LogConnector::open(
        backend.clone(),
        Some("job-1".to_string()),
        LogProcessor::raw(IgnoreFilter::default()),
        tx,
        |event| event,
    );
    collect(&mut rx, 2).await;

    connector.close();
    connector.close();
    tokio::time::sleep(RECONNECT_DELAY * 3).await;
    assert_eq!(backend.open_times().len(), 1);
    assert!(!connector.is_open());
}

#[tokio::test(start_paused = true)]
async fn test_inspector_isolation() {
    let payload = r#"[{"timestamp":"1","level":"INFO","message":"SUMMARY_START","seq":7},
                      {"timestamp":"1","level":"INFO","message":"127.0.0.1 - GET /api/queue","seq":8}]"#;
    let backend = Arc::new(FakeBackend::default());
    backend.script("a", vec![holds(&[payload])]);
    backend.script("b", vec![holds(&[payload])]);

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut inspector = JobLogInspector::new();

    let first = inspector.open(
        InspectTarget {
            job_id: "a".to_string(),
            enqueued_at: None,
        },
        backend.clone(),
        IgnoreFilter::default(),
        tx.clone(),
        |generation, event| (generation, event),
    );
    let mut events = Vec::new();
    for _ in 0..2 {
        events.push(rx.recv().await.unwrap());
    }
    assert!(events.iter().all(|(g, _)| *g == first));
    let a_events: Vec<_> = events.into_iter().map(|(_, e)| e).collect();
    assert_eq!(rendered(&a_events), vec!["SUMMARY_START"]);

    let second = inspector.open(
        InspectTarget {
            job_id: "b".to_string(),
            enqueued_at: None,
        },
        backend.clone(),
        IgnoreFilter::default(),
        tx,
        |generation, event| (generation, event),
    );
    assert!(!inspector.is_current(first));
    assert!(inspector.is_current(second));

    let mut events = Vec::new();
    for _ in 0..2 {
        events.push(rx.recv().await.unwrap());
    }
    let b_events: Vec<_> = events.into_iter().map(|(_, e)| e).collect();
    assert_eq!(rendered(&b_events), vec!["SUMMARY_START"]);

    inspector.close();
    inspector.close();
    assert!(!inspector.is_open());
}

#[tokio::test(start_paused = true)]
async fn test_monitor_settles_on_confirmed_completion() {
    let backend = Arc::new(FakeBackend::default());
    backend.script(
        "job-1",
        vec![holds(&[
            r#"[{"timestamp":"1","level":"INFO","message":"fetching rates","seq":1},
                {"timestamp":"2","level":"INFO","message":"127.0.0.1 - - \"GET /api/status\" 200","seq":2},
                {"timestamp":"3","level":"INFO","message":"SUMMARY_START","seq":3},
                {"timestamp":"3","level":"INFO","message":"  line one","seq":4},
                {"timestamp":"3","level":"INFO","message":"SUMMARY_END","seq":5}]"#,
            r#"[{"timestamp":"4","level":"INFO","message":"SHOW_SUMMARY","seq":6},
                {"timestamp":"4","level":"INFO","message":"EXCEL_UNLOCKED","seq":7}]"#,
        ])],
    );
    let mut done = JobStatus::new(JobState::Completed);
    done.updated = Some(true);
    backend.statuses(vec![done]);

    let store = Arc::new(ViewStore::new());
    let (monitor, handle) = Monitor::new(backend.clone(), store.clone(), IgnoreFilter::default());
    tokio::spawn(monitor.run(Box::pin(std::future::pending())));

    let generation = handle.start_job().await.unwrap();
    let settlement = handle.wait_settled(generation).await.unwrap();
    assert_eq!(settlement.outcome, Outcome::Success);
    assert!(!settlement.degraded);

    let view = store.snapshot();
    let lines: Vec<_> = view.lines.iter().map(|e| e.message.as_str()).collect();
    assert_eq!(lines, vec!["fetching rates"]);
    assert_eq!(view.summary.as_deref(), Some("line one\n"));
    assert_eq!(view.outcome.unwrap().outcome, Outcome::Success);
}

#[tokio::test(start_paused = true)]
async fn test_monitor_grace_completion_without_markers() {
    let backend = Arc::new(FakeBackend::default());
    backend.statuses(vec![JobStatus::new(JobState::Completed)]);

    let store = Arc::new(ViewStore::new());
    let (monitor, handle) = Monitor::new(backend.clone(), store.clone(), IgnoreFilter::default());
    tokio::spawn(monitor.run(Box::pin(std::future::pending())));

    let started = Instant::now();
    let generation = handle.start_job().await.unwrap();
    let settlement = handle.wait_settled(generation).await.unwrap();

    // completed first seen at 2s, still inside the window at 4s, settled at 6s
    assert_eq!(started.elapsed(), Duration::from_millis(6000));
    assert_eq!(settlement.outcome, Outcome::NoOp);
    assert!(settlement.degraded);
}

#[tokio::test(start_paused = true)]
async fn test_monitor_rejects_second_start() {
    let backend = Arc::new(FakeBackend::default());
    let store = Arc::new(ViewStore::new());
    let (monitor, handle) = Monitor::new(backend, store, IgnoreFilter::default());
    tokio::spawn(monitor.run(Box::pin(std::future::pending())));

    handle.start_job().await.unwrap();
    assert!(matches!(
        handle.start_job().await,
        Err(MonitorError::SessionError(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_monitor_status_failure_allows_new_job() {
    let backend = Arc::new(FakeBackend::default());
    backend.fail_status("GET status: 404 Not Found: {\"status\":\"unknown\"}");

    let store = Arc::new(ViewStore::new());
    let (monitor, handle) = Monitor::new(backend.clone(), store.clone(), IgnoreFilter::default());
    tokio::spawn(monitor.run(Box::pin(std::future::pending())));

    let started = Instant::now();
    let generation = handle.start_job().await.unwrap();
    let result = handle.wait_settled(generation).await;
    assert!(matches!(result, Err(MonitorError::BackendError(ref e)) if e.contains("404")));
    assert_eq!(started.elapsed(), Duration::from_millis(2000));
    assert!(matches!(
        handle.report(),
        JobReport::Interrupted { generation: 1, .. }
    ));
    assert!(store.snapshot().error.unwrap().contains("404"));

    assert_eq!(handle.start_job().await.unwrap(), 2);
    tokio::time::sleep(Duration::from_millis(10)).await;
    // the replaced job's stream is closed and a new one opened
    assert_eq!(backend.open_times().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_board_poller_follows_cadence() {
    let backend = Arc::new(FakeBackend::default());
    let (cadence_tx, cadence_rx) = watch::channel(Cadence::Idle);
    let (tx, mut rx) = mpsc::unbounded_channel();

    let started = Instant::now();
    tokio::spawn(board_poller::run(
        backend.clone(),
        cadence_rx,
        tx,
        |result| result,
        tokio::time::sleep,
        Box::pin(std::future::pending()),
    ));

    tokio::time::sleep(Duration::from_millis(12000)).await;
    cadence_tx.send(Cadence::Active).unwrap();
    tokio::time::sleep(Duration::from_millis(5000)).await;
    cadence_tx.send(Cadence::Idle).unwrap();
    tokio::time::sleep(Duration::from_millis(6000)).await;

    let offsets: Vec<u64> = backend
        .snapshot_times()
        .iter()
        .map(|at| at.duration_since(started).as_millis() as u64)
        .collect();
    // idle every 5s, immediate fetch on each change, active every 2s
    assert_eq!(offsets, vec![0, 5000, 10000, 12000, 14000, 16000, 17000, 22000]);

    let mut fetched = 0;
    while let Ok(result) = rx.try_recv() {
        assert!(result.is_ok());
        fetched += 1;
    }
    assert_eq!(fetched, offsets.len());
}
