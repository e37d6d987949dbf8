//! The monitor actor
//!
//! A single task owns the job session, the inspector and the queue board.
//! Requests, pollers and connectors run in their own tasks and report back
//! through one channel, so every state change happens here, in arrival order.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use refresh_api::{JobStatus, QueueSnapshot, SubmitResponse};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, error, info, warn};

use crate::board::{Cadence, QueueBoard};
use crate::errors::MonitorError;
use crate::http::backend::Backend;
use crate::inspector::{InspectTarget, JobLogInspector};
use crate::session::fsm::{Command, JobSession, SessionEvent, Settlement};
use crate::stream::ignore::IgnoreFilter;
use crate::stream::processor::{LogProcessor, StreamOutput};
use crate::view::{Progress, Renderer};
use crate::workers::log_stream::{LogConnector, StreamEvent};
use crate::workers::status_poller::StatusPoller;

/// Messages handled by the monitor
#[derive(Debug)]
pub enum MonitorMessage {
    StartJob {
        reply: oneshot::Sender<Result<u64, MonitorError>>,
    },
    OpenInspector {
        target: InspectTarget,
    },
    CloseInspector,

    Submitted {
        generation: u64,
        result: Result<SubmitResponse, MonitorError>,
    },
    Status {
        generation: u64,
        result: Result<JobStatus, MonitorError>,
    },
    Primary {
        generation: u64,
        event: StreamEvent,
    },
    Inspector {
        generation: u64,
        event: StreamEvent,
    },
    Board(Result<QueueSnapshot, MonitorError>),
}

/// Latest job lifecycle report, keyed by session generation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobReport {
    None,
    Tracking { generation: u64 },
    Settled { generation: u64, settlement: Settlement },
    Rejected { generation: u64, error: String },
    /// Status requests for the job fail; a new job may be started
    Interrupted { generation: u64, error: String },
}

/// Cloneable front end of the monitor
#[derive(Clone)]
pub struct MonitorHandle {
    tx: mpsc::UnboundedSender<MonitorMessage>,
    report: watch::Receiver<JobReport>,
}

impl MonitorHandle {
    /// Start a new job. Fails while another job is tracked, unless its
    /// status requests are failing.
    ///
    /// Returns the generation of the new session, to be passed to
    /// [`MonitorHandle::wait_settled`].
    pub async fn start_job(&self) -> Result<u64, MonitorError> {
        let (reply, rx) = oneshot::channel();
        self.send(MonitorMessage::StartJob { reply })?;
        rx.await
            .map_err(|_| MonitorError::Internal("monitor dropped the request".to_string()))?
    }

    pub fn open_inspector(&self, target: InspectTarget) -> Result<(), MonitorError> {
        self.send(MonitorMessage::OpenInspector { target })
    }

    pub fn close_inspector(&self) -> Result<(), MonitorError> {
        self.send(MonitorMessage::CloseInspector)
    }

    pub fn report(&self) -> JobReport {
        self.report.borrow().clone()
    }

    /// Wait until the session of `generation` settles, its submission is
    /// rejected or its status can no longer be fetched
    pub async fn wait_settled(&self, generation: u64) -> Result<Settlement, MonitorError> {
        let mut report = self.report.clone();
        loop {
            match &*report.borrow_and_update() {
                JobReport::Settled {
                    generation: g,
                    settlement,
                } if *g == generation => return Ok(settlement.clone()),
                JobReport::Rejected { generation: g, error }
                | JobReport::Interrupted { generation: g, error }
                    if *g == generation =>
                {
                    return Err(MonitorError::BackendError(error.clone()))
                }
                _ => {}
            }
            report
                .changed()
                .await
                .map_err(|_| MonitorError::Internal("monitor stopped".to_string()))?;
        }
    }

    /// Raw sender for workers reporting into the monitor
    pub fn sender(&self) -> mpsc::UnboundedSender<MonitorMessage> {
        self.tx.clone()
    }

    fn send(&self, message: MonitorMessage) -> Result<(), MonitorError> {
        self.tx
            .send(message)
            .map_err(|_| MonitorError::Internal("monitor is not running".to_string()))
    }
}

pub struct Monitor {
    backend: Arc<dyn Backend>,
    renderer: Arc<dyn Renderer>,
    ignore: IgnoreFilter,

    session: JobSession,
    connector: Option<LogConnector>,
    poller: StatusPoller,
    inspector: JobLogInspector,
    board: QueueBoard,

    cadence_tx: watch::Sender<Cadence>,
    report_tx: watch::Sender<JobReport>,
    tx: mpsc::UnboundedSender<MonitorMessage>,
    rx: mpsc::UnboundedReceiver<MonitorMessage>,
}

impl Monitor {
    pub fn new(
        backend: Arc<dyn Backend>,
        renderer: Arc<dyn Renderer>,
        ignore: IgnoreFilter,
    ) -> (Self, MonitorHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (cadence_tx, _) = watch::channel(Cadence::Idle);
        let (report_tx, report_rx) = watch::channel(JobReport::None);

        let handle = MonitorHandle {
            tx: tx.clone(),
            report: report_rx,
        };
        let monitor = Self {
            backend,
            renderer,
            ignore,
            session: JobSession::new(),
            connector: None,
            poller: StatusPoller::new(),
            inspector: JobLogInspector::new(),
            board: QueueBoard::default(),
            cadence_tx,
            report_tx,
            tx,
            rx,
        };
        (monitor, handle)
    }

    /// Receiver of the queue board cadence
    pub fn cadence(&self) -> watch::Receiver<Cadence> {
        self.cadence_tx.subscribe()
    }

    pub fn session(&self) -> &JobSession {
        &self.session
    }

    /// Process messages until shutdown
    pub async fn run(mut self, mut shutdown_signal: Pin<Box<dyn Future<Output = ()> + Send>>) {
        info!("Monitor starting...");

        loop {
            tokio::select! {
                _ = &mut shutdown_signal => {
                    info!("Monitor shutting down...");
                    break;
                }
                message = self.rx.recv() => {
                    match message {
                        Some(message) => self.handle_message(message),
                        None => break,
                    }
                }
            }
        }

        self.poller.stop();
        if let Some(mut connector) = self.connector.take() {
            connector.close();
        }
        self.inspector.close();
    }

    pub fn handle_message(&mut self, message: MonitorMessage) {
        let generation_now = self.session.generation();

        match message {
            MonitorMessage::StartJob { reply } => {
                let result = self
                    .apply(SessionEvent::Start)
                    .map(|_| self.session.generation());
                if let Ok(generation) = result {
                    self.report_tx.send_replace(JobReport::Tracking { generation });
                }
                let _ = reply.send(result);
            }
            MonitorMessage::OpenInspector { target } => self.open_inspector(target),
            MonitorMessage::CloseInspector => {
                if self.inspector.is_open() {
                    self.inspector.close();
                    self.renderer.close_inspector();
                }
            }
            MonitorMessage::Submitted { generation, result } if generation == generation_now => {
                let event = match result {
                    Ok(response) => SessionEvent::Submitted(response),
                    Err(e) => {
                        error!("Job submission failed: {}", e);
                        SessionEvent::SubmitFailed(e.to_string())
                    }
                };
                self.dispatch(event);
            }
            MonitorMessage::Status { generation, result } if generation == generation_now => {
                let event = match result {
                    Ok(status) => SessionEvent::Status(status),
                    Err(e) => {
                        warn!("Status request failed: {}", e);
                        SessionEvent::StatusFailed(e.to_string())
                    }
                };
                self.dispatch(event);
            }
            MonitorMessage::Primary { generation, event } if generation == generation_now => {
                match event {
                    StreamEvent::Connected => self.dispatch(SessionEvent::StreamConnected),
                    StreamEvent::Outputs(outputs) => {
                        for output in outputs {
                            self.dispatch(SessionEvent::Stream(output));
                        }
                    }
                    StreamEvent::Disconnected { reason, .. } => {
                        self.dispatch(SessionEvent::StreamDisconnected(reason))
                    }
                }
            }
            MonitorMessage::Inspector { generation, event }
                if self.inspector.is_current(generation) =>
            {
                self.on_inspector_event(event)
            }
            MonitorMessage::Board(result) => {
                match result {
                    Ok(snapshot) => self.board.replace(snapshot),
                    Err(e) => {
                        warn!("Queue board request failed: {}", e);
                        self.board.mark_stale();
                    }
                }
                self.renderer.render_board(&self.board);
            }
            stale => debug!("Dropping stale message: {:?}", stale),
        }
    }

    fn dispatch(&mut self, event: SessionEvent) {
        if let Err(e) = self.apply(event) {
            warn!("Session rejected event: {}", e);
        }
    }

    fn apply(&mut self, event: SessionEvent) -> Result<(), MonitorError> {
        let now = tokio::time::Instant::now().into_std();
        let commands = self.session.handle(event, now)?;
        for command in commands {
            self.execute(command);
        }
        self.renderer.show_progress(&Progress {
            phase: self.session.state().name().to_string(),
            job_id: self.session.job_id().map(str::to_string),
            position: self.session.position(),
        });
        Ok(())
    }

    fn execute(&mut self, command: Command) {
        let generation = self.session.generation();

        match command {
            Command::ClearView => self.renderer.clear_primary(),
            Command::Submit => {
                let backend = self.backend.clone();
                let tx = self.tx.clone();
                tokio::spawn(async move {
                    let result = backend.submit_job().await;
                    let _ = tx.send(MonitorMessage::Submitted { generation, result });
                });
            }
            Command::OpenStream { job_id } => {
                self.close_stream();
                self.connector = Some(LogConnector::open(
                    self.backend.clone(),
                    job_id,
                    LogProcessor::primary(self.ignore.clone()),
                    self.tx.clone(),
                    move |event| MonitorMessage::Primary { generation, event },
                ));
            }
            Command::CloseStream => self.close_stream(),
            Command::StartStatusPoll { job_id } => {
                self.poller.start(
                    self.backend.clone(),
                    job_id,
                    self.tx.clone(),
                    move |result| MonitorMessage::Status { generation, result },
                );
            }
            Command::StopStatusPoll => self.poller.stop(),
            Command::SetBoardCadence(cadence) => {
                self.cadence_tx.send_if_modified(|current| {
                    if *current == cadence {
                        return false;
                    }
                    *current = cadence;
                    true
                });
            }
            Command::ShowMessage(message) => self.renderer.show_message(&message),
            Command::RenderEntry(entry) => self.renderer.render_entry(&entry),
            Command::ShowSummary(text) => self.renderer.show_summary(&text),
            Command::ReportError(message) => self.renderer.show_error(&message),
            Command::SetStale(stale) => self.renderer.set_stale(stale),
            Command::Rejected(error) => {
                self.report_tx
                    .send_replace(JobReport::Rejected { generation, error });
            }
            Command::Interrupted(error) => {
                self.report_tx
                    .send_replace(JobReport::Interrupted { generation, error });
            }
            Command::Resumed => {
                self.report_tx.send_replace(JobReport::Tracking { generation });
            }
            Command::Finalize(settlement) => {
                self.renderer.show_outcome(&settlement);
                self.report_tx.send_replace(JobReport::Settled {
                    generation,
                    settlement,
                });
            }
        }
    }

    fn close_stream(&mut self) {
        if let Some(mut connector) = self.connector.take() {
            connector.close();
        }
    }

    fn open_inspector(&mut self, target: InspectTarget) {
        self.inspector.open(
            target.clone(),
            self.backend.clone(),
            self.ignore.clone(),
            self.tx.clone(),
            |generation, event| MonitorMessage::Inspector { generation, event },
        );
        self.renderer.open_inspector(&target);
    }

    fn on_inspector_event(&mut self, event: StreamEvent) {
        match event {
            StreamEvent::Connected => self.renderer.set_inspector_stale(false),
            StreamEvent::Outputs(outputs) => {
                for output in outputs {
                    if let StreamOutput::Render(entry) = output {
                        self.renderer.render_inspector_entry(&entry);
                    }
                }
            }
            StreamEvent::Disconnected { .. } => self.renderer.set_inspector_stale(true),
        }
    }
}
