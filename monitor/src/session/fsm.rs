//! Completion-gating state machine for the primary job
//!
//! The backend flips a job to `completed` before the client is guaranteed to
//! have seen the summary and the workbook unlock on the log stream. A
//! `completed` report therefore moves the session to `Settling`, and the
//! session only settles once both signals were observed or the grace window
//! has elapsed since the first `completed` report.
//!
//! The machine performs no I/O. Each event returns the [`Command`]s the
//! runtime has to carry out.

use std::time::{Duration, Instant};

use refresh_api::{JobState, JobStatus, LogEntry, SubmitResponse};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::board::Cadence;
use crate::errors::MonitorError;
use crate::stream::processor::StreamOutput;

/// How long a `completed` report may go unconfirmed before the session
/// settles anyway
pub const GRACE_WINDOW: Duration = Duration::from_millis(3000);

/// Sub-state while the job is tracked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivePhase {
    Queued,
    Running,
}

/// How a job ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "error", rename_all = "snake_case")]
pub enum Outcome {
    /// New data was produced
    Success,
    /// The refresh ran but nothing changed
    NoOp,
    Failed(String),
}

/// Terminal result of a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Settlement {
    pub job_id: Option<String>,
    pub outcome: Outcome,
    /// Settled by the grace window without both confirmation signals
    pub degraded: bool,
}

impl Settlement {
    pub fn is_failure(&self) -> bool {
        matches!(self.outcome, Outcome::Failed(_))
    }

    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            Outcome::Failed(error) => Some(error),
            _ => None,
        }
    }

    /// Whether the output workbook is known to be released. A grace
    /// completion never confirms it.
    pub fn artifact_confirmed(&self) -> bool {
        !self.degraded && !self.is_failure()
    }

    pub fn describe(&self) -> String {
        let text = match &self.outcome {
            Outcome::Success => "Data updated; the latest workbook is available.".to_string(),
            Outcome::NoOp => "All data is already up to date.".to_string(),
            Outcome::Failed(error) => format!("Job failed: {}", error),
        };
        if self.degraded {
            format!("{} (completion not confirmed by the job log)", text)
        } else {
            text
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Submitting,
    Active(ActivePhase),
    Settling,
    Settled(Settlement),
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Submitting => "submitting",
            SessionState::Active(ActivePhase::Queued) => "queued",
            SessionState::Active(ActivePhase::Running) => "running",
            SessionState::Settling => "settling",
            SessionState::Settled(_) => "settled",
        }
    }
}

/// Inputs to the session
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// User asked for a new job
    Start,
    Submitted(SubmitResponse),
    SubmitFailed(String),
    Status(JobStatus),
    StatusFailed(String),
    Stream(StreamOutput),
    StreamConnected,
    StreamDisconnected(String),
}

/// Side effects requested by the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    ClearView,
    Submit,
    OpenStream { job_id: Option<String> },
    CloseStream,
    StartStatusPoll { job_id: Option<String> },
    StopStatusPoll,
    SetBoardCadence(Cadence),
    ShowMessage(String),
    RenderEntry(LogEntry),
    ShowSummary(String),
    ReportError(String),
    SetStale(bool),
    /// The submission failed; no job is being tracked
    Rejected(String),
    /// A status request failed; a new job may replace this one
    Interrupted(String),
    /// Status requests succeed again after an interruption
    Resumed,
    Finalize(Settlement),
}

/// The primary job session
#[derive(Debug)]
pub struct JobSession {
    state: SessionState,
    generation: u64,
    job_id: Option<String>,
    position: Option<u32>,
    summary_received: bool,
    excel_unlocked: bool,
    first_completed_at: Option<Instant>,
    last_updated: Option<bool>,
    summary: Option<String>,
    poll_error: Option<String>,
}

impl JobSession {
    pub fn new() -> Self {
        Self {
            state: SessionState::Idle,
            generation: 0,
            job_id: None,
            position: None,
            summary_received: false,
            excel_unlocked: false,
            first_completed_at: None,
            last_updated: None,
            summary: None,
            poll_error: None,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Incremented on every start; results tagged with an older generation
    /// belong to a previous job
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn job_id(&self) -> Option<&str> {
        self.job_id.as_deref()
    }

    pub fn position(&self) -> Option<u32> {
        self.position
    }

    pub fn summary_received(&self) -> bool {
        self.summary_received
    }

    pub fn excel_unlocked(&self) -> bool {
        self.excel_unlocked
    }

    pub fn first_completed_at(&self) -> Option<Instant> {
        self.first_completed_at
    }

    pub fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    /// Error of the last status request, until one succeeds again
    pub fn poll_error(&self) -> Option<&str> {
        self.poll_error.as_deref()
    }

    pub fn settlement(&self) -> Option<&Settlement> {
        match &self.state {
            SessionState::Settled(settlement) => Some(settlement),
            _ => None,
        }
    }

    /// True from submission until settlement
    pub fn is_tracking(&self) -> bool {
        matches!(
            self.state,
            SessionState::Submitting | SessionState::Active(_) | SessionState::Settling
        )
    }

    /// Whether `Start` is accepted now. A tracked job whose status can no
    /// longer be fetched may be replaced.
    pub fn accepts_start(&self) -> bool {
        !self.is_tracking() || self.poll_error.is_some()
    }

    fn is_live(&self) -> bool {
        matches!(self.state, SessionState::Active(_) | SessionState::Settling)
    }

    /// Process an event and transition state
    pub fn handle(
        &mut self,
        event: SessionEvent,
        now: Instant,
    ) -> Result<Vec<Command>, MonitorError> {
        let commands = match event {
            SessionEvent::Start => return self.start(),
            SessionEvent::Submitted(response) => self.on_submitted(response),
            SessionEvent::SubmitFailed(error) => self.on_submit_failed(error),
            SessionEvent::Status(status) => self.on_status(status, now),
            SessionEvent::StatusFailed(error) => self.on_status_failed(error),
            SessionEvent::Stream(output) => self.on_stream(output),
            SessionEvent::StreamConnected if self.is_live() => vec![Command::SetStale(false)],
            SessionEvent::StreamDisconnected(_) if self.is_live() => vec![Command::SetStale(true)],
            SessionEvent::StreamConnected | SessionEvent::StreamDisconnected(_) => Vec::new(),
        };
        Ok(commands)
    }

    fn start(&mut self) -> Result<Vec<Command>, MonitorError> {
        if !self.accepts_start() {
            return Err(MonitorError::SessionError(format!(
                "a job is already being tracked ({})",
                self.state.name()
            )));
        }

        let mut commands = Vec::new();
        if self.is_tracking() {
            warn!(
                "Abandoning job {:?} after status failure: {:?}",
                self.job_id, self.poll_error
            );
            commands.push(Command::StopStatusPoll);
            commands.push(Command::CloseStream);
        }

        self.generation += 1;
        self.state = SessionState::Submitting;
        self.job_id = None;
        self.position = None;
        self.summary_received = false;
        self.excel_unlocked = false;
        self.first_completed_at = None;
        self.last_updated = None;
        self.summary = None;
        self.poll_error = None;

        commands.extend([
            Command::ClearView,
            Command::ShowMessage("Refreshing data, please wait...".to_string()),
            Command::Submit,
        ]);
        Ok(commands)
    }

    fn on_submitted(&mut self, response: SubmitResponse) -> Vec<Command> {
        if self.state != SessionState::Submitting {
            debug!("Ignoring submission result in state {}", self.state.name());
            return Vec::new();
        }

        let queued = response.position.is_some() || response.status.as_deref() == Some("queued");
        let phase = if queued {
            ActivePhase::Queued
        } else {
            ActivePhase::Running
        };

        self.job_id = response.job_id;
        self.position = response.position;
        self.state = SessionState::Active(phase);
        info!(
            "Job submitted: id={:?} position={:?}",
            self.job_id, self.position
        );

        vec![
            Command::OpenStream {
                job_id: self.job_id.clone(),
            },
            Command::StartStatusPoll {
                job_id: self.job_id.clone(),
            },
            Command::SetBoardCadence(Cadence::Active),
            Command::ShowMessage(self.progress_message()),
        ]
    }

    fn on_submit_failed(&mut self, error: String) -> Vec<Command> {
        if self.state != SessionState::Submitting {
            return Vec::new();
        }
        self.state = SessionState::Idle;
        vec![
            Command::ReportError(format!("Failed to start the update: {}", error)),
            Command::Rejected(error),
        ]
    }

    fn on_status_failed(&mut self, error: String) -> Vec<Command> {
        if !self.is_live() {
            return Vec::new();
        }
        let mut commands = vec![Command::ReportError(format!("Status check failed: {}", error))];
        if self.poll_error.is_none() {
            commands.push(Command::Interrupted(error.clone()));
        }
        self.poll_error = Some(error);
        commands
    }

    fn on_status(&mut self, status: JobStatus, now: Instant) -> Vec<Command> {
        if !self.is_live() {
            debug!("Ignoring status result in state {}", self.state.name());
            return Vec::new();
        }

        let mut commands = Vec::new();
        if self.poll_error.take().is_some() {
            info!("Status requests for job {:?} recovered", self.job_id);
            commands.push(Command::Resumed);
        }
        commands.extend(self.on_status_state(status, now));
        commands
    }

    fn on_status_state(&mut self, status: JobStatus, now: Instant) -> Vec<Command> {
        match status.status {
            JobState::Queued => {
                if self.state == SessionState::Settling {
                    return Vec::new();
                }
                self.state = SessionState::Active(ActivePhase::Queued);
                if status.position.is_some() {
                    self.position = status.position;
                }
                vec![Command::ShowMessage(self.progress_message())]
            }
            JobState::Running => {
                if self.state != SessionState::Active(ActivePhase::Queued) {
                    return Vec::new();
                }
                self.state = SessionState::Active(ActivePhase::Running);
                self.position = None;
                vec![Command::ShowMessage(self.progress_message())]
            }
            JobState::Failed => {
                let error = status.error.unwrap_or_else(|| "unknown error".to_string());
                self.settle(Outcome::Failed(error), false)
            }
            JobState::Completed => {
                if status.updated.is_some() {
                    self.last_updated = status.updated;
                }
                if self.state != SessionState::Settling {
                    self.state = SessionState::Settling;
                    self.first_completed_at = Some(now);
                    self.position = None;
                    debug!("Job reported completed, awaiting summary and unlock");
                }
                self.evaluate_gate(now)
            }
            JobState::Unknown => Vec::new(),
        }
    }

    fn evaluate_gate(&mut self, now: Instant) -> Vec<Command> {
        let outcome = if self.last_updated == Some(true) {
            Outcome::Success
        } else {
            Outcome::NoOp
        };

        if self.summary_received && self.excel_unlocked {
            return self.settle(outcome, false);
        }

        let elapsed = self
            .first_completed_at
            .map(|at| now.saturating_duration_since(at))
            .unwrap_or_default();
        if elapsed > GRACE_WINDOW {
            warn!(
                "Grace completion for job {:?} after {:?}: summary_received={} excel_unlocked={}",
                self.job_id, elapsed, self.summary_received, self.excel_unlocked
            );
            return self.settle(outcome, true);
        }

        Vec::new()
    }

    fn settle(&mut self, outcome: Outcome, degraded: bool) -> Vec<Command> {
        let settlement = Settlement {
            job_id: self.job_id.clone(),
            outcome,
            degraded,
        };
        info!("Job {:?} settled: {:?}", self.job_id, settlement.outcome);
        self.state = SessionState::Settled(settlement.clone());

        vec![
            Command::StopStatusPoll,
            Command::CloseStream,
            Command::SetBoardCadence(Cadence::Idle),
            Command::Finalize(settlement),
        ]
    }

    fn on_stream(&mut self, output: StreamOutput) -> Vec<Command> {
        if !self.is_live() {
            return Vec::new();
        }

        match output {
            StreamOutput::Render(entry) => vec![Command::RenderEntry(entry)],
            StreamOutput::SummaryReceived(text) => {
                self.summary_received = true;
                match text {
                    Some(text) => {
                        self.summary = Some(text.clone());
                        vec![Command::ShowSummary(text)]
                    }
                    None => Vec::new(),
                }
            }
            StreamOutput::ExcelUnlocked => {
                self.excel_unlocked = true;
                Vec::new()
            }
        }
    }

    fn progress_message(&self) -> String {
        match (&self.state, self.position) {
            (SessionState::Active(ActivePhase::Queued), Some(position)) => {
                format!("Queued at position {}", position)
            }
            (SessionState::Active(ActivePhase::Queued), None) => "Queued".to_string(),
            _ => "Job is running".to_string(),
        }
    }
}

impl Default for JobSession {
    fn default() -> Self {
        Self::new()
    }
}
