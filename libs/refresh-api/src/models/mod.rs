//! API models

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Severity attached to a backend log record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EntryLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl EntryLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryLevel::Debug => "DEBUG",
            EntryLevel::Info => "INFO",
            EntryLevel::Warning => "WARNING",
            EntryLevel::Error => "ERROR",
        }
    }
}

impl std::fmt::Display for EntryLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One record pushed over the log stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Wall-clock time as formatted by the backend (e.g. `14:03:27`)
    pub timestamp: String,

    pub level: EntryLevel,

    pub message: String,

    /// Server-assigned, globally increasing sequence number
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seq: Option<u64>,

    /// Job the record was emitted under, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
}

impl LogEntry {
    /// Single-line rendering used by both the ignore filter and the views
    pub fn display_line(&self) -> String {
        format!("{} - {} - {}", self.timestamp, self.level, self.message)
    }
}

/// Coarse job state reported by the status endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Queued,
    Running,
    Completed,
    Failed,
    /// Anything else the backend may answer (e.g. `unknown`)
    #[serde(other)]
    Unknown,
}

/// Response of the status endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,

    pub status: JobState,

    /// Queue position, meaningful only while queued
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<u32>,

    /// Whether the run produced new data, meaningful only once completed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl JobStatus {
    pub fn new(status: JobState) -> Self {
        Self {
            job_id: None,
            status,
            position: None,
            updated: None,
            error: None,
            message: None,
        }
    }
}

/// Response of the submit endpoint
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitResponse {
    /// Absent when the backend runs a default, unnamed job
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Job as listed in a queue snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRef {
    pub id: String,

    pub status: String,

    /// Unix seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enqueued_at: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<bool>,
}

impl JobRef {
    pub fn enqueued_at_utc(&self) -> Option<DateTime<Utc>> {
        self.enqueued_at.and_then(unix_secs_to_utc)
    }

    pub fn finished_at_utc(&self) -> Option<DateTime<Utc>> {
        self.finished_at.and_then(unix_secs_to_utc)
    }
}

fn unix_secs_to_utc(secs: f64) -> Option<DateTime<Utc>> {
    if !secs.is_finite() {
        return None;
    }
    let millis = (secs * 1000.0).round() as i64;
    Utc.timestamp_millis_opt(millis).single()
}

/// Point-in-time view of the backend queue
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueueSnapshot {
    #[serde(default)]
    pub running: Option<JobRef>,

    #[serde(default)]
    pub running_flag: bool,

    /// Ordered by position, ascending
    #[serde(default)]
    pub queued: Vec<JobRef>,

    /// Most recent first
    #[serde(default)]
    pub history: Vec<JobRef>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue_size: Option<usize>,
}
