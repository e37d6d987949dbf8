//! Queue board state

use std::time::Duration;

use chrono::{DateTime, Utc};
use refresh_api::QueueSnapshot;
use serde::Serialize;

/// Poll interval while a job is being tracked
pub const ACTIVE_BOARD_INTERVAL: Duration = Duration::from_millis(2000);

/// Poll interval otherwise, including before the first submission
pub const IDLE_BOARD_INTERVAL: Duration = Duration::from_millis(5000);

/// Board polling cadence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Cadence {
    Active,
    Idle,
}

impl Cadence {
    pub fn interval(&self) -> Duration {
        match self {
            Cadence::Active => ACTIVE_BOARD_INTERVAL,
            Cadence::Idle => IDLE_BOARD_INTERVAL,
        }
    }
}

/// Last snapshot received. Each fetch replaces the previous one wholesale.
#[derive(Debug, Clone, Default, Serialize)]
pub struct QueueBoard {
    pub snapshot: Option<QueueSnapshot>,
    pub fetched_at: Option<DateTime<Utc>>,
    /// Set when the latest fetch failed and `snapshot` is older than one tick
    pub stale: bool,
}

impl QueueBoard {
    pub fn replace(&mut self, snapshot: QueueSnapshot) {
        self.snapshot = Some(snapshot);
        self.fetched_at = Some(Utc::now());
        self.stale = false;
    }

    pub fn mark_stale(&mut self) {
        self.stale = true;
    }
}
