//! Read-only log view of an arbitrary job
//!
//! The inspector runs its own connector with its own dedup set, next to and
//! independent of the primary job session. Markers are shown as ordinary
//! lines and never affect any session.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::info;

use crate::http::backend::Backend;
use crate::stream::ignore::IgnoreFilter;
use crate::stream::processor::LogProcessor;
use crate::workers::log_stream::{LogConnector, StreamEvent};

/// Job selected for inspection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InspectTarget {
    pub job_id: String,
    #[serde(default)]
    pub enqueued_at: Option<DateTime<Utc>>,
}

struct InspectorSession {
    target: InspectTarget,
    connector: LogConnector,
}

/// At most one open inspector session
#[derive(Default)]
pub struct JobLogInspector {
    session: Option<InspectorSession>,
    generation: u64,
}

impl JobLogInspector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open an inspector session, replacing any open one. Events are tagged
    /// with the returned generation.
    pub fn open<M, F>(
        &mut self,
        target: InspectTarget,
        backend: Arc<dyn Backend>,
        ignore: IgnoreFilter,
        tx: mpsc::UnboundedSender<M>,
        wrap: F,
    ) -> u64
    where
        M: Send + 'static,
        F: Fn(u64, StreamEvent) -> M + Send + 'static,
    {
        self.close();
        self.generation += 1;
        let generation = self.generation;

        info!("Inspecting job {}", target.job_id);
        let connector = LogConnector::open(
            backend,
            Some(target.job_id.clone()),
            LogProcessor::raw(ignore),
            tx,
            move |event| wrap(generation, event),
        );
        self.session = Some(InspectorSession { target, connector });
        generation
    }

    /// Close the session and discard its seen keys. Safe to call repeatedly.
    pub fn close(&mut self) {
        if let Some(mut session) = self.session.take() {
            info!("Closing inspector for job {}", session.target.job_id);
            session.connector.close();
        }
    }

    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    pub fn target(&self) -> Option<&InspectTarget> {
        self.session.as_ref().map(|s| &s.target)
    }

    /// Whether events tagged with `generation` belong to the open session
    pub fn is_current(&self, generation: u64) -> bool {
        self.session.is_some() && generation == self.generation
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}
