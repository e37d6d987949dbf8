//! Rendering seam between the monitor and its outputs

pub mod console;
pub mod store;

use std::sync::Arc;

use refresh_api::LogEntry;

use crate::board::QueueBoard;
use crate::inspector::InspectTarget;
use crate::session::fsm::Settlement;

/// Projection of the session shown next to the log
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct Progress {
    pub phase: String,
    pub job_id: Option<String>,
    pub position: Option<u32>,
}

/// Output surface for the monitor. Every call replaces the matching field of
/// the view except the entry renderers, which append.
pub trait Renderer: Send + Sync {
    /// Clear the primary log, summary, outcome and error
    fn clear_primary(&self);

    fn render_entry(&self, entry: &LogEntry);

    fn show_summary(&self, text: &str);

    fn show_message(&self, message: &str);

    fn show_error(&self, error: &str);

    fn show_progress(&self, progress: &Progress);

    /// The primary stream is reconnecting
    fn set_stale(&self, stale: bool);

    fn show_outcome(&self, settlement: &Settlement);

    fn render_board(&self, board: &QueueBoard);

    fn open_inspector(&self, target: &InspectTarget);

    fn render_inspector_entry(&self, entry: &LogEntry);

    fn set_inspector_stale(&self, stale: bool);

    fn close_inspector(&self);
}

/// Forwards every call to each renderer in order
#[derive(Default, Clone)]
pub struct Fanout {
    renderers: Vec<Arc<dyn Renderer>>,
}

impl Fanout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, renderer: Arc<dyn Renderer>) -> Self {
        self.renderers.push(renderer);
        self
    }

    pub fn len(&self) -> usize {
        self.renderers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.renderers.is_empty()
    }
}

impl Renderer for Fanout {
    fn clear_primary(&self) {
        self.renderers.iter().for_each(|r| r.clear_primary());
    }

    fn render_entry(&self, entry: &LogEntry) {
        self.renderers.iter().for_each(|r| r.render_entry(entry));
    }

    fn show_summary(&self, text: &str) {
        self.renderers.iter().for_each(|r| r.show_summary(text));
    }

    fn show_message(&self, message: &str) {
        self.renderers.iter().for_each(|r| r.show_message(message));
    }

    fn show_error(&self, error: &str) {
        self.renderers.iter().for_each(|r| r.show_error(error));
    }

    fn show_progress(&self, progress: &Progress) {
        self.renderers.iter().for_each(|r| r.show_progress(progress));
    }

    fn set_stale(&self, stale: bool) {
        self.renderers.iter().for_each(|r| r.set_stale(stale));
    }

    fn show_outcome(&self, settlement: &Settlement) {
        self.renderers.iter().for_each(|r| r.show_outcome(settlement));
    }

    fn render_board(&self, board: &QueueBoard) {
        self.renderers.iter().for_each(|r| r.render_board(board));
    }

    fn open_inspector(&self, target: &InspectTarget) {
        self.renderers.iter().for_each(|r| r.open_inspector(target));
    }

    fn render_inspector_entry(&self, entry: &LogEntry) {
        self.renderers
            .iter()
            .for_each(|r| r.render_inspector_entry(entry));
    }

    fn set_inspector_stale(&self, stale: bool) {
        self.renderers
            .iter()
            .for_each(|r| r.set_inspector_stale(stale));
    }

    fn close_inspector(&self) {
        self.renderers.iter().for_each(|r| r.close_inspector());
    }
}
