//! In-memory view model served by the local HTTP server

use std::collections::VecDeque;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use refresh_api::LogEntry;
use serde::Serialize;

use crate::board::QueueBoard;
use crate::inspector::InspectTarget;
use crate::session::fsm::Settlement;
use crate::view::{Progress, Renderer};

/// Oldest lines are dropped beyond this count, per log view
pub const MAX_VIEW_LINES: usize = 10_000;

#[derive(Debug, Clone, Default, Serialize)]
pub struct InspectorView {
    pub target: Option<InspectTarget>,
    pub lines: VecDeque<LogEntry>,
    pub stale: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ViewModel {
    pub message: Option<String>,
    pub error: Option<String>,
    pub progress: Progress,
    pub stale: bool,
    pub lines: VecDeque<LogEntry>,
    pub summary: Option<String>,
    pub outcome: Option<Settlement>,
    pub board: QueueBoard,
    pub inspector: InspectorView,
}

fn push_capped(lines: &mut VecDeque<LogEntry>, entry: &LogEntry) {
    if lines.len() == MAX_VIEW_LINES {
        lines.pop_front();
    }
    lines.push_back(entry.clone());
}

/// Thread-safe holder of the latest [`ViewModel`]
#[derive(Debug, Default)]
pub struct ViewStore {
    model: RwLock<ViewModel>,
}

impl ViewStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the current view
    pub fn snapshot(&self) -> ViewModel {
        self.read().clone()
    }

    pub fn board(&self) -> QueueBoard {
        self.read().board.clone()
    }

    pub fn inspector(&self) -> InspectorView {
        self.read().inspector.clone()
    }

    fn read(&self) -> RwLockReadGuard<'_, ViewModel> {
        self.model.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, ViewModel> {
        self.model.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl Renderer for ViewStore {
    fn clear_primary(&self) {
        let mut model = self.write();
        model.lines.clear();
        model.summary = None;
        model.outcome = None;
        model.error = None;
        model.stale = false;
    }

    fn render_entry(&self, entry: &LogEntry) {
        push_capped(&mut self.write().lines, entry);
    }

    fn show_summary(&self, text: &str) {
        self.write().summary = Some(text.to_string());
    }

    fn show_message(&self, message: &str) {
        self.write().message = Some(message.to_string());
    }

    fn show_error(&self, error: &str) {
        self.write().error = Some(error.to_string());
    }

    fn show_progress(&self, progress: &Progress) {
        self.write().progress = progress.clone();
    }

    fn set_stale(&self, stale: bool) {
        self.write().stale = stale;
    }

    fn show_outcome(&self, settlement: &Settlement) {
        let mut model = self.write();
        model.message = Some(settlement.describe());
        model.outcome = Some(settlement.clone());
        model.stale = false;
        if let Some(error) = settlement.error() {
            model.error = Some(error.to_string());
        }
    }

    fn render_board(&self, board: &QueueBoard) {
        self.write().board = board.clone();
    }

    fn open_inspector(&self, target: &InspectTarget) {
        self.write().inspector = InspectorView {
            target: Some(target.clone()),
            lines: VecDeque::new(),
            stale: false,
        };
    }

    fn render_inspector_entry(&self, entry: &LogEntry) {
        push_capped(&mut self.write().inspector.lines, entry);
    }

    fn set_inspector_stale(&self, stale: bool) {
        self.write().inspector.stale = stale;
    }

    fn close_inspector(&self) {
        self.write().inspector = InspectorView::default();
    }
}
