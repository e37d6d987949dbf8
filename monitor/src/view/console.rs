//! Coloured terminal output

use std::sync::Mutex;

use colored::{ColoredString, Colorize};
use refresh_api::{EntryLevel, JobRef, LogEntry, QueueSnapshot};

use crate::board::QueueBoard;
use crate::inspector::InspectTarget;
use crate::session::fsm::{Outcome, Settlement};
use crate::view::{Progress, Renderer};

/// Prints the monitor's view to stdout
#[derive(Debug, Default)]
pub struct ConsoleRenderer {
    /// Print queue board changes
    show_board: bool,
    last_board: Mutex<Option<QueueSnapshot>>,
}

impl ConsoleRenderer {
    pub fn new(show_board: bool) -> Self {
        Self {
            show_board,
            last_board: Mutex::new(None),
        }
    }
}

fn level_tag(level: EntryLevel) -> ColoredString {
    match level {
        EntryLevel::Debug => level.as_str().dimmed(),
        EntryLevel::Info => level.as_str().green(),
        EntryLevel::Warning => level.as_str().yellow(),
        EntryLevel::Error => level.as_str().red().bold(),
    }
}

fn entry_line(entry: &LogEntry) -> String {
    format!(
        "{} - {} - {}",
        entry.timestamp.dimmed(),
        level_tag(entry.level),
        entry.message
    )
}

fn job_line(job: &JobRef) -> String {
    let mut line = format!("{} [{}]", job.id, job.status);
    if let Some(position) = job.position {
        line.push_str(&format!(" #{}", position));
    }
    if let Some(enqueued) = job.enqueued_at_utc() {
        line.push_str(&format!(" enqueued {}", enqueued.format("%H:%M:%S")));
    }
    if let Some(error) = &job.error {
        line.push_str(&format!(" error: {}", error));
    }
    line
}

impl Renderer for ConsoleRenderer {
    fn clear_primary(&self) {
        println!("{}", "─".repeat(60).dimmed());
    }

    fn render_entry(&self, entry: &LogEntry) {
        println!("{}", entry_line(entry));
    }

    fn show_summary(&self, text: &str) {
        println!("{}", "Summary".bold().underline());
        for line in text.lines() {
            println!("  {}", line);
        }
    }

    fn show_message(&self, message: &str) {
        println!("{} {}", "»".cyan(), message);
    }

    fn show_error(&self, error: &str) {
        eprintln!("{} {}", "error:".red().bold(), error);
    }

    fn show_progress(&self, _progress: &Progress) {}

    fn set_stale(&self, stale: bool) {
        if stale {
            println!("{}", "(log stream disconnected, reconnecting...)".yellow());
        }
    }

    fn show_outcome(&self, settlement: &Settlement) {
        let text = settlement.describe();
        let line = match settlement.outcome {
            Outcome::Success => text.green().bold(),
            Outcome::NoOp => text.cyan(),
            Outcome::Failed(_) => text.red().bold(),
        };
        println!("{}", line);
        if settlement.degraded {
            println!(
                "{}",
                "warning: the workbook may still be locked; verify it before downloading".yellow()
            );
        }
    }

    fn render_board(&self, board: &QueueBoard) {
        if !self.show_board {
            return;
        }
        let Some(snapshot) = &board.snapshot else {
            return;
        };

        let mut last = self.last_board.lock().unwrap_or_else(|e| e.into_inner());
        if last.as_ref() == Some(snapshot) {
            return;
        }
        *last = Some(snapshot.clone());

        println!("{}", "Queue".bold());
        match &snapshot.running {
            Some(job) => println!("  running: {}", job_line(job)),
            None => println!("  running: {}", "none".dimmed()),
        }
        for job in &snapshot.queued {
            println!("  queued:  {}", job_line(job));
        }
        for job in snapshot.history.iter().take(5) {
            println!("  done:    {}", job_line(job).dimmed());
        }
    }

    fn open_inspector(&self, target: &InspectTarget) {
        match target.enqueued_at {
            Some(at) => println!(
                "{} {} (enqueued {})",
                "Inspecting".bold(),
                target.job_id,
                at.format("%Y-%m-%d %H:%M:%S")
            ),
            None => println!("{} {}", "Inspecting".bold(), target.job_id),
        }
    }

    fn render_inspector_entry(&self, entry: &LogEntry) {
        println!("{} {}", "│".blue(), entry_line(entry));
    }

    fn set_inspector_stale(&self, stale: bool) {
        if stale {
            println!("{}", "(inspector stream disconnected, reconnecting...)".yellow());
        }
    }

    fn close_inspector(&self) {
        println!("{}", "Inspector closed".dimmed());
    }
}
