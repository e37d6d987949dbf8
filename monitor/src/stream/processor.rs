//! Per-connector pipeline turning raw SSE payloads into view updates

use refresh_api::LogEntry;
use tracing::{debug, trace};

use crate::errors::MonitorError;
use crate::stream::dedup::DedupFilter;
use crate::stream::ignore::IgnoreFilter;
use crate::stream::sentinel::{Parsed, SentinelParser};

/// Result of processing one log entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamOutput {
    /// Entry for the log view
    Render(LogEntry),

    /// Summary marker observed; the text is present when it should be shown
    SummaryReceived(Option<String>),

    ExcelUnlocked,
}

/// Decode a push payload into its valid entries, in order.
///
/// A payload that is not a JSON array is rejected; individual elements that do
/// not form a valid [`LogEntry`] are skipped.
pub fn decode_payload(data: &str) -> Result<Vec<LogEntry>, MonitorError> {
    let value: serde_json::Value = serde_json::from_str(data)?;
    let serde_json::Value::Array(items) = value else {
        return Err(MonitorError::PayloadError("expected a JSON array".to_string()));
    };

    let mut entries = Vec::with_capacity(items.len());
    for item in items {
        match serde_json::from_value::<LogEntry>(item) {
            Ok(entry) => entries.push(entry),
            Err(e) => debug!("Dropping invalid log entry: {}", e),
        }
    }
    Ok(entries)
}

/// Owns the stream state of one connector: the summary accumulator (primary
/// view only) and the dedup key set. Both survive reconnects.
#[derive(Debug)]
pub struct LogProcessor {
    sentinel: Option<SentinelParser>,
    ignore: IgnoreFilter,
    dedup: DedupFilter,
}

impl LogProcessor {
    /// Pipeline for the primary job: markers are interpreted
    pub fn primary(ignore: IgnoreFilter) -> Self {
        Self {
            sentinel: Some(SentinelParser::new()),
            ignore,
            dedup: DedupFilter::new(),
        }
    }

    /// Pipeline for the inspector: markers are ordinary lines
    pub fn raw(ignore: IgnoreFilter) -> Self {
        Self {
            sentinel: None,
            ignore,
            dedup: DedupFilter::new(),
        }
    }

    pub fn interprets_markers(&self) -> bool {
        self.sentinel.is_some()
    }

    pub fn seen_count(&self) -> usize {
        self.dedup.len()
    }

    pub fn process_payload(&mut self, data: &str) -> Result<Vec<StreamOutput>, MonitorError> {
        let entries = decode_payload(data)?;
        let mut outputs = Vec::new();
        for entry in entries {
            if let Some(output) = self.process_entry(entry) {
                outputs.push(output);
            }
        }
        Ok(outputs)
    }

    pub fn process_entry(&mut self, entry: LogEntry) -> Option<StreamOutput> {
        if let Some(sentinel) = self.sentinel.as_mut() {
            match sentinel.feed(&entry.message) {
                Parsed::Forward => {}
                Parsed::Absorbed => {
                    if !self.dedup.admit(&entry) {
                        debug!("Replayed summary line absorbed again: seq={:?}", entry.seq);
                    }
                    return None;
                }
                Parsed::Summary(text) => return Some(StreamOutput::SummaryReceived(text)),
                Parsed::ExcelUnlocked => return Some(StreamOutput::ExcelUnlocked),
            }
        }

        if self.ignore.is_ignored(&entry) {
            trace!("Ignoring noisy log line: {}", entry.message);
            return None;
        }

        if !self.dedup.admit(&entry) {
            trace!("Skipping duplicate log entry: {:?}", entry.seq);
            return None;
        }

        Some(StreamOutput::Render(entry))
    }
}
