//! Duplicate suppression for log entries replayed across reconnects

use std::collections::HashSet;

use refresh_api::LogEntry;

/// Derive the identity of an entry: the server sequence number when present,
/// otherwise the exact timestamp, level and message.
pub fn dedup_key(entry: &LogEntry) -> String {
    match entry.seq {
        Some(seq) => format!("seq:{}", seq),
        None => format!(
            "{}\u{1f}{}\u{1f}{}",
            entry.timestamp,
            entry.level.as_str(),
            entry.message
        ),
    }
}

/// Set of keys already rendered by one connector
#[derive(Debug, Default)]
pub struct DedupFilter {
    seen: HashSet<String>,
}

impl DedupFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the entry and return `true` if it has not been seen before
    pub fn admit(&mut self, entry: &LogEntry) -> bool {
        self.seen.insert(dedup_key(entry))
    }

    pub fn contains(&self, entry: &LogEntry) -> bool {
        self.seen.contains(&dedup_key(entry))
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
