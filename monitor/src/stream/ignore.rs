//! Noise filter for diagnostic lines the backend mixes into job logs

use std::sync::LazyLock;

use regex::{RegexSet, RegexSetBuilder};
use refresh_api::LogEntry;

use crate::errors::MonitorError;

/// Patterns suppressed in every log view
pub const DEFAULT_IGNORE_PATTERNS: &[&str] = &[
    // loopback traffic, including werkzeug access records
    r"\b127\.0\.0\.1\b",
    r"\bGET\s+/api/",
    r"======\s*WebDriver manager\s*======",
    r"found in cache",
];

static DEFAULT_SET: LazyLock<RegexSet> = LazyLock::new(|| {
    build_set(DEFAULT_IGNORE_PATTERNS).expect("default ignore patterns are valid")
});

fn build_set(patterns: &[&str]) -> Result<RegexSet, regex::Error> {
    RegexSetBuilder::new(patterns).case_insensitive(true).build()
}

/// Case-insensitive pattern set matched against `timestamp - LEVEL - message`
#[derive(Debug, Clone)]
pub struct IgnoreFilter {
    set: RegexSet,
}

impl IgnoreFilter {
    pub fn new(patterns: &[&str]) -> Result<Self, MonitorError> {
        let set = build_set(patterns)
            .map_err(|e| MonitorError::ConfigError(format!("invalid ignore pattern: {}", e)))?;
        Ok(Self { set })
    }

    pub fn is_ignored(&self, entry: &LogEntry) -> bool {
        self.set.is_match(&entry.display_line())
    }
}

impl Default for IgnoreFilter {
    fn default() -> Self {
        Self {
            set: DEFAULT_SET.clone(),
        }
    }
}
