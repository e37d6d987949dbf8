//! Control markers embedded in the job's log text
//!
//! The backend signals two side effects of a finished run through reserved
//! log messages: the result summary (framed by `SUMMARY_START` and
//! `SUMMARY_END`, or flushed by `SHOW_SUMMARY`) and the output workbook being
//! released (`EXCEL_UNLOCKED`). Marker entries are never rendered.

/// A reserved log message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    SummaryStart,
    SummaryEnd,
    ShowSummary,
    ExcelUnlocked,
}

impl Marker {
    /// Match a message against the reserved tokens, ignoring surrounding
    /// whitespace
    pub fn parse(message: &str) -> Option<Self> {
        match message.trim() {
            "SUMMARY_START" => Some(Marker::SummaryStart),
            "SUMMARY_END" => Some(Marker::SummaryEnd),
            "SHOW_SUMMARY" => Some(Marker::ShowSummary),
            "EXCEL_UNLOCKED" => Some(Marker::ExcelUnlocked),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Marker::SummaryStart => "SUMMARY_START",
            Marker::SummaryEnd => "SUMMARY_END",
            Marker::ShowSummary => "SHOW_SUMMARY",
            Marker::ExcelUnlocked => "EXCEL_UNLOCKED",
        }
    }
}

/// What the parser decided about one message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Parsed {
    /// Ordinary content for the log view
    Forward,

    /// Consumed without any outward signal (summary line or framing marker)
    Absorbed,

    /// The summary has been received. Carries the text only the first time a
    /// given summary is published.
    Summary(Option<String>),

    ExcelUnlocked,
}

/// Summary accumulator for one log stream
#[derive(Debug, Default)]
pub struct SentinelParser {
    accumulating: bool,
    buffer: String,
    published: Option<String>,
}

impl SentinelParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_accumulating(&self) -> bool {
        self.accumulating
    }

    /// Current summary buffer
    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    /// Last summary handed out
    pub fn published(&self) -> Option<&str> {
        self.published.as_deref()
    }

    pub fn feed(&mut self, message: &str) -> Parsed {
        match Marker::parse(message) {
            Some(Marker::SummaryStart) => {
                self.accumulating = true;
                self.buffer.clear();
                Parsed::Absorbed
            }
            Some(Marker::SummaryEnd) => {
                self.accumulating = false;
                if self.buffer.trim().is_empty() {
                    Parsed::Absorbed
                } else {
                    Parsed::Summary(self.publish())
                }
            }
            Some(Marker::ShowSummary) => {
                self.accumulating = false;
                if self.buffer.trim().is_empty() {
                    Parsed::Summary(None)
                } else {
                    Parsed::Summary(self.publish())
                }
            }
            Some(Marker::ExcelUnlocked) => Parsed::ExcelUnlocked,
            None if self.accumulating => {
                self.buffer.push_str(message.trim());
                self.buffer.push('\n');
                Parsed::Absorbed
            }
            None => Parsed::Forward,
        }
    }

    fn publish(&mut self) -> Option<String> {
        if self.published.as_deref() == Some(self.buffer.as_str()) {
            return None;
        }
        self.published = Some(self.buffer.clone());
        self.published.clone()
    }
}
