//! Event log sink: the ordered, timestamped record shown in the log panel.

use super::clock::elapsed_label;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

impl LogLevel {
    /// Map a backend `type` tag. Unknown or missing tags read as info.
    pub fn from_tag(tag: Option<&str>) -> Self {
        match tag.map(|t| t.trim().to_ascii_lowercase()).as_deref() {
            Some("success") => LogLevel::Success,
            Some("warning") | Some("warn") => LogLevel::Warning,
            Some("error") => LogLevel::Error,
            _ => LogLevel::Info,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            LogLevel::Info => "info",
            LogLevel::Success => "success",
            LogLevel::Warning => "warning",
            LogLevel::Error => "error",
        };
        write!(f, "{}", tag)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// `HH:MM:SS` relative to the session start
    pub timestamp: String,
    pub level: LogLevel,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct EventLogSink {
    entries: Vec<LogEntry>,
    /// Set by the first append after a reset
    started_at: Option<Instant>,
}

impl EventLogSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `message`, one entry per non-blank line, all sharing one
    /// timestamp. Returns the entries just added.
    pub fn append(&mut self, message: &str, level: LogLevel) -> &[LogEntry] {
        self.append_at(message, level, Instant::now())
    }

    pub fn append_at(&mut self, message: &str, level: LogLevel, now: Instant) -> &[LogEntry] {
        let start = *self.started_at.get_or_insert(now);
        let timestamp = elapsed_label(start, now);
        let first_new = self.entries.len();

        for line in message.lines().filter(|line| !line.trim().is_empty()) {
            self.entries.push(LogEntry {
                timestamp: timestamp.clone(),
                level,
                message: line.to_string(),
            });
        }

        &self.entries[first_new..]
    }

    /// Drop every entry and re-arm the start instant
    pub fn reset(&mut self) {
        self.entries.clear();
        self.started_at = None;
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn started_at(&self) -> Option<Instant> {
        self.started_at
    }
}
