//! Run progress log.
//!
//! Entries go to stderr, keeping stdout free for the CLI's JSON output, and
//! are broadcast to subscribers so an embedding caller (a scheduler, a UI)
//! can follow a run as it happens.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Entries buffered per subscriber before the slowest one starts lagging.
const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

impl LogLevel {
    fn marker(self) -> &'static str {
        match self {
            Self::Info => "",
            Self::Success => "✓ ",
            Self::Warning => "⚠️  ",
            Self::Error => "❌ ",
        }
    }
}

/// One progress line.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub at: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
    /// Nesting depth; per-table lines sit one level under their stage
    #[serde(default)]
    pub depth: u8,
}

impl LogEntry {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            at: Utc::now(),
            level,
            message: message.into(),
            depth: 0,
        }
    }

    pub fn nested(mut self, depth: u8) -> Self {
        self.depth = depth;
        self
    }

    pub fn render(&self) -> String {
        format!(
            "{}{}{}",
            "   ".repeat(self.depth as usize + 1),
            self.level.marker(),
            self.message
        )
    }
}

/// Global run log.
pub static RUN_LOG: Lazy<RunLog> = Lazy::new(RunLog::new);

pub struct RunLog {
    sender: broadcast::Sender<LogEntry>,
}

impl RunLog {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn emit(&self, entry: LogEntry) {
        eprintln!("{}", entry.render());
        // Err only means nobody is listening
        let _ = self.sender.send(entry);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LogEntry> {
        self.sender.subscribe()
    }
}

impl Default for RunLog {
    fn default() -> Self {
        Self::new()
    }
}

pub fn log_info(msg: impl Into<String>) {
    RUN_LOG.emit(LogEntry::new(LogLevel::Info, msg));
}

pub fn log_success(msg: impl Into<String>) {
    RUN_LOG.emit(LogEntry::new(LogLevel::Success, msg));
}

pub fn log_warning(msg: impl Into<String>) {
    RUN_LOG.emit(LogEntry::new(LogLevel::Warning, msg));
}

pub fn log_error(msg: impl Into<String>) {
    RUN_LOG.emit(LogEntry::new(LogLevel::Error, msg));
}

pub fn log_info_indent(msg: impl Into<String>, depth: u8) {
    RUN_LOG.emit(LogEntry::new(LogLevel::Info, msg).nested(depth));
}
