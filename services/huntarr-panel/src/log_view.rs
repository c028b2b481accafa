//! Append-only tail of backend log records

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::config::MIN_LOG_BUFFER;
use crate::html::escape_html;

/// One log line as sent over the log socket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

fn default_level() -> String {
    "info".to_string()
}

impl LogRecord {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: default_level(),
            message: message.into(),
            timestamp: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    /// Classify a wire level; unknown levels count as info
    pub fn classify(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "debug" | "trace" => LogLevel::Debug,
            "warning" | "warn" => LogLevel::Warning,
            "error" => LogLevel::Error,
            "critical" | "fatal" => LogLevel::Critical,
            _ => LogLevel::Info,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warning",
            LogLevel::Error => "error",
            LogLevel::Critical => "critical",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogRow {
    pub seq: u64,
    pub level: LogLevel,
    pub message: String,
    pub timestamp: Option<String>,
}

impl LogRow {
    pub fn to_html(&self) -> String {
        let timestamp = self
            .timestamp
            .as_deref()
            .map(|ts| format!(r#"<span class="log-timestamp">{}</span> "#, escape_html(ts)))
            .unwrap_or_default();
        format!(
            r#"<div class="log-entry log-{level}" id="log-{seq}">{timestamp}<span class="log-level">{level}</span> <span class="log-message">{message}</span></div>"#,
            level = self.level,
            seq = self.seq,
            timestamp = timestamp,
            message = escape_html(&self.message),
        )
    }
}

/// Bounded buffer of rendered log rows, oldest evicted first
#[derive(Debug)]
pub struct LogView {
    rows: VecDeque<LogRow>,
    capacity: usize,
    auto_scroll: bool,
    scroll_target: Option<u64>,
    next_seq: u64,
}

impl LogView {
    pub fn new(capacity: usize, auto_scroll: bool) -> Self {
        Self {
            rows: VecDeque::new(),
            capacity: capacity.max(MIN_LOG_BUFFER),
            auto_scroll,
            scroll_target: None,
            next_seq: 1,
        }
    }

    pub fn append(&mut self, record: LogRecord) {
        if self.rows.len() >= self.capacity {
            self.rows.pop_front();
        }
        let row = LogRow {
            seq: self.next_seq,
            level: LogLevel::classify(&record.level),
            message: record.message,
            timestamp: record.timestamp,
        };
        self.next_seq += 1;
        if self.auto_scroll {
            self.scroll_target = Some(row.seq);
        }
        self.rows.push_back(row);
    }

    pub fn clear(&mut self) {
        self.rows.clear();
        self.scroll_target = None;
    }

    pub fn rows(&self) -> impl Iterator<Item = &LogRow> {
        self.rows.iter()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Sequence number of the row the view should scroll to
    pub fn scroll_target(&self) -> Option<u64> {
        self.scroll_target
    }

    pub fn set_auto_scroll(&mut self, enabled: bool) {
        self.auto_scroll = enabled;
    }

    pub fn render_html(&self) -> Vec<String> {
        self.rows.iter().map(LogRow::to_html).collect()
    }
}

/// Shared log view; written from the socket callback, so never held across `.await`
pub type LogViewHandle = Arc<Mutex<LogView>>;

pub fn new_log_view_handle(capacity: usize, auto_scroll: bool) -> LogViewHandle {
    Arc::new(Mutex::new(LogView::new(capacity, auto_scroll)))
}

/// Run `f` against the shared view, recovering from a poisoned lock
pub fn with_log_view<T>(handle: &LogViewHandle, f: impl FnOnce(&mut LogView) -> T) -> T {
    match handle.lock() {
        Ok(mut view) => f(&mut *view),
        Err(poisoned) => f(&mut *poisoned.into_inner()),
    }
}
