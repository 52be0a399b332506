//! Bounded in-memory request log.
//!
//! [`ApiLogger`] keeps the most recent [`DEFAULT_MAX_ENTRIES`] entries in
//! insertion order and forwards each one to `tracing` at the matching
//! level, so the same events reach both an installed subscriber and
//! [`ApiLogger::export_logs`].

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::Result;
use crate::types::epoch_millis;

/// Entries kept before the oldest is evicted.
pub const DEFAULT_MAX_ENTRIES: usize = 1_000;

/// Severity of a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
    Debug,
}

impl LogLevel {
    fn tag(self) -> &'static str {
        match self {
            LogLevel::Info => "[API INFO]",
            LogLevel::Warn => "[API WARN]",
            LogLevel::Error => "[API ERROR]",
            LogLevel::Debug => "[API DEBUG]",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
            LogLevel::Debug => "debug",
        };
        f.write_str(s)
    }
}

/// One logged event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
    pub level: LogLevel,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// Append-only log with FIFO eviction.
pub struct ApiLogger {
    entries: Mutex<VecDeque<LogEntry>>,
    max_entries: usize,
    enabled: AtomicBool,
}

impl ApiLogger {
    /// Create an enabled logger holding up to [`DEFAULT_MAX_ENTRIES`].
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_ENTRIES)
    }

    pub fn with_capacity(max_entries: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(max_entries.min(DEFAULT_MAX_ENTRIES))),
            max_entries,
            enabled: AtomicBool::new(true),
        }
    }

    /// Turn recording on or off. A disabled logger stores nothing.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Record an entry and forward it to `tracing`.
    pub fn log(&self, level: LogLevel, message: impl Into<String>, data: Option<serde_json::Value>) {
        if !self.is_enabled() {
            return;
        }
        let message = message.into();
        emit(level, &message, data.as_ref());

        let entry = LogEntry {
            timestamp: epoch_millis(SystemTime::now()),
            level,
            message,
            data,
        };
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.push_back(entry);
        while entries.len() > self.max_entries {
            entries.pop_front();
        }
    }

    pub fn info(&self, message: impl Into<String>, data: Option<serde_json::Value>) {
        self.log(LogLevel::Info, message, data);
    }

    pub fn warn(&self, message: impl Into<String>, data: Option<serde_json::Value>) {
        self.log(LogLevel::Warn, message, data);
    }

    pub fn error(&self, message: impl Into<String>, data: Option<serde_json::Value>) {
        self.log(LogLevel::Error, message, data);
    }

    pub fn debug(&self, message: impl Into<String>, data: Option<serde_json::Value>) {
        self.log(LogLevel::Debug, message, data);
    }

    /// Entries in insertion order, optionally filtered by level.
    pub fn logs(&self, level: Option<LogLevel>) -> Vec<LogEntry> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries
            .iter()
            .filter(|e| level.is_none_or(|l| e.level == l))
            .cloned()
            .collect()
    }

    /// Serialize every entry to a JSON array.
    pub fn export_logs(&self) -> Result<String> {
        let entries = self.logs(None);
        Ok(serde_json::to_string_pretty(&entries)?)
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl Default for ApiLogger {
    fn default() -> Self {
        Self::new()
    }
}

fn emit(level: LogLevel, message: &str, data: Option<&serde_json::Value>) {
    let tag = level.tag();
    let data = data.map(|d| d.to_string()).unwrap_or_default();
    match level {
        LogLevel::Info => tracing::info!(target: "hermod::api", data = %data, "{tag} {message}"),
        LogLevel::Warn => tracing::warn!(target: "hermod::api", data = %data, "{tag} {message}"),
        LogLevel::Error => tracing::error!(target: "hermod::api", data = %data, "{tag} {message}"),
        LogLevel::Debug => tracing::debug!(target: "hermod::api", data = %data, "{tag} {message}"),
    }
}
