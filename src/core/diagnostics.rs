//! Diagnostic channel for the relay's own failures
//!
//! Relay errors must never travel through the relay itself (a broken sink
//! would recurse). They go straight to stderr with a `[log_relay]` prefix
//! and into a bounded in-memory ring that callers and tests can inspect.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;

/// Entries kept in memory; older ones are discarded
pub const DIAGNOSTICS_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => write!(f, "WARN"),
            Severity::Error => write!(f, "ERROR"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub at: DateTime<Utc>,
    pub severity: Severity,
    pub message: String,
}

#[derive(Debug)]
pub struct Diagnostics {
    entries: Mutex<VecDeque<Diagnostic>>,
    echo_stderr: bool,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(16)),
            echo_stderr: true,
        }
    }

    /// Keep entries in memory only
    pub fn silent() -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(16)),
            echo_stderr: false,
        }
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.report(Severity::Warning, message.into());
    }

    pub fn error(&self, message: impl Into<String>) {
        self.report(Severity::Error, message.into());
    }

    fn report(&self, severity: Severity, message: String) {
        if self.echo_stderr {
            eprintln!("[log_relay] [{}] {}", severity, message);
        }

        let mut entries = self.entries.lock();
        if entries.len() == DIAGNOSTICS_CAPACITY {
            entries.pop_front();
        }
        entries.push_back(Diagnostic {
            at: Utc::now(),
            severity,
            message,
        });
    }

    /// Copy of the retained entries, oldest first
    pub fn snapshot(&self) -> Vec<Diagnostic> {
        self.entries.lock().iter().cloned().collect()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.entries
            .lock()
            .iter()
            .any(|entry| entry.message.contains(needle))
    }
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_and_snapshot() {
        let diagnostics = Diagnostics::silent();
        diagnostics.warn("queue full");
        diagnostics.error("disk full");

        let entries = diagnostics.snapshot();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].severity, Severity::Warning);
        assert_eq!(entries[1].message, "disk full");
        assert!(diagnostics.contains("disk"));
    }

    #[test]
    fn test_ring_is_bounded() {
        let diagnostics = Diagnostics::silent();
        for i in 0..DIAGNOSTICS_CAPACITY + 10 {
            diagnostics.warn(format!("entry {}", i));
        }

        let entries = diagnostics.snapshot();
        assert_eq!(entries.len(), DIAGNOSTICS_CAPACITY);
        assert_eq!(entries[0].message, "entry 10");
    }
}
