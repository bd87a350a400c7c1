//! Log record structure

use super::log_level::LogLevel;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::backtrace::{Backtrace, BacktraceStatus};
use std::borrow::Cow;
use std::cell::RefCell;
use std::error::Error;
use std::fmt::Write as _;

// Thread-local caches for thread information to avoid repeated allocations
thread_local! {
    static THREAD_ID_CACHE: RefCell<Option<String>> = const { RefCell::new(None) };
    static THREAD_NAME_CACHE: RefCell<Option<Option<String>>> = const { RefCell::new(None) };
}

/// Get cached thread ID, computing and caching it on first access
fn get_thread_id() -> String {
    THREAD_ID_CACHE.with(|cache| {
        cache
            .borrow_mut()
            .get_or_insert_with(|| format!("{:?}", std::thread::current().id()))
            .clone()
    })
}

/// Get cached thread name, computing and caching it on first access
fn get_thread_name() -> Option<String> {
    THREAD_NAME_CACHE.with(|cache| {
        cache
            .borrow_mut()
            .get_or_insert_with(|| std::thread::current().name().map(String::from))
            .clone()
    })
}

/// Escape newlines, carriage returns and tabs so text stays on one line
///
/// Idempotent: escaped text contains none of the escaped characters.
pub(crate) fn escape_line(text: &str) -> Cow<'_, str> {
    if !text.contains(|c| matches!(c, '\n' | '\r' | '\t')) {
        return Cow::Borrowed(text);
    }
    Cow::Owned(
        text.replace('\n', "\\n")
            .replace('\r', "\\r")
            .replace('\t', "\\t"),
    )
}

/// Where a record was produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Origin {
    pub process_id: u32,
    pub thread_id: String,
    pub thread_name: Option<String>,
}

impl Origin {
    pub fn current() -> Self {
        Self {
            process_id: std::process::id(),
            thread_id: get_thread_id(),
            thread_name: get_thread_name(),
        }
    }

    /// Thread name if the thread has one, otherwise its id
    pub fn thread_label(&self) -> &str {
        self.thread_name.as_deref().unwrap_or(&self.thread_id)
    }
}

/// Failure captured by an `exception` call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub kind: String,
    pub message: String,
    pub trace: String,
}

impl ErrorDetail {
    /// Capture an error, its `source()` chain and (if `RUST_BACKTRACE`
    /// enables it) a backtrace of the calling thread.
    ///
    /// `kind` is the static type of `E`. A trait object has no concrete
    /// type to report, so `&dyn Error` (and `&*boxed_error`) is labelled
    /// `Error`; pass the concrete error where the kind matters.
    pub fn capture<E: Error + ?Sized>(error: &E) -> Self {
        let mut trace = String::new();
        let mut source = error.source();
        while let Some(cause) = source {
            let _ = writeln!(trace, "Caused by: {}", escape_line(&cause.to_string()));
            source = cause.source();
        }

        let backtrace = Backtrace::capture();
        if backtrace.status() == BacktraceStatus::Captured {
            let _ = write!(trace, "{}", backtrace);
        }

        Self {
            kind: kind_label(std::any::type_name::<E>()),
            message: escape_line(&error.to_string()).into_owned(),
            trace: trace.trim_end().to_string(),
        }
    }
}

fn kind_label(type_name: &str) -> String {
    if type_name.starts_with("dyn ") {
        "Error".to_string()
    } else {
        type_name.to_string()
    }
}

/// One log event, immutable once built
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub logger_name: String,
    pub message: String,
    pub origin: Origin,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attached_error: Option<ErrorDetail>,
}

impl LogRecord {
    pub fn new(level: LogLevel, logger_name: impl Into<String>, message: &str) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            logger_name: logger_name.into(),
            // Prevent log injection: a record always renders as one line
            message: escape_line(message).into_owned(),
            origin: Origin::current(),
            attached_error: None,
        }
    }

    pub fn with_error(mut self, detail: ErrorDetail) -> Self {
        self.attached_error = Some(detail);
        self
    }
}
