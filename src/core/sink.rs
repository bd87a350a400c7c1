//! Sink trait for log output destinations

use super::{error::Result, log_level::LogLevel, log_record::LogRecord};

/// A destination for formatted log lines
///
/// Sinks are owned by the relay's consumer thread; producers never call
/// them. `line` is the record already rendered by the relay's format,
/// without a trailing newline.
pub trait Sink: Send {
    fn write(&mut self, line: &str, record: &LogRecord) -> Result<()>;
    fn flush(&mut self) -> Result<()>;
    fn name(&self) -> &str;

    /// Minimum level for this sink; `None` accepts whatever the relay accepts
    fn level(&self) -> Option<LogLevel> {
        None
    }

    /// Problems the sink recovered from since the last call
    ///
    /// A write that falls back (for example a failed rotation that keeps
    /// writing to the current file) still returns `Ok`; the relay collects
    /// these after each call and reports them as sink errors.
    fn take_warnings(&mut self) -> Vec<String> {
        Vec::new()
    }
}
