//! Logging macros for ergonomic log message formatting.
//!
//! These macros interpolate their arguments with `format!` at the call
//! site, but only after checking that the handle would accept the level,
//! so filtered records cost no formatting.
//!
//! # Examples
//!
//! ```
//! use log_relay::{info, Relay};
//!
//! let relay = Relay::quiet();
//! let log = relay.get_logger("server");
//!
//! // Basic logging
//! info!(log, "Server started");
//!
//! // With format arguments
//! let port = 8080;
//! info!(log, "Server listening on port {}", port);
//! ```

/// Log a message with automatic formatting.
///
/// # Examples
///
/// ```
/// # let relay = log_relay::Relay::quiet();
/// # let log = relay.get_logger("app");
/// use log_relay::{log, LogLevel};
/// log!(log, LogLevel::Info, "Simple message");
/// log!(log, LogLevel::Error, "Error code: {}", 500);
/// ```
#[macro_export]
macro_rules! log {
    ($logger:expr, $level:expr, $($arg:tt)+) => {{
        let level = $level;
        let logger = &$logger;
        if logger.is_enabled(level) {
            logger.log(level, format!($($arg)+));
        }
    }};
}

/// Log a trace-level message.
#[macro_export]
macro_rules! trace {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Trace, $($arg)+)
    };
}

/// Log a debug-level message.
#[macro_export]
macro_rules! debug {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Debug, $($arg)+)
    };
}

/// Log an info-level message.
///
/// # Examples
///
/// ```
/// # let relay = log_relay::Relay::quiet();
/// # let log = relay.get_logger("app");
/// use log_relay::info;
/// info!(log, "Application started");
/// info!(log, "Processing {} items", 100);
/// ```
#[macro_export]
macro_rules! info {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Info, $($arg)+)
    };
}

/// Log a warning-level message.
#[macro_export]
macro_rules! warning {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Warning, $($arg)+)
    };
}

/// Log an error-level message.
#[macro_export]
macro_rules! error {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Error, $($arg)+)
    };
}

/// Log a critical-level message.
#[macro_export]
macro_rules! critical {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Critical, $($arg)+)
    };
}

/// Log an error-level message with an attached error.
///
/// # Examples
///
/// ```
/// # let relay = log_relay::Relay::quiet();
/// # let log = relay.get_logger("app");
/// use log_relay::exception;
/// let err = std::io::Error::new(std::io::ErrorKind::NotFound, "config.toml");
/// exception!(log, err, "Failed to load {}", "settings");
/// ```
#[macro_export]
macro_rules! exception {
    ($logger:expr, $err:expr, $($arg:tt)+) => {{
        let logger = &$logger;
        if logger.is_enabled($crate::LogLevel::Error) {
            logger.exception(format!($($arg)+), &$err);
        }
    }};
}

#[cfg(test)]
mod tests {
    use crate::core::{LogLevel, LogRecord, RelayConfig, Result, Sink};
    use crate::Relay;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[derive(Clone, Default)]
    struct Lines(Arc<Mutex<Vec<String>>>);

    impl Sink for Lines {
        fn write(&mut self, line: &str, _record: &LogRecord) -> Result<()> {
            self.0.lock().push(line.to_string());
            Ok(())
        }

        fn flush(&mut self) -> Result<()> {
            Ok(())
        }

        fn name(&self) -> &str {
            "lines"
        }
    }

    fn relay_with(lines: &Lines, level: LogLevel) -> Relay {
        let relay = Relay::quiet();
        relay.configure(
            RelayConfig::new()
                .log_to_stderr(false)
                .level(level)
                .format("{level}:{message}")
                .poll_interval(Duration::from_millis(10))
                .sink(lines.clone()),
        );
        relay
    }

    #[test]
    fn test_level_macros() {
        let lines = Lines::default();
        let relay = relay_with(&lines, LogLevel::Trace);
        let log = relay.get_logger("macros");

        trace!(log, "t {}", 1);
        debug!(log, "d {}", 2);
        info!(log, "i {}", 3);
        warning!(log, "w {}", 4);
        error!(log, "e {}", 5);
        critical!(log, "c {}", 6);
        log!(log, LogLevel::Info, "plain");
        relay.shutdown();

        assert_eq!(
            *lines.0.lock(),
            vec![
                "TRACE:t 1",
                "DEBUG:d 2",
                "INFO:i 3",
                "WARNING:w 4",
                "ERROR:e 5",
                "CRITICAL:c 6",
                "INFO:plain",
            ]
        );
    }

    #[test]
    fn test_filtered_arguments_are_not_formatted() {
        struct Counted<'a>(&'a AtomicUsize);

        impl std::fmt::Display for Counted<'_> {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                self.0.fetch_add(1, Ordering::SeqCst);
                write!(f, "counted")
            }
        }

        let lines = Lines::default();
        let relay = relay_with(&lines, LogLevel::Warning);
        let log = relay.get_logger("lazy");
        let formatted = AtomicUsize::new(0);

        debug!(log, "{}", Counted(&formatted));
        warning!(log, "{}", Counted(&formatted));
        relay.shutdown();

        assert_eq!(formatted.load(Ordering::SeqCst), 1);
        assert_eq!(*lines.0.lock(), vec!["WARNING:counted"]);
    }

    #[test]
    fn test_exception_macro() {
        let lines = Lines::default();
        let relay = relay_with(&lines, LogLevel::Info);
        let log = relay.get_logger("exc");

        let err = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        exception!(log, err, "step {} failed", 3);
        relay.shutdown();

        let lines = lines.0.lock();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("ERROR:step 3 failed\n"));
        assert!(lines[0].contains("boom"));
    }
}
