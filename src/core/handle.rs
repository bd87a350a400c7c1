//! Logger handles
//!
//! A [`LoggerHandle`] is a cheap, cloneable name plus a reference to its
//! relay. Every method returns immediately: records are filtered, built and
//! offered to the channel, and nothing a sink does can reach the caller.

use super::{
    log_level::LogLevel,
    log_record::ErrorDetail,
    relay::Shared,
};
use std::error::Error;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Name used for `get_logger(None)` and `get_logger("")`
pub const ROOT_LOGGER: &str = "root";

#[derive(Clone)]
pub struct LoggerHandle {
    name: Arc<str>,
    shared: Arc<Shared>,
}

impl LoggerHandle {
    pub(crate) fn new(name: Option<&str>, shared: Arc<Shared>) -> Self {
        let name = match name {
            Some(name) if !name.is_empty() => name,
            _ => ROOT_LOGGER,
        };
        Self {
            name: Arc::from(name),
            shared,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether a record at `level` would currently be accepted
    pub fn is_enabled(&self, level: LogLevel) -> bool {
        self.shared.is_enabled(&self.name, level)
    }

    pub fn log(&self, level: LogLevel, message: impl AsRef<str>) {
        self.shared.emit(level, &self.name, message.as_ref(), None);
    }

    pub fn trace(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Trace, message);
    }

    pub fn debug(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Debug, message);
    }

    pub fn info(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Info, message);
    }

    pub fn warning(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Warning, message);
    }

    pub fn error(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Error, message);
    }

    pub fn critical(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Critical, message);
    }

    /// Log with `error`, its cause chain and (when enabled) a backtrace
    /// rendered on the lines after the message
    pub fn log_error<E: Error + ?Sized>(&self, level: LogLevel, message: impl AsRef<str>, error: &E) {
        if !self.is_enabled(level) {
            return;
        }
        self.shared.emit(
            level,
            &self.name,
            message.as_ref(),
            Some(ErrorDetail::capture(error)),
        );
    }

    /// `log_error` at `Error` level
    ///
    /// ```
    /// use log_relay::Relay;
    ///
    /// let relay = Relay::quiet();
    /// let log = relay.get_logger("loader");
    /// if let Err(e) = std::fs::read("/definitely/missing") {
    ///     log.exception("could not load settings", &e);
    /// }
    /// ```
    pub fn exception<E: Error + ?Sized>(&self, message: impl AsRef<str>, error: &E) {
        self.log_error(LogLevel::Error, message, error);
    }

    /// Log from async code without blocking the executor thread
    ///
    /// When the channel is full the enqueue is retried with
    /// `tokio::time::sleep` until the overflow policy's wait has elapsed,
    /// after which the record is dropped and counted.
    #[cfg(feature = "async")]
    pub async fn log_async(&self, level: LogLevel, message: impl AsRef<str>) {
        use super::relay::Offer;
        use std::time::{Duration, Instant};

        const RETRY_INTERVAL: Duration = Duration::from_millis(1);

        if !self.is_enabled(level) {
            return;
        }
        let mut record = super::log_record::LogRecord::new(level, &*self.name, message.as_ref());
        let mut deadline = None;

        loop {
            match self.shared.try_offer(record) {
                Offer::Accepted | Offer::Filtered => return,
                Offer::Full {
                    record: returned,
                    max_wait,
                } => {
                    let deadline = *deadline.get_or_insert_with(|| {
                        self.shared.metrics.record_queue_full();
                        Instant::now() + max_wait
                    });
                    if Instant::now() >= deadline {
                        self.shared.record_drop();
                        return;
                    }
                    record = returned;
                    tokio::time::sleep(RETRY_INTERVAL).await;
                }
            }
        }
    }
}

impl fmt::Debug for LoggerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoggerHandle")
            .field("name", &&*self.name)
            .finish_non_exhaustive()
    }
}

impl PartialEq for LoggerHandle {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && Arc::ptr_eq(&self.shared, &other.shared)
    }
}

impl Eq for LoggerHandle {}

impl Hash for LoggerHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use crate::core::{LogLevel, RelayConfig};
    use crate::Relay;
    use std::collections::HashSet;

    #[test]
    fn test_root_name() {
        let relay = Relay::quiet();
        assert_eq!(relay.get_logger(None).name(), "root");
        assert_eq!(relay.get_logger("").name(), "root");
        assert_eq!(relay.get_logger("svc.db").name(), "svc.db");
    }

    #[test]
    fn test_handles_compare_by_name_and_relay() {
        let relay = Relay::quiet();
        let other = Relay::quiet();

        let mut set = HashSet::new();
        set.insert(relay.get_logger("a"));
        set.insert(relay.get_logger("a"));
        set.insert(relay.get_logger("b"));
        assert_eq!(set.len(), 2);

        assert_ne!(relay.get_logger("a"), other.get_logger("a"));
    }

    #[test]
    fn test_is_enabled_follows_configuration() {
        let relay = Relay::quiet();
        let log = relay.get_logger("svc.db");
        // Unconfigured: everything is buffered
        assert!(log.is_enabled(LogLevel::Trace));

        relay.configure(
            RelayConfig::new()
                .log_to_stderr(false)
                .level(LogLevel::Warning)
                .logger_level("svc", LogLevel::Debug),
        );
        assert!(log.is_enabled(LogLevel::Debug));
        assert!(!log.is_enabled(LogLevel::Trace));
        assert!(!relay.get_logger("other").is_enabled(LogLevel::Info));
        relay.shutdown();
    }
}
