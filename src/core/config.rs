//! Relay configuration
//!
//! [`RelayConfig`] carries everything `configure` needs. It is built with
//! consuming builder methods or deserialized (every field has a default):
//!
//! ```
//! use log_relay::{LogLevel, RelayConfig};
//!
//! let config = RelayConfig::new()
//!     .level(LogLevel::Debug)
//!     .log_file("logs/app.log")
//!     .max_bytes(1024 * 1024)
//!     .backup_count(3);
//! assert_eq!(config.backup_count, 3);
//!
//! let config: RelayConfig =
//!     serde_json::from_str(r#"{"level": "WARNING", "log_to_stderr": false}"#).unwrap();
//! assert_eq!(config.level, LogLevel::Warning);
//! ```

use super::error::RelayError;
use super::filter::LevelFilter;
use super::log_level::LogLevel;
use super::overflow_policy::OverflowPolicy;
use super::sink::Sink;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_MAX_BYTES: u64 = 10 * 1024 * 1024;
pub const DEFAULT_BACKUP_COUNT: usize = 5;
pub const DEFAULT_QUEUE_CAPACITY: usize = 8192;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);
/// Default time `shutdown` waits for the consumer to drain
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// How an existing log file is treated when opened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FileMode {
    #[default]
    #[serde(rename = "a", alias = "append")]
    Append,
    #[serde(rename = "w", alias = "truncate")]
    Truncate,
}

impl std::str::FromStr for FileMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "a" | "append" => Ok(FileMode::Append),
            "w" | "truncate" => Ok(FileMode::Truncate),
            _ => Err(format!("Invalid file mode: '{}' (expected 'a' or 'w')", s)),
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Minimum severity passed to the channel
    pub level: LogLevel,
    /// Per-logger minimum severity, applied to the name and its descendants
    pub logger_levels: BTreeMap<String, LogLevel>,
    pub log_file: Option<PathBuf>,
    pub log_to_stderr: bool,
    /// Line template, see [`RecordFormat`](crate::core::format::RecordFormat)
    pub format: Option<String>,
    /// strftime pattern for `{timestamp}`
    pub date_format: Option<String>,
    /// Ignored (always append) while rotation is enabled
    pub file_mode: FileMode,
    pub file_encoding: String,
    /// Rotation threshold in bytes; 0 disables rotation
    pub max_bytes: u64,
    pub backup_count: usize,
    pub compress_backups: bool,
    pub stderr_level: Option<LogLevel>,
    pub file_level: Option<LogLevel>,
    pub colors: bool,
    pub queue_capacity: usize,
    pub overflow_policy: OverflowPolicy,
    #[serde(with = "duration_ms")]
    pub poll_interval: Duration,
    #[serde(with = "duration_ms")]
    pub drain_timeout: Duration,
    /// Accept records from worker processes on this address
    pub listen: Option<SocketAddr>,
    /// Worker-process mode: ship every record to the relay at this address
    pub forward_to: Option<SocketAddr>,
    #[serde(skip)]
    pub(crate) sinks: Vec<Box<dyn Sink>>,
    #[serde(skip)]
    pub(crate) errors: Vec<RelayError>,
}

impl RelayConfig {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use = "builder methods return a new value"]
    pub fn level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    /// Set the level from text such as `"info"` or `"WARNING"`
    ///
    /// An unknown name is reported at configure time and `Info` is used.
    #[must_use = "builder methods return a new value"]
    pub fn level_name(mut self, name: &str) -> Self {
        match name.parse() {
            Ok(level) => self.level = level,
            Err(message) => {
                self.level = LogLevel::Info;
                self.errors.push(RelayError::config("level", message));
            }
        }
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn logger_level(mut self, name: impl Into<String>, level: LogLevel) -> Self {
        self.logger_levels.insert(name.into(), level);
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn log_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_file = Some(path.into());
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn log_to_stderr(mut self, enabled: bool) -> Self {
        self.log_to_stderr = enabled;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn format(mut self, template: impl Into<String>) -> Self {
        self.format = Some(template.into());
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn date_format(mut self, pattern: impl Into<String>) -> Self {
        self.date_format = Some(pattern.into());
        self
    }

    /// `Truncate` only takes effect with `max_bytes(0)`; a rotating file is
    /// always appended to
    #[must_use = "builder methods return a new value"]
    pub fn file_mode(mut self, mode: FileMode) -> Self {
        self.file_mode = mode;
        self
    }

    /// Set the file mode from `"a"` (append) or `"w"` (truncate)
    #[must_use = "builder methods return a new value"]
    pub fn file_mode_str(mut self, mode: &str) -> Self {
        match mode.parse() {
            Ok(mode) => self.file_mode = mode,
            Err(message) => self.errors.push(RelayError::config("file_mode", message)),
        }
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn file_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.file_encoding = encoding.into();
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn backup_count(mut self, count: usize) -> Self {
        self.backup_count = count;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn compress_backups(mut self, enabled: bool) -> Self {
        self.compress_backups = enabled;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn stderr_level(mut self, level: LogLevel) -> Self {
        self.stderr_level = Some(level);
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn file_level(mut self, level: LogLevel) -> Self {
        self.file_level = Some(level);
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn colors(mut self, enabled: bool) -> Self {
        self.colors = enabled;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn overflow_policy(mut self, policy: OverflowPolicy) -> Self {
        self.overflow_policy = policy;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn listen(mut self, addr: SocketAddr) -> Self {
        self.listen = Some(addr);
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn forward_to(mut self, addr: SocketAddr) -> Self {
        self.forward_to = Some(addr);
        self
    }

    /// Add a custom sink owned by the consumer
    #[must_use = "builder methods return a new value"]
    pub fn sink<S: Sink + 'static>(mut self, sink: S) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn boxed_sink(mut self, sink: Box<dyn Sink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn level_filter(&self) -> LevelFilter {
        self.logger_levels
            .iter()
            .fold(LevelFilter::new(self.level), |filter, (name, level)| {
                filter.with_override(name.clone(), *level)
            })
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            logger_levels: BTreeMap::new(),
            log_file: None,
            log_to_stderr: true,
            format: None,
            date_format: None,
            file_mode: FileMode::Append,
            file_encoding: "utf-8".to_string(),
            max_bytes: DEFAULT_MAX_BYTES,
            backup_count: DEFAULT_BACKUP_COUNT,
            compress_backups: false,
            stderr_level: None,
            file_level: None,
            colors: false,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            overflow_policy: OverflowPolicy::default(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
            listen: None,
            forward_to: None,
            sinks: Vec::new(),
            errors: Vec::new(),
        }
    }
}

impl fmt::Debug for RelayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sink_names: Vec<&str> = self.sinks.iter().map(|sink| sink.name()).collect();
        f.debug_struct("RelayConfig")
            .field("level", &self.level)
            .field("logger_levels", &self.logger_levels)
            .field("log_file", &self.log_file)
            .field("log_to_stderr", &self.log_to_stderr)
            .field("format", &self.format)
            .field("date_format", &self.date_format)
            .field("file_mode", &self.file_mode)
            .field("file_encoding", &self.file_encoding)
            .field("max_bytes", &self.max_bytes)
            .field("backup_count", &self.backup_count)
            .field("compress_backups", &self.compress_backups)
            .field("queue_capacity", &self.queue_capacity)
            .field("overflow_policy", &self.overflow_policy)
            .field("listen", &self.listen)
            .field("forward_to", &self.forward_to)
            .field("sinks", &sink_names)
            .finish_non_exhaustive()
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
