//! Core relay types and traits

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod filter;
pub mod format;
pub mod handle;
pub mod log_level;
pub mod log_record;
pub mod metrics;
pub mod overflow_policy;
pub mod relay;
pub mod sink;

pub use config::{
    FileMode, RelayConfig, DEFAULT_BACKUP_COUNT, DEFAULT_DRAIN_TIMEOUT, DEFAULT_MAX_BYTES,
    DEFAULT_POLL_INTERVAL, DEFAULT_QUEUE_CAPACITY,
};
pub use diagnostics::{Diagnostic, Diagnostics, Severity, DIAGNOSTICS_CAPACITY};
pub use error::{RelayError, Result};
pub use filter::LevelFilter;
pub use format::{DateFormat, RecordFormat, DEFAULT_DATE_FORMAT, DEFAULT_FORMAT};
pub use handle::{LoggerHandle, ROOT_LOGGER};
pub use log_level::LogLevel;
pub use log_record::{ErrorDetail, LogRecord, Origin};
pub use metrics::RelayMetrics;
pub use overflow_policy::OverflowPolicy;
pub use relay::{ConfigReport, Relay, RelayGuard, ABANDON_GRACE, PENDING_CAPACITY};
pub use sink::Sink;
