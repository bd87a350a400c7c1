//! # Log Relay
//!
//! A logging relay that stays correct when many threads (and, through the
//! bridge, many processes) log at once: producers only enqueue records,
//! and a single consumer owns every sink.
//!
//! ## Features
//!
//! - **Non-blocking producers**: bounded channel with a drop-and-count
//!   overflow policy
//! - **Single writer**: console, plain file and size-rotated file sinks
//!   (`base.log`, `base.log.1` … `base.log.N`), plus custom sinks
//! - **Hierarchical levels**: per-logger overrides on dotted names
//! - **Cross-process**: worker processes forward records to the owning
//!   process over a loopback bridge
//!
//! ## Usage
//!
//! ```no_run
//! use log_relay::{info, LogLevel, RelayConfig};
//!
//! let _guard = log_relay::init(
//!     RelayConfig::new()
//!         .level(LogLevel::Info)
//!         .log_file("logs/service.log")
//!         .max_bytes(10 * 1024 * 1024)
//!         .backup_count(5),
//! );
//!
//! let log = log_relay::get_logger("service.http");
//! info!(log, "listening on {}", 8080);
//! // Dropping the guard drains the queue and closes the log file
//! ```
//!
//! The process-wide relay lives in a static. The first [`configure`]
//! registers an exit hook that drains it when `main` returns or
//! `std::process::exit` is called; a process killed by a signal or by
//! `std::process::abort` loses what is still queued.

pub mod bridge;
pub mod core;
pub mod macros;
pub mod sinks;

use once_cell::sync::Lazy;
use std::net::SocketAddr;
use std::sync::Once;

pub mod prelude {
    pub use crate::core::{
        ConfigReport, FileMode, LogLevel, LoggerHandle, OverflowPolicy, Relay, RelayConfig,
        RelayError, RelayGuard, RelayMetrics, Result, Sink,
    };
    pub use crate::sinks::{ConsoleSink, FileSink, RotatingFileSink, RotationPolicy};
}

pub use crate::bridge::RELAY_ADDR_ENV;
pub use crate::core::{
    ConfigReport, Diagnostic, Diagnostics, ErrorDetail, FileMode, LevelFilter, LogLevel,
    LogRecord, LoggerHandle, Origin, OverflowPolicy, RecordFormat, Relay, RelayConfig, RelayError,
    RelayGuard, RelayMetrics, Result, Severity, Sink,
};
pub use crate::sinks::{ConsoleSink, FileSink, ForwardSink, RotatingFileSink, RotationPolicy};

static RELAY: Lazy<Relay> = Lazy::new(Relay::new);
static EXIT_HOOK: Once = Once::new();

extern "C" fn shutdown_at_exit() {
    // Unwinding out of an exit handler aborts
    let _ = std::panic::catch_unwind(|| RELAY.shutdown());
}

fn register_exit_hook() {
    EXIT_HOOK.call_once(|| {
        // SAFETY: the handler is a plain `extern "C" fn` that never unwinds
        if unsafe { libc::atexit(shutdown_at_exit) } != 0 {
            RELAY
                .diagnostics()
                .warn("cannot register exit hook; call shutdown() before exiting");
        }
    });
}

/// The process-wide relay behind the free functions of this crate
pub fn global() -> &'static Relay {
    &RELAY
}

/// Configure the process-wide relay; see [`Relay::configure`]
pub fn configure(config: RelayConfig) -> ConfigReport {
    let report = RELAY.configure(config);
    register_exit_hook();
    report
}

/// Configure the process-wide relay and shut it down when the guard drops
pub fn init(config: RelayConfig) -> RelayGuard<'static> {
    let guard = RELAY.init(config);
    register_exit_hook();
    guard
}

pub fn get_logger<'a>(name: impl Into<Option<&'a str>>) -> LoggerHandle {
    RELAY.get_logger(name)
}

pub fn shutdown() -> bool {
    RELAY.shutdown()
}

pub fn is_configured() -> bool {
    RELAY.is_configured()
}

pub fn dropped_count() -> u64 {
    RELAY.dropped_count()
}

/// Snapshot of the process-wide relay's counters
pub fn metrics() -> RelayMetrics {
    RELAY.metrics().clone()
}

pub fn diagnostics() -> &'static Diagnostics {
    RELAY.diagnostics()
}

/// Configure this process as a worker forwarding to the relay at `addr`
pub fn connect(addr: SocketAddr) -> ConfigReport {
    configure(RelayConfig::new().forward_to(addr))
}

/// [`connect`] to the address found in [`RELAY_ADDR_ENV`]
///
/// # Errors
///
/// Returns error if the variable is unset or not a socket address; the
/// relay is left untouched in that case.
pub fn connect_from_env() -> Result<ConfigReport> {
    let value = std::env::var(RELAY_ADDR_ENV)
        .map_err(|e| RelayError::config(RELAY_ADDR_ENV, e.to_string()))?;
    let addr = value.trim().parse::<SocketAddr>().map_err(|e| {
        RelayError::config(RELAY_ADDR_ENV, format!("invalid address '{}': {}", value, e))
    })?;
    Ok(connect(addr))
}
