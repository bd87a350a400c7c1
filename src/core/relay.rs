//! The relay: one channel, many producers, one consumer
//!
//! Producers never touch a sink. Each [`LoggerHandle`] filters by level,
//! builds a [`LogRecord`] and hands it to a bounded crossbeam channel; a
//! single consumer thread drains the channel in batches and writes every
//! record to every sink. Before [`Relay::configure`] (and after
//! [`Relay::shutdown`]) records wait in a bounded pending buffer.
//!
//! # Example
//!
//! ```no_run
//! use log_relay::{LogLevel, Relay, RelayConfig};
//!
//! let relay = Relay::new();
//! let report = relay.configure(
//!     RelayConfig::new()
//!         .level(LogLevel::Info)
//!         .log_file("logs/app.log")
//!         .max_bytes(1024 * 1024)
//!         .backup_count(3),
//! );
//! assert!(report.is_clean());
//!
//! let log = relay.get_logger("app.startup");
//! log.info("listening");
//!
//! relay.shutdown();
//! ```

use super::{
    config::RelayConfig,
    diagnostics::Diagnostics,
    error::RelayError,
    filter::LevelFilter,
    format::{DateFormat, RecordFormat, DEFAULT_FORMAT},
    handle::LoggerHandle,
    log_level::LogLevel,
    log_record::{ErrorDetail, LogRecord},
    metrics::RelayMetrics,
    overflow_policy::OverflowPolicy,
    sink::Sink,
};
use crate::bridge::{Hello, RecordIntake, RelayServer};
use crate::sinks::{
    ConsoleSink, FileSink, ForwardSink, RotatingFileSink, RotationPolicy, DEFAULT_CONNECT_TIMEOUT,
};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, SendTimeoutError, Sender, TrySendError};
use parking_lot::{Mutex, RwLock};
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Records held while the relay is not configured
pub const PENDING_CAPACITY: usize = 1024;

/// Extra time given to an abandoned consumer before it is detached
pub const ABANDON_GRACE: Duration = Duration::from_millis(500);

const BATCH_SIZE: usize = 64;
const DROP_REPORT_INTERVAL: u64 = 1000;

/// Outcome of a `configure` call
///
/// `configure` never fails; everything that went wrong is listed here (and
/// on the diagnostic channel) while the relay runs in a degraded setup.
#[derive(Debug, Default)]
pub struct ConfigReport {
    pub errors: Vec<RelayError>,
    /// Address the bridge server is bound to, when `listen` was set
    pub listen_addr: Option<SocketAddr>,
}

impl ConfigReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

struct Active {
    sender: Sender<LogRecord>,
    filter: LevelFilter,
    overflow: OverflowPolicy,
    capacity: usize,
}

/// Result of a non-waiting enqueue attempt
#[cfg_attr(not(feature = "async"), allow(dead_code))]
pub(crate) enum Offer {
    Accepted,
    Filtered,
    Full {
        record: LogRecord,
        max_wait: Duration,
    },
}

/// State reachable from every handle
///
/// Lock order is always `active` then `pending`.
pub(crate) struct Shared {
    active: RwLock<Option<Active>>,
    pending: Mutex<VecDeque<LogRecord>>,
    pending_overflow_reported: AtomicBool,
    pub(crate) metrics: RelayMetrics,
    pub(crate) diagnostics: Diagnostics,
}

impl Shared {
    fn new(diagnostics: Diagnostics) -> Self {
        Self {
            active: RwLock::new(None),
            pending: Mutex::new(VecDeque::new()),
            pending_overflow_reported: AtomicBool::new(false),
            metrics: RelayMetrics::new(),
            diagnostics,
        }
    }

    /// Unconfigured relays accept everything; the filter applies on flush
    pub(crate) fn is_enabled(&self, name: &str, level: LogLevel) -> bool {
        match self.active.read().as_ref() {
            Some(active) => active.filter.enabled(name, level),
            None => true,
        }
    }

    pub(crate) fn emit(
        &self,
        level: LogLevel,
        name: &str,
        message: &str,
        error: Option<ErrorDetail>,
    ) {
        let active = self.active.read();
        if let Some(ref active) = *active {
            if !active.filter.enabled(name, level) {
                return;
            }
        }

        let mut record = LogRecord::new(level, name, message);
        if let Some(detail) = error {
            record = record.with_error(detail);
        }

        match *active {
            Some(ref active) => self.send(active, record),
            None => self.buffer(record),
        }
    }

    /// Enqueue a record built elsewhere (bridge connections)
    pub(crate) fn enqueue(&self, record: LogRecord) {
        let active = self.active.read();
        match *active {
            Some(ref active) if active.filter.enabled(&record.logger_name, record.level) => {
                self.send(active, record)
            }
            Some(_) => {}
            None => self.buffer(record),
        }
    }

    /// Enqueue without waiting on a full channel
    #[cfg_attr(not(feature = "async"), allow(dead_code))]
    pub(crate) fn try_offer(&self, record: LogRecord) -> Offer {
        let active = self.active.read();
        let Some(ref active) = *active else {
            self.buffer(record);
            return Offer::Accepted;
        };
        if !active.filter.enabled(&record.logger_name, record.level) {
            return Offer::Filtered;
        }

        match active.sender.try_send(record) {
            Ok(()) => {
                self.metrics.record_enqueued();
                Offer::Accepted
            }
            Err(TrySendError::Full(record)) => Offer::Full {
                record,
                max_wait: active.overflow.max_wait(),
            },
            Err(TrySendError::Disconnected(_)) => {
                self.record_drop();
                Offer::Accepted
            }
        }
    }

    fn send(&self, active: &Active, record: LogRecord) {
        let record = match active.sender.try_send(record) {
            Ok(()) => {
                self.metrics.record_enqueued();
                return;
            }
            Err(TrySendError::Full(record)) => record,
            Err(TrySendError::Disconnected(_)) => {
                self.record_drop();
                return;
            }
        };

        self.metrics.record_queue_full();
        let wait = active.overflow.max_wait();
        if !wait.is_zero() {
            match active.sender.send_timeout(record, wait) {
                Ok(()) => {
                    self.metrics.record_enqueued();
                    return;
                }
                Err(SendTimeoutError::Timeout(_)) | Err(SendTimeoutError::Disconnected(_)) => {}
            }
        }

        let previous = self.metrics.record_dropped();
        if previous % DROP_REPORT_INTERVAL == 0 {
            self.diagnostics.warn(format!(
                "{}; dropped {} record(s) so far",
                RelayError::QueueFull {
                    capacity: active.capacity
                },
                previous + 1
            ));
        }
    }

    pub(crate) fn record_drop(&self) {
        let previous = self.metrics.record_dropped();
        if previous % DROP_REPORT_INTERVAL == 0 {
            self.diagnostics
                .warn(format!("log record dropped; {} so far", previous + 1));
        }
    }

    fn buffer(&self, record: LogRecord) {
        let mut pending = self.pending.lock();
        if pending.len() < PENDING_CAPACITY {
            pending.push_back(record);
            return;
        }
        drop(pending);

        self.metrics.record_dropped();
        if !self.pending_overflow_reported.swap(true, Ordering::AcqRel) {
            self.diagnostics.warn(format!(
                "relay not configured and {} records already buffered; dropping new records",
                PENDING_CAPACITY
            ));
        }
    }

    fn pending_len(&self) -> usize {
        self.pending.lock().len()
    }
}

impl RecordIntake for Shared {
    fn deliver(&self, record: LogRecord) {
        self.enqueue(record);
    }

    fn report(&self, message: String) {
        self.diagnostics.warn(message);
    }
}

struct Running {
    consumer: thread::JoinHandle<()>,
    abandon: Arc<AtomicBool>,
    server: Option<RelayServer>,
    drain_timeout: Duration,
}

pub struct Relay {
    shared: Arc<Shared>,
    /// Configuration lock: serializes configure and shutdown
    control: Mutex<Option<Running>>,
}

impl Relay {
    pub fn new() -> Self {
        Self::with_diagnostics(Diagnostics::new())
    }

    /// A relay whose diagnostics are kept in memory only
    pub fn quiet() -> Self {
        Self::with_diagnostics(Diagnostics::silent())
    }

    fn with_diagnostics(diagnostics: Diagnostics) -> Self {
        Self {
            shared: Arc::new(Shared::new(diagnostics)),
            control: Mutex::new(None),
        }
    }

    /// Install sinks and start the consumer
    ///
    /// Calling this on a configured relay replaces the previous setup: the
    /// old consumer drains and its sinks close before the new ones open.
    /// Problems are reported in the returned [`ConfigReport`] and the relay
    /// falls back to a working setup; this never panics.
    pub fn configure(&self, mut config: RelayConfig) -> ConfigReport {
        let mut control = self.control.lock();
        if let Some(running) = control.take() {
            self.stop(running);
        }

        let mut report = ConfigReport {
            errors: std::mem::take(&mut config.errors),
            listen_addr: None,
        };

        let format = build_format(&config, &mut report.errors);
        if !is_utf8(&config.file_encoding) {
            report.errors.push(RelayError::config(
                "file_encoding",
                format!("unsupported encoding '{}', using utf-8", config.file_encoding),
            ));
        }

        let (sinks, remote_level) = self.build_sinks(&mut config, &format, &mut report.errors);
        // Nothing below the owner's floor may cross the socket
        if let Some(remote) = remote_level {
            config.level = config.level.max(remote);
            for level in config.logger_levels.values_mut() {
                *level = (*level).max(remote);
            }
        }
        let filter = config.level_filter();

        let capacity = config.queue_capacity.max(1);
        let (sender, receiver) = bounded(capacity);
        let abandon = Arc::new(AtomicBool::new(false));
        let consumer = Consumer {
            receiver,
            sinks,
            format,
            shared: Arc::clone(&self.shared),
            abandon: Arc::clone(&abandon),
            poll_interval: config.poll_interval,
        };
        let consumer = match thread::Builder::new()
            .name("log-relay-consumer".into())
            .spawn(move || consumer.run())
        {
            Ok(handle) => handle,
            Err(e) => {
                report.errors.push(RelayError::io_operation(
                    "start consumer",
                    "cannot spawn consumer thread",
                    e,
                ));
                self.report_errors(&report);
                return report;
            }
        };

        let server = config.listen.and_then(|addr| {
            let hello = Hello {
                min_level: filter.floor(),
            };
            let intake: Arc<dyn RecordIntake> = self.shared.clone();
            match RelayServer::bind(addr, hello, intake, config.poll_interval) {
                Ok(server) => Some(server),
                Err(e) => {
                    report.errors.push(e);
                    None
                }
            }
        });
        report.listen_addr = server.as_ref().map(RelayServer::local_addr);

        self.activate(Active {
            sender,
            filter,
            overflow: config.overflow_policy,
            capacity,
        });

        *control = Some(Running {
            consumer,
            abandon,
            server,
            drain_timeout: config.drain_timeout,
        });

        self.report_errors(&report);
        report
    }

    /// Publish the new channel, flushing buffered records into it first
    fn activate(&self, next: Active) {
        let mut active = self.shared.active.write();
        let buffered: Vec<LogRecord> = self.shared.pending.lock().drain(..).collect();
        for record in buffered {
            if next.filter.enabled(&record.logger_name, record.level) {
                self.shared.send(&next, record);
            }
        }
        self.shared
            .pending_overflow_reported
            .store(false, Ordering::Release);
        *active = Some(next);
    }

    fn build_sinks(
        &self,
        config: &mut RelayConfig,
        format: &RecordFormat,
        errors: &mut Vec<RelayError>,
    ) -> (Vec<Box<dyn Sink>>, Option<LogLevel>) {
        let mut sinks: Vec<Box<dyn Sink>> = Vec::new();
        let mut requested_failed = false;
        let mut remote_level = None;

        if let Some(addr) = config.forward_to {
            match ForwardSink::connect(addr, DEFAULT_CONNECT_TIMEOUT) {
                Ok(sink) => {
                    remote_level = Some(sink.remote_level());
                    sinks.push(Box::new(sink));
                }
                Err(e) => {
                    errors.push(e);
                    requested_failed = true;
                }
            }
        }

        // A connected worker writes nothing locally
        if remote_level.is_none() {
            if config.log_to_stderr {
                let console = ConsoleSink::stderr().with_level(config.stderr_level);
                let console = if config.colors {
                    console.with_colors(format.clone())
                } else {
                    console
                };
                sinks.push(Box::new(console));
            }

            if let Some(ref path) = config.log_file {
                match open_file_sink(config, path) {
                    Ok(sink) => sinks.push(sink),
                    Err(e) => {
                        errors.push(e);
                        requested_failed = true;
                    }
                }
            }
        }

        sinks.append(&mut config.sinks);

        if sinks.is_empty() && requested_failed {
            self.shared
                .diagnostics
                .warn("no usable sink remains, falling back to stderr");
            sinks.push(Box::new(ConsoleSink::stderr()));
        }

        (sinks, remote_level)
    }

    fn report_errors(&self, report: &ConfigReport) {
        for error in &report.errors {
            self.shared.diagnostics.warn(error.to_string());
        }
    }

    /// Handle for `name`; `None` or `""` is the root logger
    pub fn get_logger<'a>(&self, name: impl Into<Option<&'a str>>) -> LoggerHandle {
        LoggerHandle::new(name.into(), Arc::clone(&self.shared))
    }

    /// Drain and stop the consumer, closing every sink
    ///
    /// Returns `false` when the drain did not finish within the configured
    /// timeout. Calling it again, or on a relay never configured, is a no-op
    /// returning `true`.
    pub fn shutdown(&self) -> bool {
        let mut control = self.control.lock();
        let Some(running) = control.take() else {
            return true;
        };
        let drained = self.stop(running);

        let metrics = &self.shared.metrics;
        if metrics.dropped_count() > 0 {
            self.shared.diagnostics.warn(format!(
                "relay shut down with {} dropped record(s) (drop rate: {:.2}%)",
                metrics.dropped_count(),
                metrics.drop_rate()
            ));
        }
        drained
    }

    fn stop(&self, mut running: Running) -> bool {
        if let Some(mut server) = running.server.take() {
            server.stop();
        }

        // Dropping the only sender lets the consumer drain and exit
        drop(self.shared.active.write().take());

        let mut drained = wait_finished(&running.consumer, running.drain_timeout);
        if !drained {
            running.abandon.store(true, Ordering::Release);
            self.shared.diagnostics.warn(format!(
                "consumer did not drain within {:?}; remaining records are dropped",
                running.drain_timeout
            ));
            if !wait_finished(&running.consumer, ABANDON_GRACE) {
                self.shared
                    .diagnostics
                    .error("consumer thread is unresponsive; detaching it");
                return false;
            }
        }

        if let Err(panic) = running.consumer.join() {
            self.shared.diagnostics.error(format!(
                "consumer thread panicked: {}",
                panic_message(panic.as_ref())
            ));
            drained = false;
        }
        drained
    }

    pub fn is_configured(&self) -> bool {
        self.shared.active.read().is_some()
    }

    pub fn metrics(&self) -> &RelayMetrics {
        &self.shared.metrics
    }

    pub fn dropped_count(&self) -> u64 {
        self.shared.metrics.dropped_count()
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.shared.diagnostics
    }

    /// Records waiting for the next `configure`
    pub fn pending_len(&self) -> usize {
        self.shared.pending_len()
    }

    pub fn listen_addr(&self) -> Option<SocketAddr> {
        self.control
            .lock()
            .as_ref()
            .and_then(|running| running.server.as_ref())
            .map(RelayServer::local_addr)
    }

    /// Configure and return a guard that shuts the relay down when dropped
    pub fn init(&self, config: RelayConfig) -> RelayGuard<'_> {
        let report = self.configure(config);
        RelayGuard {
            relay: self,
            report,
        }
    }
}

impl Default for Relay {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Relay {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Shuts its relay down on drop
#[must_use = "the relay shuts down when the guard is dropped"]
pub struct RelayGuard<'a> {
    relay: &'a Relay,
    report: ConfigReport,
}

impl RelayGuard<'_> {
    pub fn report(&self) -> &ConfigReport {
        &self.report
    }
}

impl Drop for RelayGuard<'_> {
    fn drop(&mut self) {
        self.relay.shutdown();
    }
}

struct Consumer {
    receiver: Receiver<LogRecord>,
    sinks: Vec<Box<dyn Sink>>,
    format: RecordFormat,
    shared: Arc<Shared>,
    abandon: Arc<AtomicBool>,
    poll_interval: Duration,
}

impl Consumer {
    fn run(mut self) {
        let mut batch = Vec::with_capacity(BATCH_SIZE);

        while !self.abandon.load(Ordering::Acquire) {
            match self.receiver.recv_timeout(self.poll_interval) {
                Ok(record) => batch.push(record),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            }

            while batch.len() < BATCH_SIZE {
                match self.receiver.try_recv() {
                    Ok(record) => batch.push(record),
                    Err(_) => break,
                }
            }

            self.process_batch(&batch);
            batch.clear();
        }

        let abandoned = self.receiver.try_iter().count() as u64;
        if abandoned > 0 {
            self.shared.metrics.record_dropped_many(abandoned);
        }
        self.flush_all();
        // Sinks close (and release file locks) when `self` drops
    }

    /// Write a batch; each sink call is isolated so one broken sink cannot
    /// stop the others
    fn process_batch(&mut self, batch: &[LogRecord]) {
        for record in batch {
            let line = self.format.render(record);
            let mut attempted = 0;
            let mut failed = 0;

            for sink in self.sinks.iter_mut() {
                if sink.level().is_some_and(|min| record.level < min) {
                    continue;
                }
                attempted += 1;

                let result = catch_unwind(AssertUnwindSafe(|| sink.write(&line, record)));
                report_warnings(&self.shared, sink.as_mut());
                let failure = match result {
                    Ok(Ok(())) => continue,
                    Ok(Err(e)) => e.to_string(),
                    Err(panic) => format!("panicked: {}", panic_message(panic.as_ref())),
                };
                failed += 1;
                sink_failed(&self.shared, sink.name(), "write", &failure);
            }

            if attempted > 0 && failed == attempted {
                self.shared.metrics.record_dropped();
            } else {
                self.shared.metrics.record_written();
            }
        }

        self.flush_all();
    }

    fn flush_all(&mut self) {
        for sink in self.sinks.iter_mut() {
            let result = catch_unwind(AssertUnwindSafe(|| sink.flush()));
            report_warnings(&self.shared, sink.as_mut());
            let failure = match result {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => e.to_string(),
                Err(panic) => format!("panicked: {}", panic_message(panic.as_ref())),
            };
            sink_failed(&self.shared, sink.name(), "flush", &failure);
        }
    }
}

fn sink_failed(shared: &Shared, sink: &str, operation: &str, failure: &str) {
    let previous = shared.metrics.record_sink_error();
    if previous % DROP_REPORT_INTERVAL == 0 {
        shared.diagnostics.error(format!(
            "sink '{}' {} failed: {} ({} sink error(s) so far)",
            sink,
            operation,
            failure,
            previous + 1
        ));
    }
}

fn report_warnings(shared: &Shared, sink: &mut dyn Sink) {
    let warnings = match catch_unwind(AssertUnwindSafe(|| sink.take_warnings())) {
        Ok(warnings) => warnings,
        Err(_) => return,
    };
    for warning in warnings {
        shared.metrics.record_sink_error();
        shared
            .diagnostics
            .warn(format!("sink '{}': {}", sink.name(), warning));
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

fn wait_finished(handle: &thread::JoinHandle<()>, timeout: Duration) -> bool {
    let start = Instant::now();
    loop {
        if handle.is_finished() {
            return true;
        }
        if start.elapsed() >= timeout {
            return false;
        }
        thread::sleep(Duration::from_millis(10));
    }
}

fn build_format(config: &RelayConfig, errors: &mut Vec<RelayError>) -> RecordFormat {
    let date_format = match config.date_format.as_deref() {
        None => DateFormat::default(),
        Some(pattern) => DateFormat::parse(pattern).unwrap_or_else(|e| {
            errors.push(e);
            DateFormat::default()
        }),
    };

    let template = config.format.as_deref().unwrap_or(DEFAULT_FORMAT);
    match RecordFormat::parse(template, date_format.clone()) {
        Ok(format) => format,
        Err(e) => {
            errors.push(e);
            RecordFormat::parse(DEFAULT_FORMAT, date_format).unwrap_or_default()
        }
    }
}

fn is_utf8(encoding: &str) -> bool {
    matches!(
        encoding.to_ascii_lowercase().as_str(),
        "utf-8" | "utf8" | "utf_8"
    )
}

fn open_file_sink(config: &RelayConfig, path: &std::path::Path) -> super::Result<Box<dyn Sink>> {
    if config.max_bytes == 0 {
        let sink = FileSink::open(path, config.file_mode)?.with_level(config.file_level);
        return Ok(Box::new(sink));
    }

    let policy = RotationPolicy::new()
        .with_max_bytes(config.max_bytes)
        .with_backup_count(config.backup_count)
        .with_compression(config.compress_backups);
    let sink = RotatingFileSink::open(path, policy, config.file_mode)?.with_level(config.file_level);
    Ok(Box::new(sink))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Result;
    use std::sync::atomic::AtomicUsize;

    /// Collects rendered lines in memory
    #[derive(Clone, Default)]
    struct Memory {
        lines: Arc<Mutex<Vec<String>>>,
    }

    impl Sink for Memory {
        fn write(&mut self, line: &str, _record: &LogRecord) -> Result<()> {
            self.lines.lock().push(line.to_string());
            Ok(())
        }

        fn flush(&mut self) -> Result<()> {
            Ok(())
        }

        fn name(&self) -> &str {
            "memory"
        }
    }

    fn memory_config(memory: &Memory) -> RelayConfig {
        RelayConfig::new()
            .log_to_stderr(false)
            .format("{level} {name} {message}")
            .poll_interval(Duration::from_millis(10))
            .sink(memory.clone())
    }

    #[test]
    fn test_unconfigured_relay_buffers() {
        let relay = Relay::quiet();
        assert!(!relay.is_configured());

        relay.get_logger("early").info("before configure");
        assert_eq!(relay.pending_len(), 1);

        let memory = Memory::default();
        let report = relay.configure(memory_config(&memory));
        assert!(report.is_clean(), "{:?}", report.errors);
        assert!(relay.is_configured());
        assert_eq!(relay.pending_len(), 0);

        assert!(relay.shutdown());
        assert_eq!(*memory.lines.lock(), vec!["INFO early before configure"]);
    }

    #[test]
    fn test_pending_flush_applies_new_filter() {
        let relay = Relay::quiet();
        let log = relay.get_logger("early");
        log.debug("hidden");
        log.warning("kept");

        let memory = Memory::default();
        relay.configure(memory_config(&memory).level(LogLevel::Info));
        relay.shutdown();

        assert_eq!(*memory.lines.lock(), vec!["WARNING early kept"]);
    }

    #[test]
    fn test_pending_overflow_is_counted() {
        let relay = Relay::quiet();
        let log = relay.get_logger("flood");
        for i in 0..PENDING_CAPACITY + 10 {
            log.info(format!("{}", i));
        }

        assert_eq!(relay.pending_len(), PENDING_CAPACITY);
        assert_eq!(relay.dropped_count(), 10);
        assert!(relay.diagnostics().contains("dropping new records"));
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let relay = Relay::quiet();
        assert!(relay.shutdown());

        relay.configure(memory_config(&Memory::default()));
        assert!(relay.shutdown());
        assert!(relay.shutdown());
        assert!(!relay.is_configured());
    }

    #[test]
    fn test_invalid_format_falls_back() {
        let relay = Relay::quiet();
        let memory = Memory::default();
        let report = relay.configure(
            memory_config(&memory)
                .format("{level} {bogus}")
                .date_format("%Q"),
        );

        assert_eq!(report.errors.len(), 2);
        relay.get_logger("x").info("still logged");
        relay.shutdown();

        let lines = memory.lines.lock();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].ends_with(" - x - INFO - still logged"));
    }

    #[test]
    fn test_unsupported_encoding_reported() {
        let relay = Relay::quiet();
        let report = relay.configure(memory_config(&Memory::default()).file_encoding("latin-1"));
        assert_eq!(report.errors.len(), 1);
        assert!(relay.diagnostics().contains("latin-1"));
    }

    struct Panicking {
        calls: Arc<AtomicUsize>,
    }

    impl Sink for Panicking {
        fn write(&mut self, _line: &str, _record: &LogRecord) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            panic!("sink exploded");
        }

        fn flush(&mut self) -> Result<()> {
            Ok(())
        }

        fn name(&self) -> &str {
            "panicking"
        }
    }

    #[test]
    fn test_panicking_sink_is_isolated() {
        let relay = Relay::quiet();
        let memory = Memory::default();
        let calls = Arc::new(AtomicUsize::new(0));
        relay.configure(memory_config(&memory).sink(Panicking {
            calls: Arc::clone(&calls),
        }));

        let log = relay.get_logger("iso");
        log.info("one");
        log.info("two");
        assert!(relay.shutdown());

        assert_eq!(memory.lines.lock().len(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(relay.metrics().sink_errors(), 2);
        assert_eq!(relay.metrics().total_written(), 2);
        assert!(relay.diagnostics().contains("sink exploded"));
    }

    #[test]
    fn test_sink_level_threshold() {
        struct OnlyErrors(Memory);

        impl Sink for OnlyErrors {
            fn write(&mut self, line: &str, record: &LogRecord) -> Result<()> {
                self.0.write(line, record)
            }

            fn flush(&mut self) -> Result<()> {
                Ok(())
            }

            fn name(&self) -> &str {
                "errors"
            }

            fn level(&self) -> Option<LogLevel> {
                Some(LogLevel::Error)
            }
        }

        let relay = Relay::quiet();
        let all = Memory::default();
        let errors = Memory::default();
        relay.configure(memory_config(&all).sink(OnlyErrors(errors.clone())));

        let log = relay.get_logger("split");
        log.info("routine");
        log.error("broken");
        relay.shutdown();

        assert_eq!(all.lines.lock().len(), 2);
        assert_eq!(*errors.lines.lock(), vec!["ERROR split broken"]);
    }
}
