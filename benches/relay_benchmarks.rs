//! Criterion benchmarks for log_relay

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use log_relay::core::{DateFormat, LogRecord};
use log_relay::prelude::*;
use log_relay::{LevelFilter, RecordFormat};
use std::time::Duration;

/// Discards everything, so benchmarks measure the relay and not the disk
struct Null;

impl Sink for Null {
    fn write(&mut self, line: &str, _record: &LogRecord) -> Result<()> {
        black_box(line);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        "null"
    }
}

fn null_relay(level: LogLevel) -> Relay {
    let relay = Relay::quiet();
    relay.configure(
        RelayConfig::new()
            .log_to_stderr(false)
            .level(level)
            .queue_capacity(64 * 1024)
            .overflow_policy(OverflowPolicy::DropNewest)
            .poll_interval(Duration::from_millis(10))
            .sink(Null),
    );
    relay
}

// ============================================================================
// Producer Path Benchmarks
// ============================================================================

fn bench_enqueue(c: &mut Criterion) {
    let mut group = c.benchmark_group("enqueue");
    group.throughput(Throughput::Elements(1));

    let relay = null_relay(LogLevel::Trace);
    let log = relay.get_logger("bench.enqueue");

    group.bench_function("info", |b| {
        b.iter(|| {
            log.info(black_box("Info message"));
        });
    });

    group.bench_function("info_macro_formatted", |b| {
        b.iter(|| {
            log_relay::info!(log, "request {} took {}ms", black_box(42), black_box(7));
        });
    });

    let err = std::io::Error::new(std::io::ErrorKind::Other, "bench failure");
    group.bench_function("exception", |b| {
        b.iter(|| {
            log.exception(black_box("Failed"), &err);
        });
    });

    group.finish();
    relay.shutdown();
}

fn bench_level_filtering(c: &mut Criterion) {
    let mut group = c.benchmark_group("level_filtering");
    group.throughput(Throughput::Elements(1));

    let relay = null_relay(LogLevel::Warning);
    let log = relay.get_logger("bench.filter");

    group.bench_function("below_threshold", |b| {
        b.iter(|| {
            log.debug(black_box("Filtered"));
        });
    });

    group.bench_function("below_threshold_macro", |b| {
        b.iter(|| {
            log_relay::debug!(log, "Filtered {}", black_box(1));
        });
    });

    group.bench_function("above_threshold", |b| {
        b.iter(|| {
            log.error(black_box("Accepted"));
        });
    });

    let filter = LevelFilter::new(LogLevel::Info)
        .with_override("db", LogLevel::Debug)
        .with_override("db.pool", LogLevel::Error)
        .with_override("http.client", LogLevel::Warning);
    group.bench_function("hierarchical_lookup", |b| {
        b.iter(|| filter.enabled(black_box("db.pool.conn"), black_box(LogLevel::Info)));
    });

    group.finish();
    relay.shutdown();
}

fn bench_concurrent_producers(c: &mut Criterion) {
    let mut group = c.benchmark_group("concurrent_producers");
    group.throughput(Throughput::Elements(400));

    let relay = null_relay(LogLevel::Info);

    group.bench_function("threads_4x100", |b| {
        b.iter(|| {
            std::thread::scope(|scope| {
                for t in 0..4 {
                    let log = relay.get_logger("bench.concurrent");
                    scope.spawn(move || {
                        for i in 0..100 {
                            log.info(format!("thread {} message {}", t, i));
                        }
                    });
                }
            });
        });
    });

    group.finish();
    relay.shutdown();
}

// ============================================================================
// Consumer Path Benchmarks
// ============================================================================

fn bench_formatting(c: &mut Criterion) {
    let mut group = c.benchmark_group("formatting");
    group.throughput(Throughput::Elements(1));

    let record = LogRecord::new(LogLevel::Info, "bench.format", "User 42 logged in");
    let default_format = RecordFormat::default();
    let short_format = RecordFormat::parse("{level} {name}: {message}", DateFormat::default())
        .expect("valid template");

    group.bench_function("default_template", |b| {
        b.iter(|| default_format.render(black_box(&record)));
    });

    group.bench_function("short_template", |b| {
        b.iter(|| short_format.render(black_box(&record)));
    });

    group.bench_function("record_to_json", |b| {
        b.iter(|| serde_json::to_vec(black_box(&record)).unwrap());
    });

    group.finish();
}

fn bench_rotating_file(c: &mut Criterion) {
    let mut group = c.benchmark_group("rotating_file");
    group.throughput(Throughput::Elements(1));

    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let policy = RotationPolicy::new()
        .with_max_bytes(256 * 1024)
        .with_backup_count(3);
    let mut sink = RotatingFileSink::open(temp_dir.path().join("bench.log"), policy, FileMode::Append)
        .expect("Failed to open sink");
    let record = LogRecord::new(LogLevel::Info, "bench.file", "Written to disk");
    let line = RecordFormat::default().render(&record);

    group.bench_function("write", |b| {
        b.iter(|| sink.write(black_box(&line), &record).unwrap());
    });

    group.finish();
}

// ============================================================================
// Criterion Configuration
// ============================================================================

criterion_group!(
    benches,
    bench_enqueue,
    bench_level_filtering,
    bench_concurrent_producers,
    bench_formatting,
    bench_rotating_file
);

criterion_main!(benches);
