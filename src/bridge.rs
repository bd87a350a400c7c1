//! Cross-process bridge
//!
//! Worker processes reach the owning process's relay over a loopback TCP
//! connection carrying newline-delimited JSON:
//!
//! 1. the server sends one [`Hello`] line with its minimum level;
//! 2. the worker sends one [`LogRecord`] per line until it disconnects.
//!
//! Records received here go through the same enqueue path as local
//! producers, so the owning process still has exactly one consumer and the
//! only open handles on its sinks.

use crate::core::{LogLevel, LogRecord, RelayError, Result};
use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader, ErrorKind, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Environment variable through which worker processes learn the relay address
pub const RELAY_ADDR_ENV: &str = "LOG_RELAY_ADDR";

const ACCEPT_BACKOFF: Duration = Duration::from_millis(20);

/// Longest accepted wire line; a peer sending more is disconnected
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

/// Handshake sent by the server on every new connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hello {
    pub min_level: LogLevel,
}

/// Serialize a value as one wire line
pub fn encode_line<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let mut line = serde_json::to_vec(value)?;
    line.push(b'\n');
    Ok(line)
}

/// Where the server hands records and reports problems
pub(crate) trait RecordIntake: Send + Sync {
    fn deliver(&self, record: LogRecord);
    fn report(&self, message: String);
}

/// Accepts worker connections until stopped
pub struct RelayServer {
    local_addr: SocketAddr,
    stop: Arc<AtomicBool>,
    acceptor: Option<thread::JoinHandle<()>>,
}

impl RelayServer {
    pub(crate) fn bind(
        addr: SocketAddr,
        hello: Hello,
        intake: Arc<dyn RecordIntake>,
        poll_interval: Duration,
    ) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .map_err(|e| RelayError::bridge(format!("cannot listen on {}: {}", addr, e)))?;
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;
        let hello = encode_line(&hello)?;
        let stop = Arc::new(AtomicBool::new(false));

        let acceptor = {
            let stop = Arc::clone(&stop);
            thread::Builder::new()
                .name("log-relay-bridge".into())
                .spawn(move || accept_loop(listener, hello, intake, stop, poll_interval))
                .map_err(|e| RelayError::io_operation("start bridge", "cannot spawn acceptor", e))?
        };

        Ok(Self {
            local_addr,
            stop,
            acceptor: Some(acceptor),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting; open connections close at their next idle poll
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.acceptor.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for RelayServer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn accept_loop(
    listener: TcpListener,
    hello: Vec<u8>,
    intake: Arc<dyn RecordIntake>,
    stop: Arc<AtomicBool>,
    poll_interval: Duration,
) {
    while !stop.load(Ordering::Acquire) {
        match listener.accept() {
            Ok((stream, peer)) => {
                let hello = hello.clone();
                let intake_for_conn = Arc::clone(&intake);
                let stop = Arc::clone(&stop);
                let spawned = thread::Builder::new()
                    .name(format!("log-relay-bridge-{}", peer))
                    .spawn(move || {
                        if let Err(e) =
                            serve_connection(stream, &hello, &*intake_for_conn, &stop, poll_interval)
                        {
                            intake_for_conn.report(format!("bridge connection {} failed: {}", peer, e));
                        }
                    });
                if let Err(e) = spawned {
                    intake.report(format!("cannot serve bridge connection {}: {}", peer, e));
                }
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => {
                thread::sleep(ACCEPT_BACKOFF.min(poll_interval));
            }
            Err(e) => {
                intake.report(format!("bridge accept failed: {}", e));
                thread::sleep(poll_interval);
            }
        }
    }
}

fn serve_connection(
    stream: TcpStream,
    hello: &[u8],
    intake: &dyn RecordIntake,
    stop: &AtomicBool,
    poll_interval: Duration,
) -> Result<()> {
    let peer = stream.peer_addr()?;
    stream.set_nonblocking(false)?;
    stream.set_read_timeout(Some(poll_interval))?;
    (&stream).write_all(hello)?;

    let mut reader = BufReader::new(stream);
    let mut line = Vec::with_capacity(256);
    loop {
        // Never buffer more than one byte past the limit
        let budget = (MAX_LINE_BYTES + 1 - line.len()) as u64;
        match (&mut reader).take(budget).read_until(b'\n', &mut line) {
            Ok(0) => return Ok(()),
            Ok(_) if line.len() > MAX_LINE_BYTES => {
                intake.report(format!(
                    "record from {} exceeds {} bytes; closing connection",
                    peer, MAX_LINE_BYTES
                ));
                return Ok(());
            }
            Ok(_) => {
                // A line without its newline means the peer closed mid-record
                if line.last() != Some(&b'\n') {
                    continue;
                }
                match serde_json::from_slice::<LogRecord>(&line) {
                    Ok(record) => intake.deliver(record),
                    Err(e) => intake.report(format!("malformed record from {}: {}", peer, e)),
                }
                line.clear();
            }
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                // Partial bytes stay in `line` until the rest arrives
                if stop.load(Ordering::Acquire) {
                    return Ok(());
                }
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::io::BufReader;
    use std::time::Instant;

    #[derive(Default)]
    struct Collect {
        records: Mutex<Vec<LogRecord>>,
        reports: Mutex<Vec<String>>,
    }

    impl RecordIntake for Collect {
        fn deliver(&self, record: LogRecord) {
            self.records.lock().push(record);
        }

        fn report(&self, message: String) {
            self.reports.lock().push(message);
        }
    }

    fn wait_until(condition: impl Fn() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(10));
        }
        false
    }

    fn start(intake: Arc<Collect>) -> RelayServer {
        RelayServer::bind(
            "127.0.0.1:0".parse().unwrap(),
            Hello {
                min_level: LogLevel::Warning,
            },
            intake,
            Duration::from_millis(20),
        )
        .unwrap()
    }

    #[test]
    fn test_handshake_then_records() {
        let intake = Arc::new(Collect::default());
        let mut server = start(Arc::clone(&intake));

        let mut stream = TcpStream::connect(server.local_addr()).unwrap();
        let mut hello = String::new();
        BufReader::new(stream.try_clone().unwrap())
            .read_line(&mut hello)
            .unwrap();
        let hello: Hello = serde_json::from_str(hello.trim_end()).unwrap();
        assert_eq!(hello.min_level, LogLevel::Warning);

        let record = LogRecord::new(LogLevel::Error, "worker", "remote failure");
        stream.write_all(&encode_line(&record).unwrap()).unwrap();
        stream.write_all(b"not json\n").unwrap();

        assert!(wait_until(|| intake.records.lock().len() == 1
            && intake.reports.lock().len() == 1));
        assert_eq!(intake.records.lock()[0], record);
        assert!(intake.reports.lock()[0].contains("malformed record"));

        server.stop();
    }

    #[test]
    fn test_record_split_across_writes() {
        let intake = Arc::new(Collect::default());
        let _server = start(Arc::clone(&intake));

        let mut stream = TcpStream::connect(_server.local_addr()).unwrap();
        let record = LogRecord::new(LogLevel::Info, "worker", "in two parts");
        let bytes = encode_line(&record).unwrap();
        let (head, tail) = bytes.split_at(bytes.len() / 2);

        stream.write_all(head).unwrap();
        stream.flush().unwrap();
        thread::sleep(Duration::from_millis(60));
        stream.write_all(tail).unwrap();

        assert!(wait_until(|| intake.records.lock().len() == 1));
        assert_eq!(intake.records.lock()[0].message, "in two parts");
    }

    #[test]
    fn test_oversized_line_closes_connection() {
        let intake = Arc::new(Collect::default());
        let server = start(Arc::clone(&intake));

        let mut stream = TcpStream::connect(server.local_addr()).unwrap();
        let mut reader = BufReader::new(stream.try_clone().unwrap());
        let mut hello = String::new();
        reader.read_line(&mut hello).unwrap();

        // The server may reset the connection before everything is sent
        let flood = vec![b'a'; MAX_LINE_BYTES + 4096];
        let _ = stream.write_all(&flood);

        assert!(wait_until(|| intake
            .reports
            .lock()
            .iter()
            .any(|report| report.contains("exceeds"))));
        assert!(intake.records.lock().is_empty());

        // Nothing but end of stream (or a reset) follows the handshake
        let mut rest = Vec::new();
        let _ = reader.read_to_end(&mut rest);
        assert!(rest.is_empty());
    }
}
