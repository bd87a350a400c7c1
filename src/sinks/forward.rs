//! Forwarding sink for worker processes
//!
//! Ships every record to the owning process's [`RelayServer`] instead of
//! writing it locally, keeping the original origin (pid, thread) intact.
//!
//! [`RelayServer`]: crate::bridge::RelayServer

use crate::bridge::{encode_line, Hello};
use crate::core::{LogLevel, LogRecord, RelayError, Result, Sink};
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::net::{SocketAddr, TcpStream};
use std::time::Duration;

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

pub struct ForwardSink {
    addr: SocketAddr,
    stream: Option<TcpStream>,
    timeout: Duration,
    remote_level: LogLevel,
}

impl ForwardSink {
    /// Connect and complete the handshake
    ///
    /// # Errors
    ///
    /// Returns error if the relay is unreachable or the handshake is invalid
    pub fn connect(addr: SocketAddr, timeout: Duration) -> Result<Self> {
        let (stream, remote_level) = Self::open(addr, timeout)?;
        Ok(Self {
            addr,
            stream: Some(stream),
            timeout,
            remote_level,
        })
    }

    /// Minimum level announced by the owning relay
    pub fn remote_level(&self) -> LogLevel {
        self.remote_level
    }

    fn open(addr: SocketAddr, timeout: Duration) -> Result<(TcpStream, LogLevel)> {
        let stream = TcpStream::connect_timeout(&addr, timeout)
            .map_err(|e| RelayError::bridge(format!("cannot reach relay at {}: {}", addr, e)))?;

        // Set timeouts to prevent hanging
        stream.set_write_timeout(Some(timeout))?;
        stream.set_read_timeout(Some(timeout))?;
        stream.set_nodelay(true)?;

        // Read byte by byte so nothing past the handshake line is consumed
        let mut hello = Vec::new();
        BufReader::with_capacity(1, &stream).read_until(b'\n', &mut hello)?;
        let hello: Hello = serde_json::from_slice(&hello)
            .map_err(|e| RelayError::bridge(format!("bad handshake from {}: {}", addr, e)))?;

        Ok((stream, hello.min_level))
    }

    /// The server never writes after the handshake, so a readable socket
    /// means the peer closed or reset the connection
    fn peer_closed(stream: &TcpStream) -> bool {
        if stream.set_nonblocking(true).is_err() {
            return true;
        }
        let mut probe = [0u8; 1];
        let closed = match stream.peek(&mut probe) {
            Ok(_) => true,
            Err(e) => e.kind() != ErrorKind::WouldBlock,
        };
        closed || stream.set_nonblocking(false).is_err()
    }

    fn send(&mut self, payload: &[u8]) -> std::io::Result<()> {
        let stream = match self.stream.as_mut() {
            Some(stream) => stream,
            None => return Err(ErrorKind::NotConnected.into()),
        };
        if Self::peer_closed(stream) {
            return Err(std::io::Error::new(
                ErrorKind::ConnectionReset,
                "forward connection closed by relay",
            ));
        }
        stream.write_all(payload)?;
        stream.flush()
    }

    fn reconnect(&mut self) -> Result<()> {
        self.stream = None;
        let (stream, remote_level) = Self::open(self.addr, self.timeout)?;
        self.stream = Some(stream);
        self.remote_level = remote_level;
        Ok(())
    }
}

impl Sink for ForwardSink {
    fn write(&mut self, _line: &str, record: &LogRecord) -> Result<()> {
        let payload = encode_line(record)?;
        if self.send(&payload).is_ok() {
            return Ok(());
        }

        // One reconnect attempt, then give up on this record
        self.reconnect()?;
        self.send(&payload).map_err(|e| {
            self.stream = None;
            RelayError::bridge(format!("forward to {} failed: {}", self.addr, e))
        })
    }

    fn flush(&mut self) -> Result<()> {
        // Every record is flushed as it is written
        Ok(())
    }

    fn name(&self) -> &str {
        "forward"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::sync::mpsc;

    #[test]
    fn test_connect_refused() {
        // Bind then drop to get a port with nothing listening
        let addr = TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap();
        let result = ForwardSink::connect(addr, Duration::from_millis(200));
        assert!(matches!(result, Err(RelayError::Bridge { .. })));
    }

    #[test]
    fn test_forwards_json_lines() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let server = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            stream
                .write_all(&encode_line(&Hello { min_level: LogLevel::Debug }).unwrap())
                .unwrap();
            let mut line = String::new();
            BufReader::new(stream).read_line(&mut line).unwrap();
            serde_json::from_str::<LogRecord>(line.trim_end()).unwrap()
        });

        let mut sink = ForwardSink::connect(addr, DEFAULT_CONNECT_TIMEOUT).unwrap();
        assert_eq!(sink.remote_level(), LogLevel::Debug);

        let record = LogRecord::new(LogLevel::Info, "worker.1", "shipped");
        sink.write("ignored", &record).unwrap();
        sink.flush().unwrap();

        let received = server.join().unwrap();
        assert_eq!(received, record);
    }

    #[test]
    fn test_reconnects_after_peer_closes() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let hello = encode_line(&Hello { min_level: LogLevel::Info }).unwrap();
        let (closed_tx, closed_rx) = mpsc::channel();

        let server = std::thread::spawn(move || {
            // First connection: handshake, then hang up
            let (mut stream, _) = listener.accept().unwrap();
            stream.write_all(&hello).unwrap();
            drop(stream);
            closed_tx.send(()).unwrap();

            let (mut stream, _) = listener.accept().unwrap();
            stream.write_all(&hello).unwrap();
            let mut line = String::new();
            BufReader::new(stream).read_line(&mut line).unwrap();
            serde_json::from_str::<LogRecord>(line.trim_end()).unwrap()
        });

        let mut sink = ForwardSink::connect(addr, DEFAULT_CONNECT_TIMEOUT).unwrap();
        closed_rx.recv().unwrap();
        std::thread::sleep(Duration::from_millis(50));

        let record = LogRecord::new(LogLevel::Info, "worker.1", "after reconnect");
        sink.write("ignored", &record).unwrap();

        assert_eq!(server.join().unwrap(), record);
    }
}
