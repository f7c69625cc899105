//! Blocking byte-stream transport used by the transit protocol client.
//!
//! The protocol code only ever sees the [`ByteStream`] trait, so tests can
//! drive it with a canned in-memory stream while the device runs over a
//! plain TCP socket. All waits are bounded; there is no cancellation — a
//! call completes, times out, or the device resets.

use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::time::Duration;

/// Read timeout applied to the socket outside of explicit awaits.
const READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Sequential blocking transport: one connection, one call in flight.
pub trait ByteStream {
    /// Establish a connection to `host:port`.
    fn connect(&mut self, host: &str, port: u16) -> io::Result<()>;

    /// Send a block of bytes in full.
    fn send(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Block until response data is available or `timeout` elapses.
    /// `Ok(false)` means nothing arrived in time.
    fn await_data(&mut self, timeout: Duration) -> io::Result<bool>;

    /// Read one `\n`-terminated line (terminator included when present).
    /// Returns an empty string at end of stream.
    fn read_line(&mut self) -> io::Result<String>;

    /// Read exactly `len` bytes.
    fn read_exact_bytes(&mut self, len: usize) -> io::Result<Vec<u8>>;

    /// Read until end of stream, but never more than `limit + 1` bytes —
    /// a result longer than `limit` tells the caller the peer overran the
    /// ceiling without this side buffering the excess.
    fn read_to_end_bounded(&mut self, limit: usize) -> io::Result<Vec<u8>>;

    /// Drop the connection. Idempotent.
    fn close(&mut self);
}

/// [`ByteStream`] over a blocking TCP socket.
#[derive(Default)]
pub struct TcpByteStream {
    reader: Option<BufReader<TcpStream>>,
}

impl TcpByteStream {
    pub fn new() -> Self {
        Self::default()
    }

    fn reader(&mut self) -> io::Result<&mut BufReader<TcpStream>> {
        self.reader
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "stream is not connected"))
    }
}

impl ByteStream for TcpByteStream {
    fn connect(&mut self, host: &str, port: u16) -> io::Result<()> {
        self.close();
        let stream = TcpStream::connect((host, port))?;
        stream.set_read_timeout(Some(READ_TIMEOUT))?;
        self.reader = Some(BufReader::new(stream));
        Ok(())
    }

    fn send(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.reader()?.get_mut().write_all(bytes)
    }

    fn await_data(&mut self, timeout: Duration) -> io::Result<bool> {
        let reader = self.reader()?;
        if !reader.buffer().is_empty() {
            return Ok(true);
        }

        let socket = reader.get_ref();
        socket.set_read_timeout(Some(timeout))?;
        let mut probe = [0u8; 1];
        let outcome = match socket.peek(&mut probe) {
            // EOF before any payload: nothing is coming
            Ok(0) => Ok(false),
            Ok(_) => Ok(true),
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                Ok(false)
            }
            Err(e) => Err(e),
        };
        socket.set_read_timeout(Some(READ_TIMEOUT))?;
        outcome
    }

    fn read_line(&mut self) -> io::Result<String> {
        let mut line = String::new();
        self.reader()?.read_line(&mut line)?;
        Ok(line)
    }

    fn read_exact_bytes(&mut self, len: usize) -> io::Result<Vec<u8>> {
        let mut bytes = vec![0u8; len];
        self.reader()?.read_exact(&mut bytes)?;
        Ok(bytes)
    }

    fn read_to_end_bounded(&mut self, limit: usize) -> io::Result<Vec<u8>> {
        let mut bytes = Vec::new();
        self.reader()?
            .by_ref()
            .take(limit as u64 + 1)
            .read_to_end(&mut bytes)?;
        Ok(bytes)
    }

    fn close(&mut self) {
        if let Some(reader) = self.reader.take() {
            let _ = reader.get_ref().shutdown(Shutdown::Both);
        }
    }
}

#[cfg(test)]
pub(crate) mod mock {
    //! Canned in-memory stream for protocol tests.

    use super::*;

    pub(crate) struct MockStream {
        response: io::Cursor<Vec<u8>>,
        /// Everything the code under test sent, for request assertions.
        pub sent: Vec<u8>,
        pub connected: bool,
        refuse_connect: bool,
        starve: bool,
    }

    impl MockStream {
        /// A stream that connects and replies with `response`.
        pub fn with_response(response: &[u8]) -> Self {
            Self {
                response: io::Cursor::new(response.to_vec()),
                sent: Vec::new(),
                connected: false,
                refuse_connect: false,
                starve: false,
            }
        }

        /// A stream whose `connect` always fails.
        pub fn refusing() -> Self {
            let mut mock = Self::with_response(b"");
            mock.refuse_connect = true;
            mock
        }

        /// A stream that connects but never produces data.
        pub fn starved() -> Self {
            let mut mock = Self::with_response(b"");
            mock.starve = true;
            mock
        }
    }

    impl ByteStream for MockStream {
        fn connect(&mut self, _host: &str, _port: u16) -> io::Result<()> {
            if self.refuse_connect {
                return Err(io::Error::new(
                    io::ErrorKind::ConnectionRefused,
                    "mock refused",
                ));
            }
            self.connected = true;
            Ok(())
        }

        fn send(&mut self, bytes: &[u8]) -> io::Result<()> {
            self.sent.extend_from_slice(bytes);
            Ok(())
        }

        fn await_data(&mut self, _timeout: Duration) -> io::Result<bool> {
            Ok(!self.starve)
        }

        fn read_line(&mut self) -> io::Result<String> {
            let mut line = String::new();
            self.response.read_line(&mut line)?;
            Ok(line)
        }

        fn read_exact_bytes(&mut self, len: usize) -> io::Result<Vec<u8>> {
            let mut bytes = vec![0u8; len];
            self.response.read_exact(&mut bytes)?;
            Ok(bytes)
        }

        fn read_to_end_bounded(&mut self, limit: usize) -> io::Result<Vec<u8>> {
            let mut bytes = Vec::new();
            io::Read::by_ref(&mut self.response)
                .take(limit as u64 + 1)
                .read_to_end(&mut bytes)?;
            Ok(bytes)
        }

        fn close(&mut self) {
            self.connected = false;
        }
    }

    #[test]
    fn mock_replays_its_response() {
        let mut mock = MockStream::with_response(b"first\nsecond\n");
        mock.connect("example", 80).unwrap();
        assert_eq!(mock.read_line().unwrap(), "first\n");
        assert_eq!(mock.read_to_end_bounded(100).unwrap(), b"second\n");
    }
}
