//! Transport abstraction: an outbound, byte-oriented stream.
//!
//! Concrete implementations:
//! - ESP-IDF `esp-tls` client session (device)
//! - plaintext `std::net::TcpStream` (host simulation)
//!
//! The Telegram client is generic over `Transport`, so the HTTP framing
//! and response handling are tested against scripted transports without
//! a network.

use core::fmt;

/// Where and how to connect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Endpoint<'a> {
    pub host: &'a str,
    pub port: u16,
    /// Bound on TCP connect + TLS handshake.
    pub connect_timeout_ms: u32,
    /// Bound on each individual read or write until the caller narrows
    /// reads with [`Transport::set_read_timeout`].
    pub io_timeout_ms: u32,
}

/// Errors from a [`Transport`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    /// TCP connect or TLS handshake failed.
    Connect,
    /// Socket I/O failure.
    Io,
    /// A single read or write exceeded its timeout.
    Timeout,
    /// Operation requires an open session.
    NotConnected,
    /// The peer closed the connection.
    Closed,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connect => write!(f, "connect failed"),
            Self::Io => write!(f, "I/O error"),
            Self::Timeout => write!(f, "timed out"),
            Self::NotConnected => write!(f, "not connected"),
            Self::Closed => write!(f, "connection closed"),
        }
    }
}

/// Outbound byte stream, one session at a time.
pub trait Transport {
    /// Open a session to `endpoint`, closing any previous one first.
    fn connect(&mut self, endpoint: &Endpoint<'_>) -> Result<(), TransportError>;

    /// Write some of `data`.  Returns the number of bytes accepted.
    fn write(&mut self, data: &[u8]) -> Result<usize, TransportError>;

    /// Read up to `buf.len()` bytes.
    ///
    /// Returns `Ok(0)` when nothing arrived within the I/O timeout and
    /// `Err(TransportError::Closed)` once the peer has closed.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError>;

    /// Tear down the session.  Idempotent.
    fn close(&mut self);

    /// Bound each following `read` to `timeout_ms`.  Used to keep a
    /// response drain inside its overall deadline.  Transports that never
    /// block may keep the default.
    fn set_read_timeout(&mut self, _timeout_ms: u32) -> Result<(), TransportError> {
        Ok(())
    }

    /// Write all of `data`.  A write that accepts zero bytes is an error.
    fn write_all(&mut self, mut data: &[u8]) -> Result<(), TransportError> {
        while !data.is_empty() {
            let n = self.write(data)?;
            if n == 0 {
                return Err(TransportError::Io);
            }
            data = &data[n.min(data.len())..];
        }
        Ok(())
    }
}
