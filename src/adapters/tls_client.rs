//! Outbound TLS client adapter.
//!
//! Implements [`Transport`] for the Telegram client: one session at a time,
//! opened per request and torn down afterwards.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: `esp_idf_svc::tls::EspTls` (mbedTLS) with
//!   the ESP-IDF certificate bundle for server verification.
//! - **all other targets**: plaintext `std::net::TcpStream` for host-side
//!   simulation against a local endpoint.
//!
//! ## Timeouts
//!
//! Both backends open a plain `std::net::TcpStream` first: the connect
//! timeout bounds the TCP connect (and, on the device, the handshake), and
//! the I/O timeout becomes the socket read/write timeout.  A stalled peer
//! surfaces as `Ok(0)` from `read` (nothing yet) or `Err(Timeout)` from
//! `write`.  [`Transport::set_read_timeout`] narrows the socket read
//! timeout so a response drain never outlives its deadline.

use std::io::ErrorKind;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use log::{debug, info};

use crate::net::transport::{Endpoint, Transport, TransportError};

#[cfg(target_os = "espidf")]
use esp_idf_svc::tls::{Config, EspTls};
#[cfg(target_os = "espidf")]
use log::warn;

#[cfg(not(target_os = "espidf"))]
use std::io::{Read, Write};

/// One open session.  On the device the TLS context owns the socket and
/// `socket` is a second handle to it, kept for timeout changes.
#[cfg(target_os = "espidf")]
struct Session {
    tls: EspTls<TcpStream>,
    socket: TcpStream,
}

#[cfg(not(target_os = "espidf"))]
struct Session {
    socket: TcpStream,
}

pub struct TlsClient {
    session: Option<Session>,
    sessions: u32,
}

impl Default for TlsClient {
    fn default() -> Self {
        Self::new()
    }
}

impl TlsClient {
    pub fn new() -> Self {
        Self {
            session: None,
            sessions: 0,
        }
    }

    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    /// Sessions opened so far.
    pub fn sessions(&self) -> u32 {
        self.sessions
    }

    fn session_mut(&mut self) -> Result<&mut Session, TransportError> {
        self.session.as_mut().ok_or(TransportError::NotConnected)
    }

    /// TCP connect with both socket timeouts applied.
    fn open_socket(endpoint: &Endpoint<'_>) -> Result<TcpStream, TransportError> {
        let addr = (endpoint.host, endpoint.port)
            .to_socket_addrs()
            .map_err(|_| TransportError::Connect)?
            .next()
            .ok_or(TransportError::Connect)?;
        let connect_timeout = Duration::from_millis(u64::from(endpoint.connect_timeout_ms.max(1)));
        let socket =
            TcpStream::connect_timeout(&addr, connect_timeout).map_err(|_| TransportError::Connect)?;
        let io_timeout = Some(Duration::from_millis(u64::from(endpoint.io_timeout_ms.max(1))));
        socket
            .set_read_timeout(io_timeout)
            .and_then(|()| socket.set_write_timeout(io_timeout))
            .map_err(|_| TransportError::Connect)?;
        Ok(socket)
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_connect(endpoint: &Endpoint<'_>) -> Result<Session, TransportError> {
        let socket = Self::open_socket(endpoint)?;
        let control = socket.try_clone().map_err(|_| TransportError::Connect)?;
        let mut tls = EspTls::adopt(socket).map_err(|e| {
            warn!("TlsClient: esp_tls init failed: {}", e);
            TransportError::Connect
        })?;
        let config = Config {
            common_name: Some(endpoint.host),
            timeout_ms: endpoint.connect_timeout_ms,
            use_crt_bundle_attach: true,
            ..Default::default()
        };
        tls.negotiate(endpoint.host, &config).map_err(|e| {
            warn!("TlsClient: handshake with {} failed: {}", endpoint.host, e);
            TransportError::Connect
        })?;
        Ok(Session {
            tls,
            socket: control,
        })
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_connect(endpoint: &Endpoint<'_>) -> Result<Session, TransportError> {
        Ok(Session {
            socket: Self::open_socket(endpoint)?,
        })
    }
}

impl Transport for TlsClient {
    fn connect(&mut self, endpoint: &Endpoint<'_>) -> Result<(), TransportError> {
        self.close();
        let session = Self::platform_connect(endpoint)?;
        self.session = Some(session);
        self.sessions = self.sessions.wrapping_add(1);
        debug!("TlsClient: session {} open to {}:{}", self.sessions, endpoint.host, endpoint.port);
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn write(&mut self, data: &[u8]) -> Result<usize, TransportError> {
        let session = self.session_mut()?;
        session.tls.write(data).map_err(|e| {
            debug!("TlsClient: write error {}", e);
            TransportError::Io
        })
    }

    #[cfg(not(target_os = "espidf"))]
    fn write(&mut self, data: &[u8]) -> Result<usize, TransportError> {
        let session = self.session_mut()?;
        session.socket.write(data).map_err(|e| match e.kind() {
            ErrorKind::WouldBlock | ErrorKind::TimedOut => TransportError::Timeout,
            _ => TransportError::Io,
        })
    }

    #[cfg(target_os = "espidf")]
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        let session = self.session_mut()?;
        match session.tls.read(buf) {
            Ok(0) => Err(TransportError::Closed),
            Ok(n) => Ok(n),
            Err(e) => {
                debug!("TlsClient: read error {}", e);
                Err(TransportError::Io)
            }
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        let session = self.session_mut()?;
        match session.socket.read(buf) {
            Ok(0) => Err(TransportError::Closed),
            Ok(n) => Ok(n),
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => Ok(0),
            Err(_) => Err(TransportError::Io),
        }
    }

    fn close(&mut self) {
        if self.session.take().is_some() {
            debug!("TlsClient: session closed");
        }
    }

    fn set_read_timeout(&mut self, timeout_ms: u32) -> Result<(), TransportError> {
        let session = self.session_mut()?;
        let timeout = Duration::from_millis(u64::from(timeout_ms.max(1)));
        session.socket.set_read_timeout(Some(timeout)).map_err(|e| match e.kind() {
            ErrorKind::NotConnected => TransportError::Closed,
            _ => TransportError::Io,
        })
    }
}

impl Drop for TlsClient {
    fn drop(&mut self) {
        if self.session.is_some() {
            info!("TlsClient: dropping open session");
            self.close();
        }
    }
}
