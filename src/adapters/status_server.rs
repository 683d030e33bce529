//! Local status server (driving adapter).
//!
//! A tiny HTTP/1.1 endpoint on the LAN, polled from the main loop: the
//! listener is non-blocking, and each [`poll`](StatusServer::poll) serves
//! at most one request.  Requests reach the core only through an injected
//! [`StatusProvider`]; work that needs the camera or the network is handed
//! back to the caller as a [`LocalAction`] so it runs on the control
//! thread after the response has gone out.
//!
//! | Route                 | Result                                  |
//! |-----------------------|-----------------------------------------|
//! | `GET /status`         | JSON [`StatusReport`](crate::app::report::StatusReport) |
//! | `GET /debug`          | JSON [`Diagnostics`](crate::diagnostics::Diagnostics) |
//! | `POST /save-settings` | JSON settings update, 400 on rejection  |
//! | `GET /capture-now`    | [`LocalAction::CaptureNow`]             |
//! | `GET /test-telegram`  | [`LocalAction::TestMessaging`]          |
//! | `GET /stream`         | one JPEG snapshot, 500 without a frame  |
//! | anything else         | 404                                     |
//!
//! A client gets [`REQUEST_DEADLINE`] to deliver the whole request; a
//! slow sender is answered with 408 so it cannot hold the control thread.

use std::io::{self, ErrorKind, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::app::commands::LocalAction;
use crate::app::ports::StatusProvider;
use crate::config::SettingsUpdate;

/// Requests larger than this are refused.
pub const MAX_REQUEST: usize = 2048;
/// Total time allowed for one request to arrive.
pub const REQUEST_DEADLINE: Duration = Duration::from_millis(1000);
const WRITE_TIMEOUT: Duration = Duration::from_millis(300);

// ───────────────────────────────────────────────────────────────
// Request / response
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: Method,
    /// Path without the query string.
    pub path: String,
    pub body: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestError {
    /// Header block not finished yet.
    Incomplete,
    Malformed,
    TooLarge,
}

impl Request {
    /// Parse a complete request.  `Incomplete` until the header block and
    /// `Content-Length` bytes of body have arrived.
    pub fn parse(raw: &[u8]) -> Result<Self, RequestError> {
        if raw.len() > MAX_REQUEST {
            return Err(RequestError::TooLarge);
        }
        let head_end = raw
            .windows(4)
            .position(|w| w == b"\r\n\r\n")
            .ok_or(RequestError::Incomplete)?;
        let head = core::str::from_utf8(&raw[..head_end]).map_err(|_| RequestError::Malformed)?;
        let mut lines = head.split("\r\n");

        let mut request_line = lines.next().ok_or(RequestError::Malformed)?.split(' ');
        let method = match request_line.next() {
            Some("GET") => Method::Get,
            Some("POST") => Method::Post,
            Some(m) if !m.is_empty() => Method::Other,
            _ => return Err(RequestError::Malformed),
        };
        let target = request_line.next().ok_or(RequestError::Malformed)?;
        let path = target.split('?').next().unwrap_or(target).to_string();

        let mut content_length = 0usize;
        for line in lines {
            if let Some((name, value)) = line.split_once(':') {
                if name.trim().eq_ignore_ascii_case("content-length") {
                    content_length = value
                        .trim()
                        .parse()
                        .map_err(|_| RequestError::Malformed)?;
                }
            }
        }

        let body_start = head_end + 4;
        let body_end = body_start
            .checked_add(content_length)
            .filter(|&end| end <= MAX_REQUEST)
            .ok_or(RequestError::TooLarge)?;
        if raw.len() < body_end {
            return Err(RequestError::Incomplete);
        }
        Ok(Self {
            method,
            path,
            body: raw[body_start..body_end].to_vec(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

impl Response {
    fn json(body: String) -> Self {
        Self {
            status: 200,
            content_type: "application/json",
            body: body.into_bytes(),
        }
    }

    fn text(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            content_type: "text/plain",
            body: body.into().into_bytes(),
        }
    }

    fn jpeg(body: Vec<u8>) -> Self {
        Self {
            status: 200,
            content_type: "image/jpeg",
            body,
        }
    }

    fn reason(&self) -> &'static str {
        match self.status {
            200 => "OK",
            400 => "Bad Request",
            404 => "Not Found",
            405 => "Method Not Allowed",
            408 => "Request Timeout",
            413 => "Payload Too Large",
            _ => "Internal Server Error",
        }
    }

    /// Full wire form, head and body.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = format!(
            "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            self.status,
            self.reason(),
            self.content_type,
            self.body.len()
        )
        .into_bytes();
        out.extend_from_slice(&self.body);
        out
    }
}

// ───────────────────────────────────────────────────────────────
// Routing
// ───────────────────────────────────────────────────────────────

/// Map one request to a response and, possibly, deferred work.
pub fn route(req: &Request, provider: &mut impl StatusProvider) -> (Response, Option<LocalAction>) {
    match (req.method, req.path.as_str()) {
        (Method::Get, "/status") => (to_json(&provider.status()), None),
        (Method::Get, "/debug") => (to_json(&provider.debug()), None),
        (Method::Post, "/save-settings") => (save_settings(&req.body, provider), None),
        (Method::Get, "/capture-now") => (
            Response::text(200, "Capture queued"),
            Some(LocalAction::CaptureNow),
        ),
        (Method::Get, "/test-telegram") => (
            Response::text(200, "Telegram test queued"),
            Some(LocalAction::TestMessaging),
        ),
        (Method::Get, "/stream") => match provider.snapshot() {
            Some(jpeg) => (Response::jpeg(jpeg), None),
            None => (Response::text(500, "Camera error"), None),
        },
        (_, "/status" | "/debug" | "/save-settings" | "/capture-now" | "/test-telegram" | "/stream") => {
            (Response::text(405, "Method not allowed"), None)
        }
        _ => (Response::text(404, "Not found"), None),
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Response {
    match serde_json::to_string(value) {
        Ok(body) => Response::json(body),
        Err(e) => {
            warn!("StatusServer: serialise failed: {}", e);
            Response::text(500, "Serialisation error")
        }
    }
}

fn save_settings(body: &[u8], provider: &mut impl StatusProvider) -> Response {
    let update: SettingsUpdate = match serde_json::from_slice(body) {
        Ok(u) => u,
        Err(_) => return Response::text(400, "Bad JSON"),
    };
    match provider.update_settings(&update) {
        Ok(()) => Response::text(200, "Settings staged (will persist soon)"),
        Err(r) => Response::text(400, r.to_string()),
    }
}

// ───────────────────────────────────────────────────────────────
// Server
// ───────────────────────────────────────────────────────────────

pub struct StatusServer {
    listener: TcpListener,
    served: u32,
}

impl StatusServer {
    /// Bind `0.0.0.0:port` in non-blocking mode.
    pub fn bind(port: u16) -> io::Result<Self> {
        Self::bind_addr(("0.0.0.0", port))
    }

    pub fn bind_addr(addr: impl std::net::ToSocketAddrs) -> io::Result<Self> {
        let listener = TcpListener::bind(addr)?;
        listener.set_nonblocking(true)?;
        info!("StatusServer: listening on {}", listener.local_addr()?);
        Ok(Self {
            listener,
            served: 0,
        })
    }

    pub fn local_port(&self) -> Option<u16> {
        self.listener.local_addr().ok().map(|a| a.port())
    }

    /// Requests answered so far.
    pub fn served(&self) -> u32 {
        self.served
    }

    /// Serve at most one pending request.
    pub fn poll(&mut self, provider: &mut impl StatusProvider) -> Option<LocalAction> {
        let stream = match self.listener.accept() {
            Ok((stream, peer)) => {
                debug!("StatusServer: connection from {}", peer);
                stream
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => return None,
            Err(e) => {
                warn!("StatusServer: accept failed: {}", e);
                return None;
            }
        };
        match self.serve(stream, provider) {
            Ok(action) => action,
            Err(e) => {
                debug!("StatusServer: request dropped: {}", e);
                None
            }
        }
    }

    fn serve(
        &mut self,
        mut stream: TcpStream,
        provider: &mut impl StatusProvider,
    ) -> io::Result<Option<LocalAction>> {
        let accepted = Instant::now();
        stream.set_nonblocking(false)?;
        stream.set_write_timeout(Some(WRITE_TIMEOUT))?;

        let mut raw = Vec::with_capacity(512);
        let mut chunk = [0u8; 256];
        let parsed = loop {
            match Request::parse(&raw) {
                Err(RequestError::Incomplete) => {}
                other => break Some(other),
            }
            let Some(left) = REQUEST_DEADLINE.checked_sub(accepted.elapsed()).filter(|d| !d.is_zero())
            else {
                break None;
            };
            stream.set_read_timeout(Some(left))?;
            let n = match stream.read(&mut chunk) {
                Ok(n) => n,
                Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => continue,
                Err(e) => return Err(e),
            };
            if n == 0 {
                break Some(Err(RequestError::Malformed));
            }
            raw.extend_from_slice(&chunk[..n]);
        };

        let (response, action) = match parsed {
            Some(Ok(req)) => {
                let (resp, action) = route(&req, provider);
                info!("StatusServer: {:?} {} -> {}", req.method, req.path, resp.status);
                (resp, action)
            }
            Some(Err(RequestError::TooLarge)) => (Response::text(413, "Request too large"), None),
            Some(Err(_)) => (Response::text(400, "Bad request"), None),
            None => {
                warn!(
                    "StatusServer: request incomplete after {:?} ({} bytes), dropping",
                    REQUEST_DEADLINE,
                    raw.len()
                );
                (Response::text(408, "Request timeout"), None)
            }
        };
        stream.write_all(&response.to_bytes())?;
        stream.flush()?;
        self.served = self.served.wrapping_add(1);
        Ok(action)
    }
}
