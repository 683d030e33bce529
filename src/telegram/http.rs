//! Minimal HTTP/1.1 framing over a [`Transport`].
//!
//! Requests are written by hand (head, then caller-streamed body) and
//! responses are read incrementally:
//!
//! * the status line is parsed as soon as its first `\n` arrives;
//! * every byte also goes through a [`TailBuffer`] that keeps memory
//!   bounded no matter how much the server sends;
//! * reading stops when the peer closes, on a read error, or at the
//!   drain deadline;
//! * before every read the transport's read timeout is narrowed to the
//!   time left, so one blocking read cannot carry the drain past its
//!   deadline.

use std::time::{Duration, Instant};

use log::debug;

use crate::app::ports::MessagingError;
use crate::net::transport::{Transport, TransportError};

/// Upload responses: keep at most this many bytes.
pub const UPLOAD_TAIL_CAP: usize = 3000;
/// Upload responses: bytes discarded from the front when the cap is hit.
pub const UPLOAD_TAIL_DROP: usize = 1500;

/// JSON responses that must be parsed whole (getUpdates).
pub const JSON_BODY_CAP: usize = 16 * 1024;

const READ_CHUNK: usize = 256;
const STATUS_LINE_MAX: usize = 64;

/// Build a request head terminated by the blank line.
pub fn request_head(
    method: &str,
    host: &str,
    path: &str,
    content: Option<(&str, usize)>,
) -> String {
    let mut head = format!(
        "{method} {path} HTTP/1.1\r\nHost: {host}\r\nUser-Agent: camwatch\r\nConnection: close\r\n"
    );
    if let Some((content_type, len)) = content {
        head.push_str(&format!(
            "Content-Type: {content_type}\r\nContent-Length: {len}\r\n"
        ));
    }
    head.push_str("\r\n");
    head
}

/// Parse `HTTP/1.x NNN ...` into the status code.
pub fn parse_status_line(line: &[u8]) -> Option<u16> {
    let line = core::str::from_utf8(line).ok()?;
    let mut parts = line.split_whitespace();
    let version = parts.next()?;
    if !version.starts_with("HTTP/") {
        return None;
    }
    let code = parts.next()?;
    if code.len() != 3 {
        return None;
    }
    code.parse().ok()
}

// ───────────────────────────────────────────────────────────────
// Bounded tail buffer
// ───────────────────────────────────────────────────────────────

/// Keeps the most recent bytes of a stream.
///
/// When a push takes the length past `cap`, the oldest `drop` bytes are
/// removed (repeatedly, until back under the cap).
#[derive(Debug, Clone)]
pub struct TailBuffer {
    buf: Vec<u8>,
    cap: usize,
    drop: usize,
    discarded: usize,
}

impl TailBuffer {
    pub fn new(cap: usize, drop: usize) -> Self {
        Self {
            buf: Vec::new(),
            cap,
            drop: drop.clamp(1, cap.max(1)),
            discarded: 0,
        }
    }

    pub fn push(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
        while self.buf.len() > self.cap {
            let n = self.drop.min(self.buf.len());
            self.buf.drain(..n);
            self.discarded += n;
        }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    /// Bytes thrown away so far.
    pub fn discarded(&self) -> usize {
        self.discarded
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }
}

// ───────────────────────────────────────────────────────────────
// Response
// ───────────────────────────────────────────────────────────────

/// Status plus whatever tail of the response was retained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    /// Retained bytes (head included when nothing was discarded).
    pub tail: Vec<u8>,
    /// Whether the front of the response was discarded.
    pub truncated: bool,
}

impl HttpResponse {
    /// Bytes after the header block, or the whole tail if the header block
    /// is not (or no longer) present.
    pub fn body(&self) -> &[u8] {
        find(&self.tail, b"\r\n\r\n").map_or(&self.tail, |i| &self.tail[i + 4..])
    }

    /// The outermost `{ ... }` in the body.  Tolerates chunked framing.
    pub fn json(&self) -> Option<&[u8]> {
        let body = self.body();
        let start = body.iter().position(|&b| b == b'{')?;
        let end = body.iter().rposition(|&b| b == b'}')?;
        (end >= start).then(|| &body[start..=end])
    }

    pub fn contains(&self, needle: &[u8]) -> bool {
        find(&self.tail, needle).is_some()
    }
}

fn find(hay: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || hay.len() < needle.len() {
        return None;
    }
    hay.windows(needle.len()).position(|w| w == needle)
}

/// Whole milliseconds left, rounded up so a sub-millisecond remainder
/// still waits.
fn remaining_ms(left: Duration) -> u32 {
    let ms = left.as_micros().div_ceil(1000);
    u32::try_from(ms).unwrap_or(u32::MAX).max(1)
}

/// Drain a response from `t` until close, read error, or `deadline`.
pub fn read_response(
    t: &mut impl Transport,
    deadline: Duration,
    cap: usize,
    drop: usize,
) -> Result<HttpResponse, MessagingError> {
    let started = Instant::now();
    let mut tail = TailBuffer::new(cap, drop);
    let mut status_line: Vec<u8> = Vec::with_capacity(STATUS_LINE_MAX);
    let mut status: Option<u16> = None;
    let mut chunk = [0u8; READ_CHUNK];

    loop {
        let Some(left) = deadline
            .checked_sub(started.elapsed())
            .filter(|d| !d.is_zero())
        else {
            debug!("http: drain deadline reached");
            break;
        };
        if let Err(e) = t.set_read_timeout(remaining_ms(left)) {
            debug!("http: cannot bound read: {}", e);
            break;
        }
        let n = match t.read(&mut chunk) {
            Ok(0) => continue,
            Ok(n) => n,
            Err(TransportError::Closed) => break,
            Err(e) => {
                debug!("http: read error {}", e);
                break;
            }
        };
        let data = &chunk[..n];

        if status.is_none() && status_line.len() < STATUS_LINE_MAX {
            let room = STATUS_LINE_MAX - status_line.len();
            status_line.extend_from_slice(&data[..n.min(room)]);
            if let Some(eol) = status_line.iter().position(|&b| b == b'\n') {
                status = parse_status_line(&status_line[..eol]);
                if status.is_none() {
                    return Err(MessagingError::Malformed);
                }
            } else if status_line.len() >= STATUS_LINE_MAX {
                return Err(MessagingError::Malformed);
            }
        }

        tail.push(data);
    }

    let Some(status) = status else {
        return Err(if status_line.is_empty() {
            MessagingError::Timeout
        } else {
            MessagingError::Malformed
        });
    };
    let truncated = tail.discarded() > 0;
    Ok(HttpResponse {
        status,
        tail: tail.into_inner(),
        truncated,
    })
}
