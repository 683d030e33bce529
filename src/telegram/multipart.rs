//! Streamed `multipart/form-data` body for `sendPhoto`.
//!
//! ```text
//!   head ─ chat_id part ─ caption part ─ file part header ─ JPEG (chunked) ─ closing boundary
//!   └──────────── written before the frame ─────────────┘                    └── after ──┘
//! ```
//!
//! Only the small framing strings are allocated.  The frame is written
//! straight from the camera buffer in fixed-size chunks, and
//! `Content-Length` is known up front from the part lengths.
//!
//! The whole body shares one write deadline.  It is checked before every
//! write, so a slow link overshoots it by at most one socket write
//! timeout.

use std::time::{Duration, Instant};

use log::warn;

use crate::net::transport::{Transport, TransportError};

/// Form fields other than the file itself.
#[derive(Debug, Clone, Copy)]
pub struct PhotoForm<'a> {
    pub chat_id: &'a str,
    pub caption: &'a str,
    pub boundary: &'a str,
}

impl PhotoForm<'_> {
    /// `Content-Type` header value.
    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    /// Everything before the JPEG bytes.
    pub fn preamble(&self) -> String {
        let b = self.boundary;
        format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"chat_id\"\r\n\r\n{}\r\n\
             --{b}\r\nContent-Disposition: form-data; name=\"caption\"\r\n\r\n{}\r\n\
             --{b}\r\nContent-Disposition: form-data; name=\"photo\"; filename=\"image.jpg\"\r\n\
             Content-Type: image/jpeg\r\n\r\n",
            self.chat_id, self.caption
        )
    }

    /// Everything after the JPEG bytes.
    pub fn epilogue(&self) -> String {
        format!("\r\n--{}--\r\n", self.boundary)
    }

    /// Exact body length for a frame of `jpeg_len` bytes.
    pub fn content_length(&self, jpeg_len: usize) -> usize {
        self.preamble().len() + jpeg_len + self.epilogue().len()
    }
}

/// Boundary unique per request.
pub fn boundary(seq: u32) -> String {
    format!("----CamWatchBoundary{seq:08x}")
}

/// Write the body (not the head) to `t`, `chunk` bytes of JPEG at a time.
///
/// Fails with [`TransportError::Timeout`] once `deadline` has passed since
/// the call, whatever the per-write timeout allows.
pub fn write_body(
    t: &mut impl Transport,
    form: &PhotoForm<'_>,
    jpeg: &[u8],
    chunk: usize,
    deadline: Duration,
) -> Result<(), TransportError> {
    let started = Instant::now();
    write_before(t, form.preamble().as_bytes(), started, deadline)?;
    for piece in jpeg.chunks(chunk.max(1)) {
        write_before(t, piece, started, deadline)?;
    }
    write_before(t, form.epilogue().as_bytes(), started, deadline)
}

fn write_before(
    t: &mut impl Transport,
    data: &[u8],
    started: Instant,
    deadline: Duration,
) -> Result<(), TransportError> {
    if started.elapsed() >= deadline {
        warn!("multipart: upload deadline of {:?} passed", deadline);
        return Err(TransportError::Timeout);
    }
    t.write_all(data)
}
