//! Mock adapters for integration tests.
//!
//! Records every port call so tests can assert on the full history without
//! touching a camera, a servo, flash or the network.  `Journal` is a shared
//! ordered log that several mocks can append to, for tests that care about
//! the order of side effects across ports.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::net::Ipv4Addr;
use std::rc::Rc;

use camwatch::app::events::AppEvent;
use camwatch::app::ports::{
    CameraPort, ClockPort, EventSink, InboundMessage, LinkPort, MessagingError, MessagingPort,
    ServoError, ServoPort, StorageError, StoragePort, SystemPort,
};
use camwatch::diagnostics::{Diagnostics, ResetReason};
use camwatch::net::transport::{Endpoint, Transport, TransportError};

pub type Journal = Rc<RefCell<Vec<String>>>;

pub fn journal() -> Journal {
    Rc::new(RefCell::new(Vec::new()))
}

fn note(journal: &Option<Journal>, entry: String) {
    if let Some(j) = journal {
        j.borrow_mut().push(entry);
    }
}

// ── MockBoard ─────────────────────────────────────────────────

/// Camera + servo + clock + system in one, like `BoardAdapter`.
pub struct MockBoard {
    /// Scripted frame sizes; `None` entries simulate a failed grab.
    pub frames: VecDeque<Option<usize>>,
    /// Size used once the script runs out; `None` means no frame.
    pub default_frame: Option<usize>,
    pub acquired: u32,
    pub released: u32,

    pub servo_fitted: bool,
    pub servo_fail: bool,
    pub angles: Vec<u8>,

    pub now: Cell<u64>,
    pub delays: Vec<u32>,

    pub reset_reason: ResetReason,
    pub restarts: u32,
    pub watchdog_feeds: u32,
}

impl MockBoard {
    pub fn new() -> Self {
        Self {
            frames: VecDeque::new(),
            default_frame: Some(20_000),
            acquired: 0,
            released: 0,
            servo_fitted: true,
            servo_fail: false,
            angles: Vec::new(),
            now: Cell::new(0),
            delays: Vec::new(),
            reset_reason: ResetReason::PowerOn,
            restarts: 0,
            watchdog_feeds: 0,
        }
    }

    pub fn with_frames(sizes: &[Option<usize>]) -> Self {
        let mut b = Self::new();
        b.frames = sizes.iter().copied().collect();
        b
    }

    pub fn set_now(&self, ms: u64) {
        self.now.set(ms);
    }

    pub fn outstanding(&self) -> i64 {
        i64::from(self.acquired) - i64::from(self.released)
    }

    pub fn last_angle(&self) -> Option<u8> {
        self.angles.last().copied()
    }
}

impl Default for MockBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl CameraPort for MockBoard {
    type Frame = Vec<u8>;

    fn acquire_frame(&mut self) -> Option<Vec<u8>> {
        let size = match self.frames.pop_front() {
            Some(scripted) => scripted,
            None => self.default_frame,
        }?;
        self.acquired += 1;
        Some(vec![0x5A; size])
    }

    fn release_frame(&mut self, _frame: Vec<u8>) {
        self.released += 1;
    }
}

impl ServoPort for MockBoard {
    fn is_fitted(&self) -> bool {
        self.servo_fitted
    }

    fn write_angle(&mut self, angle: u8) -> Result<(), ServoError> {
        if !self.servo_fitted {
            return Err(ServoError::NotFitted);
        }
        if self.servo_fail {
            return Err(ServoError::PwmWriteFailed);
        }
        self.angles.push(angle);
        Ok(())
    }
}

impl ClockPort for MockBoard {
    fn now_ms(&self) -> u64 {
        self.now.get()
    }

    fn delay_ms(&mut self, ms: u32) {
        self.delays.push(ms);
        self.now.set(self.now.get() + u64::from(ms));
    }
}

impl SystemPort for MockBoard {
    fn diagnostics(&self) -> Diagnostics {
        Diagnostics::collect(self.now.get(), None, self.reset_reason)
    }

    fn reset_reason(&self) -> ResetReason {
        self.reset_reason
    }

    fn restart(&mut self) {
        self.restarts += 1;
    }

    fn feed_watchdog(&mut self) {
        self.watchdog_feeds += 1;
    }
}

// ── MockNetwork ───────────────────────────────────────────────

/// Link + messaging.  Pending updates stay on the "server" until a poll
/// with a higher offset skips past them, as with the real Bot API.
pub struct MockNetwork {
    pub connected: bool,
    pub ip: Option<Ipv4Addr>,
    pub texts: Vec<String>,
    /// (caption, jpeg length)
    pub photos: Vec<(String, usize)>,
    pub pending: Vec<InboundMessage>,
    pub polls: Vec<u64>,
    pub text_error: Option<MessagingError>,
    pub photo_error: Option<MessagingError>,
    pub poll_error: Option<MessagingError>,
    pub journal: Option<Journal>,
}

impl MockNetwork {
    pub fn new() -> Self {
        Self {
            connected: true,
            ip: Some(Ipv4Addr::new(192, 168, 1, 50)),
            texts: Vec::new(),
            photos: Vec::new(),
            pending: Vec::new(),
            polls: Vec::new(),
            text_error: None,
            photo_error: None,
            poll_error: None,
            journal: None,
        }
    }

    pub fn offline() -> Self {
        Self {
            connected: false,
            ip: None,
            ..Self::new()
        }
    }

    /// Queue a text update from the configured chat.
    pub fn push_text(&mut self, sequence: u64, text: &str) {
        self.pending.push(InboundMessage {
            sequence,
            text: Some(text.to_string()),
            sender: Some("tester".to_string()),
        });
    }

    pub fn last_text(&self) -> Option<&str> {
        self.texts.last().map(String::as_str)
    }

    pub fn texts_containing(&self, needle: &str) -> usize {
        self.texts.iter().filter(|t| t.contains(needle)).count()
    }
}

impl Default for MockNetwork {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkPort for MockNetwork {
    fn is_connected(&self) -> bool {
        self.connected
    }

    fn rssi(&self) -> Option<i8> {
        self.connected.then_some(-58)
    }

    fn local_ip(&self) -> Option<Ipv4Addr> {
        if self.connected { self.ip } else { None }
    }
}

impl MessagingPort for MockNetwork {
    fn send_text(&mut self, text: &str) -> Result<(), MessagingError> {
        note(&self.journal, format!("text:{text}"));
        if let Some(e) = self.text_error {
            return Err(e);
        }
        self.texts.push(text.to_string());
        Ok(())
    }

    fn send_photo(&mut self, caption: &str, jpeg: &[u8]) -> Result<(), MessagingError> {
        note(&self.journal, format!("photo:{}", jpeg.len()));
        if let Some(e) = self.photo_error {
            return Err(e);
        }
        self.photos.push((caption.to_string(), jpeg.len()));
        Ok(())
    }

    fn poll_one(&mut self, after: u64) -> Result<Option<InboundMessage>, MessagingError> {
        self.polls.push(after);
        if let Some(e) = self.poll_error {
            return Err(e);
        }
        Ok(self.pending.iter().find(|m| m.sequence > after).cloned())
    }
}

// ── MockNvs ───────────────────────────────────────────────────

pub struct MockNvs {
    pub store: HashMap<String, Vec<u8>>,
    pub writes: Vec<String>,
    /// Keys whose writes fail with `IoError`.
    pub failing: Vec<&'static str>,
    pub journal: Option<Journal>,
}

impl MockNvs {
    pub fn new() -> Self {
        Self {
            store: HashMap::new(),
            writes: Vec::new(),
            failing: Vec::new(),
            journal: None,
        }
    }

    pub fn writes_to(&self, key: &str) -> usize {
        self.writes.iter().filter(|k| k.as_str() == key).count()
    }
}

impl Default for MockNvs {
    fn default() -> Self {
        Self::new()
    }
}

impl StoragePort for MockNvs {
    fn read(&self, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        match self.store.get(key) {
            Some(v) => {
                let n = v.len().min(buf.len());
                buf[..n].copy_from_slice(&v[..n]);
                Ok(n)
            }
            None => Err(StorageError::NotFound),
        }
    }

    fn write(&mut self, key: &str, data: &[u8]) -> Result<(), StorageError> {
        self.writes.push(key.to_string());
        if self.failing.contains(&key) {
            return Err(StorageError::IoError);
        }
        note(&self.journal, format!("nvs:{key}"));
        self.store.insert(key.to_string(), data.to_vec());
        Ok(())
    }
}

// ── RecordingSink ─────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

// ── ScriptedTransport ─────────────────────────────────────────

/// Byte transport for driving the real Telegram client.
///
/// Accepts writes until `write_budget` bytes have gone out, then fails;
/// answers reads with `response`.
pub struct ScriptedTransport {
    pub response: Vec<u8>,
    pub cursor: usize,
    pub written: Vec<u8>,
    pub refuse_connect: bool,
    pub write_budget: Option<usize>,
    pub connects: u32,
    pub closes: u32,
}

impl ScriptedTransport {
    pub fn answering(response: &str) -> Self {
        Self {
            response: response.as_bytes().to_vec(),
            cursor: 0,
            written: Vec::new(),
            refuse_connect: false,
            write_budget: None,
            connects: 0,
            closes: 0,
        }
    }

    pub fn ok() -> Self {
        Self::answering("HTTP/1.1 200 OK\r\nContent-Type: application/json\r\n\r\n{\"ok\":true,\"result\":{}}")
    }
}

impl Transport for ScriptedTransport {
    fn connect(&mut self, _endpoint: &Endpoint<'_>) -> Result<(), TransportError> {
        self.connects += 1;
        if self.refuse_connect {
            return Err(TransportError::Connect);
        }
        self.cursor = 0;
        Ok(())
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, TransportError> {
        if let Some(budget) = self.write_budget {
            if self.written.len() >= budget {
                return Err(TransportError::Io);
            }
            let n = data.len().min(budget - self.written.len());
            self.written.extend_from_slice(&data[..n]);
            return Ok(n);
        }
        self.written.extend_from_slice(data);
        Ok(data.len())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        let rest = &self.response[self.cursor..];
        if rest.is_empty() {
            return Err(TransportError::Closed);
        }
        let n = rest.len().min(buf.len());
        buf[..n].copy_from_slice(&rest[..n]);
        self.cursor += n;
        Ok(n)
    }

    fn close(&mut self) {
        self.closes += 1;
    }
}

/// Always-up link for pairing with a real client in an `Uplink`.
pub struct UpLink;

impl LinkPort for UpLink {
    fn is_connected(&self) -> bool {
        true
    }

    fn rssi(&self) -> Option<i8> {
        Some(-60)
    }

    fn local_ip(&self) -> Option<Ipv4Addr> {
        Some(Ipv4Addr::new(10, 0, 0, 7))
    }
}
