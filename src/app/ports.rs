//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ CameraService (domain)
//! ```
//!
//! Driven adapters (camera, servo, Wi-Fi, NVS, Telegram) implement these
//! traits.  The [`CameraService`](super::service::CameraService) consumes
//! them via generics at each call site, so the domain core never touches
//! hardware or sockets directly and is testable with mocks.
//!
//! ## Pairing rule
//!
//! Every frame obtained from [`CameraPort::acquire_frame`] must go back
//! through [`CameraPort::release_frame`], including on every error path.
//! Domain code never calls the pair by hand; it holds a [`FrameLease`]
//! whose `Drop` performs the release.

use core::fmt;
use core::net::Ipv4Addr;

use crate::config::{Rejection, SettingsUpdate};
use crate::diagnostics::{Diagnostics, ResetReason};

use super::events::AppEvent;
use super::report::StatusReport;

// ───────────────────────────────────────────────────────────────
// Network link (driven adapter: Wi-Fi station)
// ───────────────────────────────────────────────────────────────

/// Read-side view of the network link.  Every network-dependent
/// operation in the core is a no-op while `is_connected()` is false.
pub trait LinkPort {
    fn is_connected(&self) -> bool;

    /// Signal strength of the associated AP in dBm, if connected.
    fn rssi(&self) -> Option<i8>;

    /// Station IPv4 address, if assigned.
    fn local_ip(&self) -> Option<Ipv4Addr>;
}

// ───────────────────────────────────────────────────────────────
// Camera sensor (driven adapter: esp32-camera frame buffers)
// ───────────────────────────────────────────────────────────────

/// Frame acquisition from the image sensor.
pub trait CameraPort {
    /// One encoded (JPEG) frame buffer borrowed from the driver.
    type Frame: AsRef<[u8]>;

    /// Grab the next frame.  `None` when the driver has no frame available.
    fn acquire_frame(&mut self) -> Option<Self::Frame>;

    /// Hand a frame buffer back to the driver.
    fn release_frame(&mut self, frame: Self::Frame);
}

/// Scoped ownership of one camera frame.
///
/// The frame is released when the lease is dropped, so an early return
/// anywhere in the capture pipeline cannot leak a driver buffer.
pub struct FrameLease<'a, C: CameraPort + ?Sized> {
    camera: &'a mut C,
    frame: Option<C::Frame>,
}

impl<'a, C: CameraPort + ?Sized> FrameLease<'a, C> {
    /// Acquire a frame from `camera`.  Returns `None` if the driver had none.
    pub fn acquire(camera: &'a mut C) -> Option<Self> {
        let frame = camera.acquire_frame()?;
        Some(Self {
            camera,
            frame: Some(frame),
        })
    }

    /// Encoded frame bytes.
    pub fn bytes(&self) -> &[u8] {
        self.frame.as_ref().map_or(&[], AsRef::as_ref)
    }

    pub fn len(&self) -> usize {
        self.bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes().is_empty()
    }
}

impl<C: CameraPort + ?Sized> Drop for FrameLease<'_, C> {
    fn drop(&mut self) {
        if let Some(frame) = self.frame.take() {
            self.camera.release_frame(frame);
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Pan servo (driven adapter: LEDC PWM)
// ───────────────────────────────────────────────────────────────

/// Single-axis pan servo output.
pub trait ServoPort {
    /// Whether this board has a pan servo at all.
    fn is_fitted(&self) -> bool;

    /// Command the servo to an absolute angle in degrees (0–180).
    fn write_angle(&mut self, angle: u8) -> Result<(), ServoError>;
}

// ───────────────────────────────────────────────────────────────
// Clock + system services
// ───────────────────────────────────────────────────────────────

/// Monotonic time and blocking delays.
pub trait ClockPort {
    /// Milliseconds since boot (monotonic).
    fn now_ms(&self) -> u64;

    /// Block the control thread for `ms` milliseconds.
    fn delay_ms(&mut self, ms: u32);
}

/// Chip-level services: diagnostics, restart and the task watchdog.
pub trait SystemPort {
    /// Heap / PSRAM / reset-reason snapshot.
    fn diagnostics(&self) -> Diagnostics;

    /// Why the chip last reset.
    fn reset_reason(&self) -> ResetReason;

    /// Restart the chip.  Does not return on hardware; simulations record
    /// the request and return.
    fn restart(&mut self);

    /// Tell the task watchdog the control loop is alive.
    fn feed_watchdog(&mut self);
}

/// Everything on the board the capture loop drives directly.
///
/// Mirrors a single `HardwareAdapter` owning all peripherals, which avoids
/// handing several mutable borrows of the same board into one call.
pub trait Board: CameraPort + ServoPort + ClockPort + SystemPort {}

impl<T: CameraPort + ServoPort + ClockPort + SystemPort> Board for T {}

// ───────────────────────────────────────────────────────────────
// Storage port (driven adapter: NVS)
// ───────────────────────────────────────────────────────────────

/// Flat record storage used by both the settings store and the command
/// offset store.
///
/// Writes MUST be atomic per record (no torn record on power loss).  The
/// ESP-IDF NVS API guarantees this per `nvs_commit()`.
pub trait StoragePort {
    /// Read a record into `buf`.  Returns the number of bytes copied.
    fn read(&self, key: &str, buf: &mut [u8]) -> Result<usize, StorageError>;

    /// Overwrite a record.
    fn write(&mut self, key: &str, data: &[u8]) -> Result<(), StorageError>;
}

// ───────────────────────────────────────────────────────────────
// Messaging port (driven adapter: Telegram Bot API)
// ───────────────────────────────────────────────────────────────

/// One pending remote update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Monotonically increasing update identifier.
    pub sequence: u64,
    /// Message text, if the update carried any.
    pub text: Option<String>,
    /// Username or first name of the sender, if known.
    pub sender: Option<String>,
}

/// Remote messaging endpoint.  All replies go to the configured chat.
pub trait MessagingPort {
    /// Send a plain text message.
    fn send_text(&mut self, text: &str) -> Result<(), MessagingError>;

    /// Upload a JPEG with a caption.  Implementations must stream `jpeg`
    /// rather than copy it into a request body.
    fn send_photo(&mut self, caption: &str, jpeg: &[u8]) -> Result<(), MessagingError>;

    /// Fetch at most one update with sequence strictly greater than `after`.
    fn poll_one(&mut self, after: u64) -> Result<Option<InboundMessage>, MessagingError>;
}

/// Link state plus messaging, as owned by one network adapter.
pub trait Network: LinkPort + MessagingPort {}

impl<T: LinkPort + MessagingPort> Network for T {}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`]s through this port.
pub trait EventSink {
    fn emit(&mut self, event: &AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Local status capability (driving adapter: HTTP status server)
// ───────────────────────────────────────────────────────────────

/// What the local status server may do with the core: read state and
/// submit settings changes through the same validation as remote commands.
pub trait StatusProvider {
    fn status(&self) -> StatusReport;

    fn debug(&self) -> Diagnostics;

    fn update_settings(&mut self, update: &SettingsUpdate) -> Result<(), Rejection>;

    /// A copy of one fresh JPEG frame, or `None` if the camera had none.
    fn snapshot(&mut self) -> Option<Vec<u8>>;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`StoragePort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Requested key does not exist.
    NotFound,
    /// Storage partition is full.
    Full,
    /// Generic I/O error.
    IoError,
}

/// Errors from [`MessagingPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessagingError {
    /// The network link is down; nothing was attempted.
    LinkDown,
    /// TCP/TLS connect to the API host failed.
    Connect,
    /// The transport accepted zero bytes or failed mid-request.
    Write,
    /// No complete response before the deadline.
    Timeout,
    /// The API answered with a non-200 status.
    Http(u16),
    /// HTTP 200 but the body lacked `"ok":true`.
    NotAcknowledged,
    /// The response could not be parsed.
    Malformed,
}

/// Errors from [`CameraPort`] bring-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraError {
    /// `esp_camera_init` returned the given error code.
    InitFailed(i32),
}

/// Errors from [`ServoPort`] writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServoError {
    /// No servo fitted on this board.
    NotFitted,
    /// The PWM duty write failed.
    PwmWriteFailed,
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "key not found"),
            Self::Full => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl fmt::Display for MessagingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LinkDown => write!(f, "WiFi not connected"),
            Self::Connect => write!(f, "TLS connect failed"),
            Self::Write => write!(f, "write failed"),
            Self::Timeout => write!(f, "response timeout"),
            Self::Http(code) => write!(f, "HTTP status {}", code),
            Self::NotAcknowledged => write!(f, "API did not acknowledge"),
            Self::Malformed => write!(f, "malformed response"),
        }
    }
}

impl fmt::Display for CameraError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InitFailed(code) => write!(f, "esp_camera_init failed: 0x{:x}", code),
        }
    }
}

impl fmt::Display for ServoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFitted => write!(f, "no pan servo fitted"),
            Self::PwmWriteFailed => write!(f, "PWM write failed"),
        }
    }
}
