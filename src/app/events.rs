//! Outbound application events and capture telemetry.
//!
//! The [`CameraService`](super::service::CameraService) emits [`AppEvent`]s
//! through the [`EventSink`](super::ports::EventSink) port.  Adapters on the
//! other side decide what to do with them; the firmware only logs them.
//!
//! [`CaptureTelemetry`] is the small, non-persisted "what happened last"
//! record shown by `/settings` and the local status page.

use heapless::String as HString;

use crate::config::{DeviceSettings, Rejection, truncated};
use crate::diagnostics::ResetReason;

use super::ports::MessagingError;

/// What triggered a capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureKind {
    Motion,
    Timer,
    /// Remote `/capture` command.
    Remote,
    /// Local status page "capture now".
    Local,
    /// One stop of a `/sweep`.
    Sweep,
    /// `/test` photo; does not count.
    Test,
}

impl CaptureKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Motion => "Motion",
            Self::Timer => "Timer",
            Self::Remote => "Telegram Command",
            Self::Local => "Manual",
            Self::Sweep => "Sweep",
            Self::Test => "Test",
        }
    }

    /// Whether the capture and upload counters move for this kind.
    pub fn counts(self) -> bool {
        self != Self::Test
    }
}

/// Result of one capture/upload attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// Frame uploaded and acknowledged.
    Sent { bytes: usize },
    /// The camera had no frame; counters untouched.
    NoFrame,
    /// Frame captured but the upload failed.
    UploadFailed { bytes: usize, error: MessagingError },
}

impl CaptureOutcome {
    pub fn is_sent(self) -> bool {
        matches!(self, Self::Sent { .. })
    }
}

/// Structured events emitted by the application core.
#[derive(Debug, Clone)]
pub enum AppEvent {
    /// The service finished boot (carries the loaded settings).
    Started {
        reset_reason: ResetReason,
        settings: DeviceSettings,
    },

    /// A motion check found motion.
    MotionDetected { delta: usize },

    /// A capture attempt finished.
    Capture {
        kind: CaptureKind,
        outcome: CaptureOutcome,
    },

    /// A remote command was taken from the channel.
    CommandReceived { sequence: u64, name: &'static str },

    /// A command or settings request failed validation.
    Rejected(Rejection),

    /// Settings were changed in RAM.
    SettingsChanged(DeviceSettings),

    /// The settings record reached flash.
    SettingsPersisted,

    /// The pan servo was commanded to a new angle.
    PanMoved(u8),

    /// Polling the command channel failed.
    PollFailed(MessagingError),

    /// A restart request was accepted and the chip is about to reset.
    RestartRequested,

    /// A restart request arrived inside the debounce window.
    RestartIgnored,
}

/// Last-attempt telemetry.  Overwritten on every attempt; no history.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaptureTelemetry {
    pub last_capture_time: HString<24>,
    pub last_capture_kind: HString<20>,
    pub last_upload_result: HString<48>,
    pub debug: HString<96>,
}

impl CaptureTelemetry {
    pub fn new() -> Self {
        let mut t = Self::default();
        t.set_upload_result("Not sent yet");
        t.set_debug("Ready");
        t
    }

    pub fn record_capture(&mut self, time: &str, kind: CaptureKind) {
        self.last_capture_time = truncated(time);
        self.last_capture_kind = truncated(kind.label());
    }

    pub fn set_upload_result(&mut self, text: &str) {
        self.last_upload_result = truncated(text);
    }

    pub fn set_debug(&mut self, text: &str) {
        self.debug = truncated(text);
    }
}
