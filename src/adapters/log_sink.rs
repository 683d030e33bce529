//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the ESP-IDF logger (UART in production, stderr in simulation).  Each
//! line starts with a fixed tag so the console can be grepped.

use log::{info, warn};

use crate::app::events::{AppEvent, CaptureOutcome};
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Debug, Default)]
pub struct LogEventSink {
    emitted: u32,
}

impl LogEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events logged so far.
    pub fn emitted(&self) -> u32 {
        self.emitted
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        self.emitted = self.emitted.wrapping_add(1);
        match event {
            AppEvent::Started {
                reset_reason,
                settings,
            } => {
                info!(
                    "START | reset={} | mode={} interval={}min motion={} threshold={} | \
                     captured={} sent={} pan={:?}",
                    reset_reason,
                    settings.capture_mode.label(),
                    settings.interval_minutes,
                    settings.motion_enabled,
                    settings.motion_threshold,
                    settings.captured_count,
                    settings.sent_count,
                    settings.pan_angle,
                );
            }
            AppEvent::MotionDetected { delta } => {
                info!("MOTION | delta={} bytes", delta);
            }
            AppEvent::Capture { kind, outcome } => match outcome {
                CaptureOutcome::Sent { bytes } => {
                    info!("CAPTURE | {} | sent {} bytes", kind.label(), bytes);
                }
                CaptureOutcome::NoFrame => {
                    warn!("CAPTURE | {} | no frame", kind.label());
                }
                CaptureOutcome::UploadFailed { bytes, error } => {
                    warn!(
                        "CAPTURE | {} | {} bytes, upload failed: {}",
                        kind.label(),
                        bytes,
                        error
                    );
                }
            },
            AppEvent::CommandReceived { sequence, name } => {
                info!("COMMAND | #{} /{}", sequence, name);
            }
            AppEvent::Rejected(reason) => {
                warn!("REJECT | {}", reason);
            }
            AppEvent::SettingsChanged(s) => {
                info!(
                    "SETTINGS | mode={} interval={}min motion={} threshold={} pan={:?} (pending save)",
                    s.capture_mode.label(),
                    s.interval_minutes,
                    s.motion_enabled,
                    s.motion_threshold,
                    s.pan_angle,
                );
            }
            AppEvent::SettingsPersisted => {
                info!("SETTINGS | persisted");
            }
            AppEvent::PanMoved(angle) => {
                info!("PAN | {}\u{00b0}", angle);
            }
            AppEvent::PollFailed(e) => {
                warn!("POLL | failed: {}", e);
            }
            AppEvent::RestartRequested => {
                warn!("RESTART | requested");
            }
            AppEvent::RestartIgnored => {
                info!("RESTART | ignored (debounce)");
            }
        }
    }
}
