//! Capture scheduling.
//!
//! Decides, once per main-loop tick, whether a motion check and/or a timer
//! capture is due.  Purely time arithmetic over `now_ms`; the service does
//! the actual work.
//!
//! ```text
//!   now_ms ──▶ CapturePlanner::plan(settings)
//!                │
//!                ├─ check_motion: mode ∈ {Motion, Mixed} ∧ enabled
//!                │                ∧ motion cadence elapsed
//!                │                ∧ outside motion cooldown
//!                │
//!                └─ timer_due:    mode ∈ {Timer, Mixed}
//!                                 ∧ interval elapsed since last capture
//! ```
//!
//! At most one capture runs per tick; a motion capture wins over a due
//! timer, and since any capture resets the timer the timer simply waits
//! another interval.

use crate::app::events::CaptureKind;
use crate::config::{DeviceSettings, FirmwareConfig};

// ═══════════════════════════════════════════════════════════════
//  Cadence
// ═══════════════════════════════════════════════════════════════

/// Fixed-interval gate.  Fires immediately the first time.
#[derive(Debug, Clone, Copy)]
pub struct Cadence {
    interval_ms: u64,
    last_ms: Option<u64>,
}

impl Cadence {
    pub fn new(interval_ms: u32) -> Self {
        Self {
            interval_ms: u64::from(interval_ms),
            last_ms: None,
        }
    }

    pub fn is_due(&self, now_ms: u64) -> bool {
        self.last_ms
            .is_none_or(|last| now_ms.saturating_sub(last) >= self.interval_ms)
    }

    /// If due, consume the slot and return `true`.
    pub fn fire(&mut self, now_ms: u64) -> bool {
        if self.is_due(now_ms) {
            self.last_ms = Some(now_ms);
            true
        } else {
            false
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Capture planner
// ═══════════════════════════════════════════════════════════════

/// What the current tick should do.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CapturePlan {
    pub check_motion: bool,
    pub timer_due: bool,
}

/// Tracks capture history for trigger decisions.
#[derive(Debug, Clone)]
pub struct CapturePlanner {
    motion_check: Cadence,
    motion_cooldown_ms: u64,
    last_capture_ms: u64,
    last_motion_capture_ms: Option<u64>,
}

impl CapturePlanner {
    /// `boot_ms` anchors the first timer capture one interval later.
    pub fn new(config: &FirmwareConfig, boot_ms: u64) -> Self {
        Self {
            motion_check: Cadence::new(config.motion_check_interval_ms),
            motion_cooldown_ms: u64::from(config.motion_cooldown_ms),
            last_capture_ms: boot_ms,
            last_motion_capture_ms: None,
        }
    }

    pub fn plan(&mut self, now_ms: u64, settings: &DeviceSettings) -> CapturePlan {
        let mode = settings.capture_mode;

        let cooling = self
            .last_motion_capture_ms
            .is_some_and(|t| now_ms.saturating_sub(t) < self.motion_cooldown_ms);
        let check_motion = mode.uses_motion()
            && settings.motion_enabled
            && !cooling
            && self.motion_check.fire(now_ms);

        let interval_ms = u64::from(settings.interval_minutes) * 60_000;
        let timer_due =
            mode.uses_timer() && now_ms.saturating_sub(self.last_capture_ms) >= interval_ms;

        CapturePlan {
            check_motion,
            timer_due,
        }
    }

    /// Record a capture attempt of any kind.
    pub fn record_capture(&mut self, now_ms: u64, kind: CaptureKind) {
        self.last_capture_ms = now_ms;
        if kind == CaptureKind::Motion {
            self.last_motion_capture_ms = Some(now_ms);
        }
    }

    pub fn last_capture_ms(&self) -> u64 {
        self.last_capture_ms
    }
}
