//! Motion detection by encoded-size delta.
//!
//! A JPEG's size tracks scene complexity, so a large jump between two
//! frames' encoded sizes is a cheap motion signal that needs no decoding.
//! The detector keeps one baseline frame and compares lengths only.
//!
//! The baseline is replaced only when motion is reported; small drifts
//! accumulate against the same reference until they cross the threshold.
//!
//! Baseline storage is bounded by a byte limit.  A baseline that would
//! exceed it is treated like a failed allocation: the old baseline stays
//! and the frame is reported as [`MotionVerdict::AllocFailed`].

use log::warn;

/// Outcome of one [`MotionDetector::observe`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionVerdict {
    /// First frame after boot or reset; stored as the baseline.
    Baseline,
    NoMotion { delta: usize },
    Motion { delta: usize },
    /// Motion was seen but the new baseline could not be stored.
    /// The old baseline is kept unchanged and no capture is triggered.
    AllocFailed { delta: usize },
}

impl MotionVerdict {
    pub fn is_motion(self) -> bool {
        matches!(self, Self::Motion { .. })
    }
}

/// Holds the baseline frame.
#[derive(Debug)]
pub struct MotionDetector {
    baseline: Option<Vec<u8>>,
    limit: usize,
}

impl Default for MotionDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl MotionDetector {
    pub fn new() -> Self {
        Self::with_baseline_limit(usize::MAX)
    }

    /// A detector that never holds a baseline longer than `limit` bytes.
    pub fn with_baseline_limit(limit: usize) -> Self {
        Self {
            baseline: None,
            limit,
        }
    }

    /// Make room for `len` bytes in `buf`, within the limit.
    fn reserve(&self, buf: &mut Vec<u8>, len: usize) -> bool {
        len <= self.limit && buf.try_reserve_exact(len.saturating_sub(buf.len())).is_ok()
    }

    /// Compare `frame` to the baseline using `threshold` bytes.
    pub fn observe(&mut self, frame: &[u8], threshold: u16) -> MotionVerdict {
        let Some(mut baseline) = self.baseline.take() else {
            let mut first = Vec::new();
            if !self.reserve(&mut first, frame.len()) {
                warn!("MotionDetector: cannot allocate {} byte baseline", frame.len());
                return MotionVerdict::Baseline;
            }
            first.extend_from_slice(frame);
            self.baseline = Some(first);
            return MotionVerdict::Baseline;
        };

        let delta = frame.len().abs_diff(baseline.len());
        let verdict = if delta <= usize::from(threshold) {
            MotionVerdict::NoMotion { delta }
        } else if !self.reserve(&mut baseline, frame.len()) {
            warn!(
                "MotionDetector: cannot grow baseline to {} bytes, keeping old one",
                frame.len()
            );
            MotionVerdict::AllocFailed { delta }
        } else {
            baseline.clear();
            baseline.extend_from_slice(frame);
            MotionVerdict::Motion { delta }
        };
        self.baseline = Some(baseline);
        verdict
    }

    /// Drop the baseline; the next frame starts a fresh comparison.
    pub fn reset(&mut self) {
        self.baseline = None;
    }

    pub fn baseline_len(&self) -> Option<usize> {
        self.baseline.as_ref().map(Vec::len)
    }
}
