//! Pan servo position controller.
//!
//! Tracks the commanded angle (hobby servos have no position feedback),
//! clamps every request into [`PanLimits`], and either jumps straight to
//! the target or ramps one degree per step with a fixed inter-step delay.

use log::{debug, warn};

use crate::app::ports::{ClockPort, ServoPort};
use crate::config::FirmwareConfig;

/// Upper bound on ramp iterations, independent of the requested travel.
pub const MAX_RAMP_STEPS: u32 = 256;

/// Mechanical range of the pan axis in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PanLimits {
    pub min: u8,
    pub max: u8,
    pub center: u8,
}

impl Default for PanLimits {
    fn default() -> Self {
        Self {
            min: 10,
            max: 170,
            center: 90,
        }
    }
}

impl PanLimits {
    pub fn clamp(&self, angle: i32) -> u8 {
        angle.clamp(i32::from(self.min), i32::from(self.max)) as u8
    }
}

/// How to get to the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Movement {
    Jump,
    Smooth,
}

/// Commanded position plus motion parameters.
#[derive(Debug, Clone)]
pub struct PanController {
    limits: PanLimits,
    position: u8,
    step_delay_ms: u32,
    nudge_deg: u8,
}

impl PanController {
    pub fn new(limits: PanLimits, position: u8, step_delay_ms: u32, nudge_deg: u8) -> Self {
        Self {
            position: limits.clamp(i32::from(position)),
            limits,
            step_delay_ms,
            nudge_deg,
        }
    }

    /// Build from config, starting at `position` (or center).
    pub fn from_config(config: &FirmwareConfig, position: Option<u8>) -> Self {
        let limits = PanLimits {
            min: config.pan_min,
            max: config.pan_max,
            center: config.pan_center,
        };
        Self::new(
            limits,
            position.unwrap_or(limits.center),
            config.pan_step_delay_ms,
            config.pan_nudge_deg,
        )
    }

    pub fn position(&self) -> u8 {
        self.position
    }

    pub fn limits(&self) -> PanLimits {
        self.limits
    }

    pub fn nudge_deg(&self) -> u8 {
        self.nudge_deg
    }

    /// Drive the servo to the recorded position once at boot.
    pub fn attach(&mut self, servo: &mut impl ServoPort) {
        if let Err(e) = servo.write_angle(self.position) {
            warn!("PanController: initial write to {}° failed: {}", self.position, e);
        }
    }

    /// Move to `angle` (clamped).  Returns the new commanded position.
    pub fn set_target(
        &mut self,
        angle: i32,
        movement: Movement,
        hw: &mut (impl ServoPort + ClockPort),
    ) -> u8 {
        let target = self.limits.clamp(angle);

        match movement {
            Movement::Jump => {
                if let Err(e) = hw.write_angle(target) {
                    warn!("PanController: write {}° failed: {}", target, e);
                }
            }
            Movement::Smooth => self.ramp(target, hw),
        }

        debug!("PanController: {}° → {}°", self.position, target);
        self.position = target;
        target
    }

    /// Return to center.
    pub fn center(&mut self, movement: Movement, hw: &mut (impl ServoPort + ClockPort)) -> u8 {
        self.set_target(i32::from(self.limits.center), movement, hw)
    }

    /// Move by `delta` degrees relative to the current position.
    pub fn nudge(&mut self, delta: i32, hw: &mut (impl ServoPort + ClockPort)) -> u8 {
        self.set_target(i32::from(self.position) + delta, Movement::Smooth, hw)
    }

    /// Stops across the full range, `step` degrees apart, always ending at `max`.
    pub fn sweep_stops(&self, step: u8) -> Vec<u8> {
        let step = step.max(1);
        let mut stops: Vec<u8> = (self.limits.min..=self.limits.max)
            .step_by(usize::from(step))
            .collect();
        if stops.last() != Some(&self.limits.max) {
            stops.push(self.limits.max);
        }
        stops
    }

    fn ramp(&mut self, target: u8, hw: &mut (impl ServoPort + ClockPort)) {
        let mut at = self.position;
        let mut steps = 0;
        while at != target && steps < MAX_RAMP_STEPS {
            at = if at < target { at + 1 } else { at - 1 };
            if let Err(e) = hw.write_angle(at) {
                warn!("PanController: ramp write {}° failed: {}", at, e);
                return;
            }
            hw.delay_ms(self.step_delay_ms);
            steps += 1;
        }
    }
}
