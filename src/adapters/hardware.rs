//! Hardware adapter: bridges real peripherals to domain port traits.
//!
//! Owns the camera, pan servo, clock and task watchdog and exposes them
//! through [`CameraPort`], [`ServoPort`], [`ClockPort`] and
//! [`SystemPort`] (together: [`Board`](crate::app::ports::Board)).  This
//! is the only module that touches chip-level services; on non-espidf
//! targets the underlying drivers use cfg-gated simulation stubs.

use embedded_hal::pwm::SetDutyCycle;
use log::warn;

use crate::adapters::time::Esp32TimeAdapter;
use crate::app::ports::{CameraPort, ClockPort, ServoError, ServoPort, SystemPort};
use crate::diagnostics::{Diagnostics, ResetReason};
use crate::drivers::camera::{CameraDriver, Frame};
use crate::drivers::servo::ServoDriver;
use crate::drivers::watchdog::Watchdog;

/// Concrete adapter that combines all on-board hardware behind port traits.
pub struct BoardAdapter<P> {
    camera: CameraDriver,
    servo: ServoDriver<P>,
    clock: Esp32TimeAdapter,
    watchdog: Watchdog,
    reset_reason: ResetReason,
    restarts: u32,
}

impl<P: SetDutyCycle> BoardAdapter<P> {
    pub fn new(
        camera: CameraDriver,
        servo: ServoDriver<P>,
        clock: Esp32TimeAdapter,
        watchdog: Watchdog,
    ) -> Self {
        Self {
            camera,
            servo,
            clock,
            watchdog,
            reset_reason: ResetReason::current(),
            restarts: 0,
        }
    }

    pub fn camera(&self) -> &CameraDriver {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut CameraDriver {
        &mut self.camera
    }

    pub fn servo(&self) -> &ServoDriver<P> {
        &self.servo
    }

    pub fn watchdog(&self) -> &Watchdog {
        &self.watchdog
    }

    /// Restart requests seen (simulation keeps running after each).
    pub fn restarts(&self) -> u32 {
        self.restarts
    }
}

// ── CameraPort ────────────────────────────────────────────────

impl<P> CameraPort for BoardAdapter<P> {
    type Frame = Frame;

    fn acquire_frame(&mut self) -> Option<Frame> {
        self.camera.acquire_frame()
    }

    fn release_frame(&mut self, frame: Frame) {
        self.camera.release_frame(frame);
    }
}

// ── ServoPort ─────────────────────────────────────────────────

impl<P: SetDutyCycle> ServoPort for BoardAdapter<P> {
    fn is_fitted(&self) -> bool {
        self.servo.is_fitted()
    }

    fn write_angle(&mut self, angle: u8) -> Result<(), ServoError> {
        self.servo.write_angle(angle)
    }
}

// ── ClockPort ─────────────────────────────────────────────────

impl<P> ClockPort for BoardAdapter<P> {
    fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    fn delay_ms(&mut self, ms: u32) {
        self.clock.delay_ms(ms);
    }
}

// ── SystemPort ────────────────────────────────────────────────

impl<P> SystemPort for BoardAdapter<P> {
    fn diagnostics(&self) -> Diagnostics {
        Diagnostics::collect(self.clock.now_ms(), None, self.reset_reason)
    }

    fn reset_reason(&self) -> ResetReason {
        self.reset_reason
    }

    fn restart(&mut self) {
        self.restarts += 1;
        warn!("Board: restarting");
        #[cfg(target_os = "espidf")]
        esp_idf_svc::hal::reset::restart();
    }

    fn feed_watchdog(&mut self) {
        self.watchdog.feed();
    }
}
