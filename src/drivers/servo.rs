//! Pan servo driver (hobby servo on LEDC PWM).
//!
//! Maps 0–180 degrees onto a 500–2500 µs pulse in a 50 Hz frame.  The PWM
//! channel is any `embedded_hal::pwm::SetDutyCycle`, which on ESP-IDF is
//! the LEDC driver on timer 1 / channel 2 (timer 0 drives the camera XCLK).
//!
//! ## Dual-target design
//!
//! On host/test [`SimPwm`] records the last duty written.

use embedded_hal::pwm::SetDutyCycle;
use log::{info, warn};

use crate::app::ports::{ServoError, ServoPort};
use crate::pins;

const FRAME_US: u32 = 1_000_000 / pins::SERVO_PWM_FREQ_HZ;

/// Pulse width for an angle, clamped to 0–180 degrees.
pub fn pulse_us(angle: u8) -> u32 {
    let angle = u32::from(angle.min(180));
    let span = pins::SERVO_MAX_PULSE_US - pins::SERVO_MIN_PULSE_US;
    pins::SERVO_MIN_PULSE_US + span * angle / 180
}

/// Duty value for `pulse` µs given the channel's full-scale duty.
pub fn duty_for_pulse(pulse: u32, max_duty: u16) -> u16 {
    let duty = pulse * u32::from(max_duty) / FRAME_US;
    u16::try_from(duty).unwrap_or(max_duty)
}

pub struct ServoDriver<P> {
    pwm: Option<P>,
    last_angle: Option<u8>,
}

impl<P: SetDutyCycle> ServoDriver<P> {
    pub fn new(pwm: P) -> Self {
        info!("Servo: attached (max duty {})", pwm.max_duty_cycle());
        Self {
            pwm: Some(pwm),
            last_angle: None,
        }
    }

    /// A board without a pan servo.
    pub fn absent() -> Self {
        Self {
            pwm: None,
            last_angle: None,
        }
    }

    pub fn last_angle(&self) -> Option<u8> {
        self.last_angle
    }

    pub fn pwm(&self) -> Option<&P> {
        self.pwm.as_ref()
    }
}

impl<P: SetDutyCycle> ServoPort for ServoDriver<P> {
    fn is_fitted(&self) -> bool {
        self.pwm.is_some()
    }

    fn write_angle(&mut self, angle: u8) -> Result<(), ServoError> {
        let pwm = self.pwm.as_mut().ok_or(ServoError::NotFitted)?;
        let duty = duty_for_pulse(pulse_us(angle), pwm.max_duty_cycle());
        pwm.set_duty_cycle(duty).map_err(|_| {
            warn!("Servo: duty write failed ({} deg)", angle);
            ServoError::PwmWriteFailed
        })?;
        self.last_angle = Some(angle.min(180));
        Ok(())
    }
}

// ───────────────────────────────────────────────────────────────
// Host PWM
// ───────────────────────────────────────────────────────────────

/// In-memory PWM channel with 14-bit resolution.
#[derive(Debug, Default)]
pub struct SimPwm {
    pub duty: u16,
    pub writes: u32,
}

impl embedded_hal::pwm::ErrorType for SimPwm {
    type Error = core::convert::Infallible;
}

impl SetDutyCycle for SimPwm {
    fn max_duty_cycle(&self) -> u16 {
        (1 << 14) - 1
    }

    fn set_duty_cycle(&mut self, duty: u16) -> Result<(), Self::Error> {
        self.duty = duty;
        self.writes += 1;
        Ok(())
    }
}
