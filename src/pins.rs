//! GPIO / peripheral pin assignments for the AI-Thinker ESP32-CAM board.
//!
//! Single source of truth: every driver references this module rather than
//! hard-coding pin numbers.  `-1` means "not connected" to the camera
//! driver.

// ---------------------------------------------------------------------------
// OV2640 camera (DVP parallel bus + SCCB)
// ---------------------------------------------------------------------------

pub const CAM_PWDN_GPIO: i32 = 32;
pub const CAM_RESET_GPIO: i32 = -1;
pub const CAM_XCLK_GPIO: i32 = 0;
pub const CAM_SIOD_GPIO: i32 = 26;
pub const CAM_SIOC_GPIO: i32 = 27;

/// Data lines D0..D7 (Y2..Y9 on the schematic).
pub const CAM_DATA_GPIO: [i32; 8] = [5, 18, 19, 21, 36, 39, 34, 35];

pub const CAM_VSYNC_GPIO: i32 = 25;
pub const CAM_HREF_GPIO: i32 = 23;
pub const CAM_PCLK_GPIO: i32 = 22;

/// Sensor master clock.
pub const CAM_XCLK_FREQ_HZ: i32 = 20_000_000;

// ---------------------------------------------------------------------------
// Pan servo (LEDC PWM)
// ---------------------------------------------------------------------------

/// Signal line of the pan servo.  The camera driver owns LEDC timer 0 /
/// channel 0 for XCLK, so the servo uses timer 1 / channel 2.
pub const SERVO_PAN_GPIO: i32 = 14;

/// Standard hobby-servo frame rate.
pub const SERVO_PWM_FREQ_HZ: u32 = 50;
/// Pulse width at 0 degrees.
pub const SERVO_MIN_PULSE_US: u32 = 500;
/// Pulse width at 180 degrees.
pub const SERVO_MAX_PULSE_US: u32 = 2500;
