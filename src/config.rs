//! System configuration parameters
//!
//! Two layers live here:
//!
//! * [`FirmwareConfig`]: build-time / boot-time tunables (credentials,
//!   timings, pan geometry).  Never changed at runtime.
//! * [`DeviceSettings`]: the user-tunable, persisted settings.  Only ever
//!   mutated through [`DeviceSettings::apply`], which validates a whole
//!   [`SettingsUpdate`] before touching any field.

use core::fmt;

use heapless::String as HString;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Setting domains
// ---------------------------------------------------------------------------

pub const INTERVAL_MIN: u16 = 1;
pub const INTERVAL_MAX: u16 = 1000;
pub const THRESHOLD_MIN: u16 = 1000;
pub const THRESHOLD_MAX: u16 = 20_000;

pub const DEFAULT_INTERVAL_MIN: u16 = 5;
pub const DEFAULT_THRESHOLD: u16 = 5000;

// Credentials are baked in at build time; empty when unset.
const WIFI_SSID: &str = match option_env!("CAMWATCH_WIFI_SSID") {
    Some(v) => v,
    None => "",
};
const WIFI_PASS: &str = match option_env!("CAMWATCH_WIFI_PASS") {
    Some(v) => v,
    None => "",
};
const BOT_TOKEN: &str = match option_env!("CAMWATCH_BOT_TOKEN") {
    Some(v) => v,
    None => "",
};
const CHAT_ID: &str = match option_env!("CAMWATCH_CHAT_ID") {
    Some(v) => v,
    None => "",
};

// ---------------------------------------------------------------------------
// Capture mode
// ---------------------------------------------------------------------------

/// Which triggers may start a capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CaptureMode {
    #[default]
    Motion,
    Timer,
    Mixed,
}

impl CaptureMode {
    /// Decode the wire value (0/1/2).  Anything else is `None`.
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::Motion),
            1 => Some(Self::Timer),
            2 => Some(Self::Mixed),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            Self::Motion => 0,
            Self::Timer => 1,
            Self::Mixed => 2,
        }
    }

    /// Short label used in replies.
    pub fn label(self) -> &'static str {
        match self {
            Self::Motion => "Motion",
            Self::Timer => "Time",
            Self::Mixed => "Mixed",
        }
    }

    /// Long label used by the local status page.
    pub fn description(self) -> &'static str {
        match self {
            Self::Motion => "Motion Detection",
            Self::Timer => "Time Based",
            Self::Mixed => "Mixed Mode",
        }
    }

    pub fn uses_motion(self) -> bool {
        matches!(self, Self::Motion | Self::Mixed)
    }

    pub fn uses_timer(self) -> bool {
        matches!(self, Self::Timer | Self::Mixed)
    }
}

// ---------------------------------------------------------------------------
// Persisted user settings
// ---------------------------------------------------------------------------

/// User-tunable settings plus the persisted counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSettings {
    pub capture_mode: CaptureMode,
    /// Minutes between timer captures.
    pub interval_minutes: u16,
    pub motion_enabled: bool,
    /// Encoded-size delta (bytes) that counts as motion.
    pub motion_threshold: u16,
    pub captured_count: u32,
    pub sent_count: u32,
    /// Current pan angle; `None` on boards without a pan servo.
    pub pan_angle: Option<u8>,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            capture_mode: CaptureMode::Motion,
            interval_minutes: DEFAULT_INTERVAL_MIN,
            motion_enabled: true,
            motion_threshold: DEFAULT_THRESHOLD,
            captured_count: 0,
            sent_count: 0,
            pan_angle: None,
        }
    }
}

impl DeviceSettings {
    /// Defaults for a board described by `config`.
    pub fn defaults_for(config: &FirmwareConfig) -> Self {
        Self {
            pan_angle: config.servo_fitted.then_some(config.pan_center),
            ..Self::default()
        }
    }

    /// Validate every field of `update`, then apply all of them.
    ///
    /// Returns `Ok(true)` if anything changed.  On `Err` nothing is modified.
    pub fn apply(&mut self, update: &SettingsUpdate) -> Result<bool, Rejection> {
        let mode = update
            .capture_mode
            .map(|v| {
                u8::try_from(v)
                    .ok()
                    .and_then(CaptureMode::from_u8)
                    .ok_or(Rejection::OutOfRange(Field::Mode))
            })
            .transpose()?;
        let interval = update
            .interval_minutes
            .map(|v| in_range(v, INTERVAL_MIN, INTERVAL_MAX, Field::Interval))
            .transpose()?;
        let threshold = update
            .motion_threshold
            .map(|v| in_range(v, THRESHOLD_MIN, THRESHOLD_MAX, Field::Threshold))
            .transpose()?;

        let before = *self;
        if let Some(m) = mode {
            self.capture_mode = m;
        }
        if let Some(i) = interval {
            self.interval_minutes = i;
        }
        if let Some(t) = threshold {
            self.motion_threshold = t;
        }
        if let Some(on) = update.motion_enabled {
            self.motion_enabled = on;
        }
        Ok(*self != before)
    }

    pub fn record_capture(&mut self) {
        self.captured_count = self.captured_count.saturating_add(1);
    }

    pub fn record_sent(&mut self) {
        self.sent_count = self.sent_count.saturating_add(1);
    }
}

fn in_range(v: i64, min: u16, max: u16, field: Field) -> Result<u16, Rejection> {
    if v < i64::from(min) || v > i64::from(max) {
        return Err(Rejection::OutOfRange(field));
    }
    Ok(v as u16)
}

// ---------------------------------------------------------------------------
// Settings mutation request
// ---------------------------------------------------------------------------

/// A requested change to [`DeviceSettings`].  `None` fields are untouched.
///
/// Values are carried wide (`i64`) so out-of-range input is rejected rather
/// than silently wrapped.  Deserialises from the local `/save-settings` body.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsUpdate {
    #[serde(rename = "mode", default)]
    pub capture_mode: Option<i64>,
    #[serde(rename = "interval", default)]
    pub interval_minutes: Option<i64>,
    #[serde(rename = "threshold", default)]
    pub motion_threshold: Option<i64>,
    #[serde(rename = "motion", default)]
    pub motion_enabled: Option<bool>,
}

impl SettingsUpdate {
    pub fn mode(v: i64) -> Self {
        Self {
            capture_mode: Some(v),
            ..Self::default()
        }
    }

    pub fn interval(v: i64) -> Self {
        Self {
            interval_minutes: Some(v),
            ..Self::default()
        }
    }

    pub fn threshold(v: i64) -> Self {
        Self {
            motion_threshold: Some(v),
            ..Self::default()
        }
    }

    pub fn motion(on: bool) -> Self {
        Self {
            motion_enabled: Some(on),
            ..Self::default()
        }
    }
}

/// Which setting a rejection refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Mode,
    Interval,
    Threshold,
    Pan,
}

/// Why a settings or actuator request was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Value outside the field's domain.
    OutOfRange(Field),
    /// Argument absent or not an integer.
    BadArgument(Field),
    /// Pan command on a board without a pan servo.
    NoServo,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfRange(Field::Mode) | Self::BadArgument(Field::Mode) => {
                write!(f, "mode must be 0,1,2\n0=motion 1=time 2=mixed")
            }
            Self::OutOfRange(Field::Interval) | Self::BadArgument(Field::Interval) => {
                write!(f, "interval must be {INTERVAL_MIN}..{INTERVAL_MAX} (minutes)")
            }
            Self::OutOfRange(Field::Threshold) | Self::BadArgument(Field::Threshold) => {
                write!(f, "threshold must be {THRESHOLD_MIN}..{THRESHOLD_MAX}")
            }
            Self::OutOfRange(Field::Pan) | Self::BadArgument(Field::Pan) => {
                write!(f, "usage: /pan N (degrees)")
            }
            Self::NoServo => write!(f, "no pan servo fitted"),
        }
    }
}

// ---------------------------------------------------------------------------
// Firmware configuration
// ---------------------------------------------------------------------------

/// Boot-time configuration for the whole firmware.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FirmwareConfig {
    // --- Credentials ---
    pub wifi_ssid: HString<32>,
    pub wifi_pass: HString<64>,
    pub bot_token: HString<64>,
    /// Destination chat as a numeric id: a user id, or `-100…` for a
    /// channel or group.  `@name` handles are rejected by
    /// [`FirmwareConfig::validate`] because updates carry the numeric id
    /// only.
    pub chat_id: HString<24>,

    // --- Messaging endpoint ---
    pub api_host: HString<32>,
    pub api_port: u16,
    pub connect_timeout_ms: u32,
    /// Socket read/write timeout for each write of an upload.
    pub upload_io_timeout_ms: u32,
    /// Total time allowed for streaming one photo body.
    pub upload_deadline_ms: u32,
    /// Socket timeout for text messages and polls.
    pub poll_io_timeout_ms: u32,
    /// How long to keep draining a response after the request is written.
    pub response_deadline_ms: u32,
    /// Bytes per transport write when streaming a photo.
    pub upload_chunk_size: usize,

    // --- Local status server ---
    pub status_port: u16,

    // --- Motion ---
    /// Largest frame kept as the motion baseline.
    pub motion_baseline_max_bytes: usize,

    // --- Scheduling ---
    pub poll_interval_ms: u32,
    pub motion_check_interval_ms: u32,
    pub motion_cooldown_ms: u32,
    pub persist_cooldown_ms: u32,
    pub restart_debounce_ms: u32,
    pub restart_grace_ms: u32,

    // --- Pan servo ---
    pub servo_fitted: bool,
    pub pan_min: u8,
    pub pan_max: u8,
    pub pan_center: u8,
    pub pan_nudge_deg: u8,
    pub pan_step_delay_ms: u32,
    pub sweep_step_deg: u8,
    pub sweep_settle_ms: u32,
    pub sweep_cooldown_ms: u32,

    // --- Watchdog ---
    pub watchdog_timeout_secs: u32,
}

impl Default for FirmwareConfig {
    fn default() -> Self {
        Self {
            wifi_ssid: truncated(WIFI_SSID),
            wifi_pass: truncated(WIFI_PASS),
            bot_token: truncated(BOT_TOKEN),
            chat_id: truncated(CHAT_ID),

            api_host: truncated("api.telegram.org"),
            api_port: 443,
            connect_timeout_ms: 10_000,
            upload_io_timeout_ms: 10_000,
            upload_deadline_ms: 40_000,
            poll_io_timeout_ms: 5_000,
            response_deadline_ms: 15_000,
            upload_chunk_size: 1024,

            status_port: 80,

            motion_baseline_max_bytes: 256 * 1024,

            poll_interval_ms: 2_000,
            motion_check_interval_ms: 1_000,
            motion_cooldown_ms: 10_000,
            persist_cooldown_ms: 5_000,
            restart_debounce_ms: 30_000,
            restart_grace_ms: 800,

            servo_fitted: true,
            pan_min: 10,
            pan_max: 170,
            pan_center: 90,
            pan_nudge_deg: 5,
            pan_step_delay_ms: 15,
            sweep_step_deg: 10,
            sweep_settle_ms: 350,
            sweep_cooldown_ms: 1_200,

            watchdog_timeout_secs: 90,
        }
    }
}

impl FirmwareConfig {
    /// Check internal consistency.  Called once at boot.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.pan_min > self.pan_max {
            return Err("pan_min above pan_max");
        }
        if self.pan_center < self.pan_min || self.pan_center > self.pan_max {
            return Err("pan_center outside pan range");
        }
        if self.pan_max > 180 {
            return Err("pan_max above 180");
        }
        if self.sweep_step_deg == 0 || self.pan_nudge_deg == 0 {
            return Err("pan step must be non-zero");
        }
        if self.upload_chunk_size == 0 {
            return Err("upload_chunk_size must be non-zero");
        }
        if self.poll_interval_ms == 0 || self.motion_check_interval_ms == 0 {
            return Err("scheduler intervals must be non-zero");
        }
        if !self.chat_id.is_empty() && !is_numeric_chat_id(&self.chat_id) {
            return Err("chat_id must be a numeric id");
        }
        if self.upload_deadline_ms == 0 || self.response_deadline_ms == 0 {
            return Err("deadlines must be non-zero");
        }
        // The watchdog must outlast the longest blocking operation.
        if u64::from(self.watchdog_timeout_secs) * 1000 <= self.worst_case_request_ms() {
            return Err("watchdog shorter than worst-case request");
        }
        Ok(())
    }

    /// Longest a single messaging request can block the control loop.
    ///
    /// An upload is the connect, the head write, the body deadline plus
    /// one write that started just before it, then the response drain.
    /// A poll or text message is the connect, one write, and the drain.
    pub fn worst_case_request_ms(&self) -> u64 {
        let connect = u64::from(self.connect_timeout_ms);
        let drain = u64::from(self.response_deadline_ms);
        let upload = connect
            + 2 * u64::from(self.upload_io_timeout_ms)
            + u64::from(self.upload_deadline_ms)
            + drain;
        let poll = connect + u64::from(self.poll_io_timeout_ms) + drain;
        upload.max(poll)
    }

    /// Whether messaging credentials were provided at build time.
    pub fn has_messaging_credentials(&self) -> bool {
        !self.bot_token.is_empty() && !self.chat_id.is_empty()
    }
}

/// `-?[0-9]+`: the form chat ids take in Bot API updates.
fn is_numeric_chat_id(id: &str) -> bool {
    let digits = id.strip_prefix('-').unwrap_or(id);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

/// Copy `s` into a fixed-capacity string, truncating on a char boundary.
pub fn truncated<const N: usize>(s: &str) -> HString<N> {
    let mut out = HString::new();
    for c in s.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}
