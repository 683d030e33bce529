//! Remote command vocabulary.
//!
//! [`Command::parse`] turns raw message text into a closed [`Command`]
//! enum.  Parsing is pure and total: anything unrecognised becomes
//! [`Command::Unknown`] so it is answered, never silently dropped.
//! Numeric arguments are parsed here but range-checked by the service.

use heapless::String as HString;

use crate::config::{Field, Rejection, truncated};

/// A command argument as it arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arg {
    Missing,
    NotANumber,
    Int(i64),
}

impl Arg {
    fn parse(raw: Option<&str>) -> Self {
        match raw {
            None => Self::Missing,
            Some(s) => s.parse::<i64>().map_or(Self::NotANumber, Self::Int),
        }
    }

    /// The integer value, or a rejection naming `field`.
    pub fn require(self, field: Field) -> Result<i64, Rejection> {
        match self {
            Self::Int(v) => Ok(v),
            Self::Missing | Self::NotANumber => Err(Rejection::BadArgument(field)),
        }
    }
}

/// Every command the device understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Capture,
    Status,
    Settings,
    Mode(Arg),
    Interval(Arg),
    Threshold(Arg),
    MotionOn,
    MotionOff,
    /// Pan left by the argument or the default nudge.
    Left(Arg),
    /// Pan right by the argument or the default nudge.
    Right(Arg),
    Center,
    Pan(Arg),
    Sweep,
    Stream,
    Reboot,
    Test,
    Debug,
    /// Carries the normalised command word for the reply.
    Unknown(HString<32>),
}

impl Command {
    /// Parse message text.  `None` for empty or whitespace-only text.
    pub fn parse(text: &str) -> Option<Self> {
        let lowered = text.trim().to_lowercase();
        let mut words = lowered.split_whitespace();
        let first = words.next()?;

        // "/cmd@SomeBot" → "cmd"
        let word = first.split('@').next().unwrap_or(first);
        let word = word.strip_prefix('/').unwrap_or(word);
        let arg = Arg::parse(words.next());

        let cmd = match word {
            "start" | "help" => Self::Help,
            "capture" | "photo" | "pic" => Self::Capture,
            "status" | "info" => Self::Status,
            "settings" => Self::Settings,
            "mode" => Self::Mode(arg),
            "interval" => Self::Interval(arg),
            "threshold" => Self::Threshold(arg),
            "motion_on" => Self::MotionOn,
            "motion_off" => Self::MotionOff,
            "left" => Self::Left(arg),
            "right" => Self::Right(arg),
            "center" | "centre" => Self::Center,
            "pan" => Self::Pan(arg),
            "sweep" => Self::Sweep,
            "stream" => Self::Stream,
            "reboot" | "restart" => Self::Reboot,
            "test" => Self::Test,
            "debug" => Self::Debug,
            _ => Self::Unknown(truncated(first)),
        };
        Some(cmd)
    }

    /// Stable short name for logs and events.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Help => "help",
            Self::Capture => "capture",
            Self::Status => "status",
            Self::Settings => "settings",
            Self::Mode(_) => "mode",
            Self::Interval(_) => "interval",
            Self::Threshold(_) => "threshold",
            Self::MotionOn => "motion_on",
            Self::MotionOff => "motion_off",
            Self::Left(_) => "left",
            Self::Right(_) => "right",
            Self::Center => "center",
            Self::Pan(_) => "pan",
            Self::Sweep => "sweep",
            Self::Stream => "stream",
            Self::Reboot => "reboot",
            Self::Test => "test",
            Self::Debug => "debug",
            Self::Unknown(_) => "unknown",
        }
    }
}

/// Work requested through the local status server, run by the main loop
/// on the control thread after the HTTP response has gone out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalAction {
    CaptureNow,
    TestMessaging,
}

/// Reply to `/help`.
pub const HELP_TEXT: &str = "\u{1F916} ESP32-CAM Bot Commands:\n\n\
    \u{1F4F8} /capture - Take photo\n\
    \u{1F4CA} /status - Camera status\n\
    \u{1F50D} /test - Test connection\n\
    \u{2699}\u{FE0F} /settings - Current settings\n\
    \u{1F504} /reboot - Restart camera\n\
    \u{1F527} /debug - Memory info\n\
    \u{1F4F7} /stream - Local snapshot URL\n\
    \n--- Settings ---\n\
    \u{1F39B}\u{FE0F} /mode 0|1|2  (0=motion,1=time,2=mixed)\n\
    \u{23F1}\u{FE0F} /interval N  (minutes, 1..1000)\n\
    \u{1F39A}\u{FE0F} /threshold N (1000..20000)\n\
    \u{2705} /motion_on  |  \u{2B55} /motion_off\n\
    \n--- Pan ---\n\
    /left [N]  /right [N]  /center  /pan N  /sweep\n";
