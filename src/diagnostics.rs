//! Runtime diagnostics.
//!
//! Heap / PSRAM / reset-reason snapshot served by `/debug` (remote and
//! local).  Collected on demand; nothing here is persisted.

use core::fmt;

use serde::Serialize;

/// Why the chip last reset.  Mirrors `esp_reset_reason_t`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ResetReason {
    Unknown,
    PowerOn,
    External,
    Software,
    Panic,
    InterruptWatchdog,
    TaskWatchdog,
    Watchdog,
    DeepSleep,
    Brownout,
    Sdio,
    Other(u32),
}

impl ResetReason {
    /// Decode the raw `esp_reset_reason_t` value.
    pub fn from_code(code: u32) -> Self {
        match code {
            0 => Self::Unknown,
            1 => Self::PowerOn,
            2 => Self::External,
            3 => Self::Software,
            4 => Self::Panic,
            5 => Self::InterruptWatchdog,
            6 => Self::TaskWatchdog,
            7 => Self::Watchdog,
            8 => Self::DeepSleep,
            9 => Self::Brownout,
            10 => Self::Sdio,
            other => Self::Other(other),
        }
    }

    pub fn code(self) -> u32 {
        match self {
            Self::Unknown => 0,
            Self::PowerOn => 1,
            Self::External => 2,
            Self::Software => 3,
            Self::Panic => 4,
            Self::InterruptWatchdog => 5,
            Self::TaskWatchdog => 6,
            Self::Watchdog => 7,
            Self::DeepSleep => 8,
            Self::Brownout => 9,
            Self::Sdio => 10,
            Self::Other(c) => c,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "UNKNOWN",
            Self::PowerOn => "POWERON",
            Self::External => "EXT_RESET",
            Self::Software => "SW_RESET",
            Self::Panic => "PANIC",
            Self::InterruptWatchdog => "INT_WDT",
            Self::TaskWatchdog => "TASK_WDT",
            Self::Watchdog => "WDT",
            Self::DeepSleep => "DEEPSLEEP",
            Self::Brownout => "BROWNOUT",
            Self::Sdio => "SDIO",
            Self::Other(_) => "OTHER",
        }
    }

    /// Reason for the current boot.
    #[cfg(target_os = "espidf")]
    pub fn current() -> Self {
        // SAFETY: reads a value latched by the ROM at boot.
        let raw = unsafe { esp_idf_svc::sys::esp_reset_reason() };
        Self::from_code(raw as u32)
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn current() -> Self {
        Self::PowerOn
    }
}

impl fmt::Display for ResetReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.as_str(), self.code())
    }
}

/// On-demand memory and reset snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Diagnostics {
    #[serde(rename = "freeHeap")]
    pub free_heap: u32,
    #[serde(rename = "minFreeHeap")]
    pub min_free_heap: u32,
    #[serde(rename = "freePsram")]
    pub free_psram: u32,
    #[serde(rename = "resetReason", serialize_with = "reason_str")]
    pub reset_reason: ResetReason,
    #[serde(rename = "wifiRSSI")]
    pub wifi_rssi: i8,
    #[serde(rename = "uptimeMs")]
    pub uptime_ms: u64,
}

fn reason_str<S: serde::Serializer>(r: &ResetReason, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(r.as_str())
}

impl Diagnostics {
    #[cfg(target_os = "espidf")]
    pub fn collect(uptime_ms: u64, wifi_rssi: Option<i8>, reset_reason: ResetReason) -> Self {
        use esp_idf_svc::sys::*;
        // SAFETY: heap statistics are read-only queries into the allocator.
        let (free_heap, min_free_heap, free_psram) = unsafe {
            (
                esp_get_free_heap_size(),
                esp_get_minimum_free_heap_size(),
                heap_caps_get_free_size(MALLOC_CAP_SPIRAM) as u32,
            )
        };
        Self {
            free_heap,
            min_free_heap,
            free_psram,
            reset_reason,
            wifi_rssi: wifi_rssi.unwrap_or(0),
            uptime_ms,
        }
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn collect(uptime_ms: u64, wifi_rssi: Option<i8>, reset_reason: ResetReason) -> Self {
        // Synthetic figures shaped like an AI-Thinker board with 4 MB PSRAM.
        // Heap "decays" slightly over time to model fragmentation.
        let base_free: u32 = 180_000;
        let decay = (uptime_ms / 60_000) as u32 * 64;
        let free_heap = base_free.saturating_sub(decay);
        Self {
            free_heap,
            min_free_heap: free_heap * 9 / 10,
            free_psram: 4_000_000,
            reset_reason,
            wifi_rssi: wifi_rssi.unwrap_or(0),
            uptime_ms,
        }
    }
}
