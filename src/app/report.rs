//! Human- and machine-readable status reports.
//!
//! One [`StatusReport`] snapshot feeds both the local `/status` JSON route
//! and the remote `/status` / `/settings` replies, so the two never
//! disagree.

use core::fmt::Write;
use core::net::Ipv4Addr;

use heapless::String as HString;
use serde::Serialize;

use crate::config::DeviceSettings;
use crate::diagnostics::Diagnostics;

use super::events::CaptureTelemetry;

/// Point-in-time view of settings, counters and telemetry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub captured_count: u32,
    pub sent_count: u32,
    pub last_capture_time: HString<24>,
    pub last_capture_type: HString<20>,
    pub last_telegram_result: HString<48>,
    pub capture_mode: u8,
    pub current_mode: &'static str,
    pub time_interval: u16,
    pub motion_threshold: u16,
    pub motion_enabled: bool,
    pub pan_angle: Option<u8>,
    pub uptime: HString<24>,
    pub telegram_debug: HString<96>,
}

impl StatusReport {
    pub fn build(settings: &DeviceSettings, telemetry: &CaptureTelemetry, uptime_ms: u64) -> Self {
        Self {
            captured_count: settings.captured_count,
            sent_count: settings.sent_count,
            last_capture_time: telemetry.last_capture_time.clone(),
            last_capture_type: telemetry.last_capture_kind.clone(),
            last_telegram_result: telemetry.last_upload_result.clone(),
            capture_mode: settings.capture_mode.as_u8(),
            current_mode: settings.capture_mode.description(),
            time_interval: settings.interval_minutes,
            motion_threshold: settings.motion_threshold,
            motion_enabled: settings.motion_enabled,
            pan_angle: settings.pan_angle,
            uptime: format_uptime(uptime_ms),
            telegram_debug: telemetry.debug.clone(),
        }
    }
}

/// `3d 04:05:06`, or `04:05:06` under a day.
pub fn format_uptime(ms: u64) -> HString<24> {
    let secs = ms / 1000;
    let (d, h, m, s) = (secs / 86_400, (secs / 3600) % 24, (secs / 60) % 60, secs % 60);
    let mut out = HString::new();
    let _ = if d > 0 {
        write!(out, "{d}d {h:02}:{m:02}:{s:02}")
    } else {
        write!(out, "{h:02}:{m:02}:{s:02}")
    };
    out
}

fn on_off(v: bool) -> &'static str {
    if v { "ON" } else { "OFF" }
}

fn ip_text(ip: Option<Ipv4Addr>) -> String {
    ip.map_or_else(|| "-".to_string(), |ip| ip.to_string())
}

/// Reply to `/status`.
pub fn status_text(
    settings: &DeviceSettings,
    uptime_ms: u64,
    rssi: Option<i8>,
    ip: Option<Ipv4Addr>,
) -> String {
    let mut s = String::from("\u{1F4CA} Camera Status:\n\n");
    let _ = writeln!(s, "IP: {}", ip_text(ip));
    let _ = writeln!(s, "WiFi: {} dBm", rssi.unwrap_or(0));
    let _ = writeln!(s, "Uptime: {}", format_uptime(uptime_ms));
    let _ = writeln!(s, "Captured: {}", settings.captured_count);
    let _ = writeln!(s, "Sent: {}", settings.sent_count);
    let _ = writeln!(s, "Mode: {}", settings.capture_mode.label());
    let _ = writeln!(s, "Interval: {} min", settings.interval_minutes);
    let _ = writeln!(s, "Sensitivity: {}", settings.motion_threshold);
    let _ = write!(s, "Motion: {}", on_off(settings.motion_enabled));
    if let Some(angle) = settings.pan_angle {
        let _ = write!(s, "\nPan: {angle}\u{00B0}");
    }
    s
}

/// Reply to `/settings`.
pub fn settings_text(settings: &DeviceSettings, telemetry: &CaptureTelemetry) -> String {
    let mut s = String::from("\u{2699}\u{FE0F} Current Settings:\n\n");
    let _ = writeln!(s, "Mode: {}", settings.capture_mode.label());
    let _ = writeln!(s, "Interval: {} min", settings.interval_minutes);
    let _ = writeln!(s, "Sensitivity: {}", settings.motion_threshold);
    let _ = writeln!(s, "Motion: {}", on_off(settings.motion_enabled));
    let _ = writeln!(s, "Last Capture: {}", telemetry.last_capture_time);
    let _ = write!(s, "Last Telegram: {}", telemetry.last_upload_result);
    s
}

/// Reply to `/debug`.
pub fn debug_text(diag: &Diagnostics) -> String {
    let mut s = String::from("\u{1F9E0} Memory Debug:\n");
    let _ = writeln!(s, "freeHeap: {}", diag.free_heap);
    let _ = writeln!(s, "minHeap: {}", diag.min_free_heap);
    let _ = writeln!(s, "freePSRAM: {}", diag.free_psram);
    let _ = writeln!(s, "RSSI: {} dBm", diag.wifi_rssi);
    let _ = write!(s, "reset: {}", diag.reset_reason);
    s
}

/// Reply to `/stream`.
pub fn stream_text(ip: Option<Ipv4Addr>, port: u16) -> String {
    let mut s = String::from("\u{1F4F7} Snapshot:\n");
    match (ip, port) {
        (Some(ip), 80) => {
            let _ = write!(s, "http://{ip}/stream");
        }
        (Some(ip), port) => {
            let _ = write!(s, "http://{ip}:{port}/stream");
        }
        (None, _) => s.push_str("no IP address yet"),
    }
    s
}
