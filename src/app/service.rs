//! Application service: the hexagonal core.
//!
//! [`CameraService`] owns the settings store, capture telemetry, motion
//! baseline, pan position and scheduling state.  It exposes a clean,
//! hardware-agnostic API.  All I/O flows through port traits injected at
//! call sites, making the entire service testable with mock adapters.
//!
//! ```text
//!   Board ──▶ ┌──────────────────────────────┐ ──▶ EventSink
//!             │         CameraService         │
//! Network ◀──▶│ planner · motion · pan ·      │ ◀──▶ StoragePort
//!             │ poller · settings store       │
//!             └──────────────────────────────┘
//! ```
//!
//! One [`tick`](CameraService::tick) runs: plan → (motion check | timer)
//! capture → poll + execute one command → deferred flush.  Nothing inside a
//! tick returns an error; failures land in telemetry and the log.

use log::{info, warn};

use crate::config::{DeviceSettings, Field, FirmwareConfig, Rejection, SettingsUpdate};
use crate::control::pan::{Movement, PanController};
use crate::diagnostics::{Diagnostics, ResetReason};
use crate::motion::{MotionDetector, MotionVerdict};
use crate::scheduler::CapturePlanner;
use crate::storage::SettingsStore;

use super::commands::{Arg, Command, HELP_TEXT, LocalAction};
use super::events::{AppEvent, CaptureKind, CaptureOutcome, CaptureTelemetry};
use super::poller::{CommandPoller, PollOutcome};
use super::ports::{
    Board, EventSink, FrameLease, MessagingError, Network, StatusProvider, StoragePort,
};
use super::report::{self, StatusReport, format_uptime};

/// A pan request, before clamping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanRequest {
    /// Relative move in degrees (negative = left).
    Nudge(i32),
    /// Absolute angle in degrees.
    To(i32),
    Center,
}

// ───────────────────────────────────────────────────────────────
// CameraService
// ───────────────────────────────────────────────────────────────

/// The application service orchestrates all domain logic.
pub struct CameraService {
    config: FirmwareConfig,
    store: SettingsStore,
    telemetry: CaptureTelemetry,
    motion: MotionDetector,
    pan: Option<PanController>,
    planner: CapturePlanner,
    poller: CommandPoller,
    reset_reason: ResetReason,
    /// Time of the last accepted restart request.
    last_restart_ms: Option<u64>,
}

impl CameraService {
    /// Build the service around already-loaded settings.
    ///
    /// `boot_ms` anchors the timer schedule.  After a software reset the
    /// restart debounce window starts at boot, so a duplicated reboot
    /// request cannot bounce the device twice.
    pub fn new(
        config: FirmwareConfig,
        store: SettingsStore,
        boot_ms: u64,
        reset_reason: ResetReason,
    ) -> Self {
        let pan = config
            .servo_fitted
            .then(|| PanController::from_config(&config, store.settings().pan_angle));
        let planner = CapturePlanner::new(&config, boot_ms);
        let poller = CommandPoller::new(&config);
        let last_restart_ms = (reset_reason == ResetReason::Software).then_some(boot_ms);
        let motion = MotionDetector::with_baseline_limit(config.motion_baseline_max_bytes);

        Self {
            config,
            store,
            telemetry: CaptureTelemetry::new(),
            motion,
            pan,
            planner,
            poller,
            reset_reason,
            last_restart_ms,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Drive the servo to its stored position and announce boot.
    pub fn start(&mut self, hw: &mut impl Board, sink: &mut impl EventSink) {
        if let Some(pan) = self.pan.as_mut() {
            if !hw.is_fitted() {
                warn!("CameraService: servo configured but board reports none");
            }
            pan.attach(hw);
        }
        sink.emit(&AppEvent::Started {
            reset_reason: self.reset_reason,
            settings: *self.store.settings(),
        });
        info!(
            "CameraService started (reset={}, mode={})",
            self.reset_reason,
            self.store.settings().capture_mode.label()
        );
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Run one main-loop iteration.
    pub fn tick(
        &mut self,
        hw: &mut impl Board,
        net: &mut impl Network,
        nvs: &mut impl StoragePort,
        sink: &mut impl EventSink,
    ) {
        hw.feed_watchdog();

        // 1. Decide
        let plan = self.planner.plan(hw.now_ms(), self.store.settings());

        // 2. At most one capture; motion wins
        let motion = plan.check_motion && self.check_motion(hw, sink);
        if motion {
            self.capture(CaptureKind::Motion, hw, net, sink);
        } else if plan.timer_due {
            self.capture(CaptureKind::Timer, hw, net, sink);
        }

        // 3. Remote commands
        self.poll_commands(hw, net, nvs, sink);

        // 4. Deferred persistence
        if self.store.flush_if_due(hw.now_ms(), nvs) {
            sink.emit(&AppEvent::SettingsPersisted);
        }
    }

    /// Lease one frame and compare it against the motion baseline.
    fn check_motion(&mut self, hw: &mut impl Board, sink: &mut impl EventSink) -> bool {
        let threshold = self.store.settings().motion_threshold;
        let Some(frame) = FrameLease::acquire(hw) else {
            return false;
        };
        let verdict = self.motion.observe(frame.bytes(), threshold);
        drop(frame);

        match verdict {
            MotionVerdict::Motion { delta } => {
                info!("Motion detected (delta {} bytes)", delta);
                sink.emit(&AppEvent::MotionDetected { delta });
                true
            }
            MotionVerdict::AllocFailed { .. } => {
                self.telemetry.set_debug("Motion baseline alloc failed");
                false
            }
            MotionVerdict::Baseline | MotionVerdict::NoMotion { .. } => false,
        }
    }

    fn poll_commands(
        &mut self,
        hw: &mut impl Board,
        net: &mut impl Network,
        nvs: &mut impl StoragePort,
        sink: &mut impl EventSink,
    ) {
        match self.poller.poll(hw.now_ms(), net, nvs) {
            PollOutcome::Skipped | PollOutcome::Empty => {}
            PollOutcome::Failed(e) => {
                self.telemetry.set_debug(&format!("Poll failed: {e}"));
                sink.emit(&AppEvent::PollFailed(e));
            }
            PollOutcome::NotPersisted { sequence } => {
                self.telemetry
                    .set_debug(&format!("Offset save failed, #{sequence} not run"));
            }
            PollOutcome::Received {
                sequence,
                command,
                sender,
            } => {
                let name = command.as_ref().map_or("none", Command::name);
                sink.emit(&AppEvent::CommandReceived { sequence, name });
                if let Some(cmd) = command {
                    info!(
                        "Command /{} from {}",
                        name,
                        sender.as_deref().unwrap_or("?")
                    );
                    self.telemetry.set_debug(&format!("Command: /{name}"));
                    self.execute(cmd, hw, net, nvs, sink);
                }
            }
        }
    }

    // ── Capture / upload pipeline ─────────────────────────────

    /// Capture one frame and upload it.
    ///
    /// The frame is held in a [`FrameLease`] for the whole upload, so it is
    /// returned to the driver on every path.
    pub fn capture(
        &mut self,
        kind: CaptureKind,
        hw: &mut impl Board,
        net: &mut impl Network,
        sink: &mut impl EventSink,
    ) -> CaptureOutcome {
        hw.feed_watchdog();
        let started = hw.now_ms();
        self.planner.record_capture(started, kind);

        let (bytes, sent) = {
            let Some(frame) = FrameLease::acquire(&mut *hw) else {
                warn!("Capture ({}): no frame from camera", kind.label());
                self.telemetry.set_upload_result("Failed: no frame");
                self.telemetry.set_debug("Camera capture failed");
                let outcome = CaptureOutcome::NoFrame;
                sink.emit(&AppEvent::Capture { kind, outcome });
                return outcome;
            };

            let bytes = frame.len();
            self.telemetry
                .record_capture(&format_uptime(started), kind);
            self.telemetry.set_debug(&format!("Captured {bytes} bytes"));
            if kind.counts() {
                self.store.modify(started, DeviceSettings::record_capture);
            }
            info!("Captured: {} bytes, kind: {}", bytes, kind.label());

            let caption = format!("{} | {}", kind.label(), format_uptime(started));
            let sent = if net.is_connected() {
                net.send_photo(&caption, frame.bytes())
            } else {
                Err(MessagingError::LinkDown)
            };
            (bytes, sent)
        };

        let done = format_uptime(hw.now_ms());
        let outcome = match sent {
            Ok(()) => {
                if kind.counts() {
                    self.store.modify(hw.now_ms(), DeviceSettings::record_sent);
                }
                self.telemetry
                    .set_upload_result(&format!("Success at {done}"));
                self.telemetry.set_debug("\u{2705} Photo sent successfully!");
                CaptureOutcome::Sent { bytes }
            }
            Err(error) => {
                warn!("Upload failed: {}", error);
                self.telemetry
                    .set_upload_result(&format!("Failed at {done}: {error}"));
                self.telemetry
                    .set_debug(&format!("\u{274C} Failed to send photo: {error}"));
                CaptureOutcome::UploadFailed { bytes, error }
            }
        };
        sink.emit(&AppEvent::Capture { kind, outcome });
        outcome
    }

    // ── Command execution ─────────────────────────────────────

    /// Execute one parsed command.  Every branch answers on the channel.
    pub fn execute(
        &mut self,
        command: Command,
        hw: &mut impl Board,
        net: &mut impl Network,
        nvs: &mut impl StoragePort,
        sink: &mut impl EventSink,
    ) {
        match command {
            Command::Help => {
                let text = format!(
                    "{HELP_TEXT}\nIP: {}\nUptime: {}",
                    net.local_ip().map_or_else(|| "-".to_string(), |ip| ip.to_string()),
                    format_uptime(hw.now_ms())
                );
                let _ = self.reply(net, &text);
            }
            Command::Capture => {
                let _ = self.reply(net, "\u{1F4F8} Capturing photo...");
                self.capture(CaptureKind::Remote, hw, net, sink);
            }
            Command::Status => {
                let text = report::status_text(
                    self.store.settings(),
                    hw.now_ms(),
                    net.rssi(),
                    net.local_ip(),
                );
                let _ = self.reply(net, &text);
            }
            Command::Settings => {
                let text = report::settings_text(self.store.settings(), &self.telemetry);
                let _ = self.reply(net, &text);
            }
            Command::Mode(arg) => {
                let result = arg
                    .require(Field::Mode)
                    .and_then(|v| self.apply_update(&SettingsUpdate::mode(v), hw.now_ms(), sink));
                let s = self.store.settings();
                let ok = format!(
                    "\u{2705} Mode set to {} ({})",
                    s.capture_mode.as_u8(),
                    s.capture_mode.label()
                );
                self.reply_result(net, result, &ok);
            }
            Command::Interval(arg) => {
                let result = arg.require(Field::Interval).and_then(|v| {
                    self.apply_update(&SettingsUpdate::interval(v), hw.now_ms(), sink)
                });
                let ok = format!(
                    "\u{2705} Interval set to {} min",
                    self.store.settings().interval_minutes
                );
                self.reply_result(net, result, &ok);
            }
            Command::Threshold(arg) => {
                let result = arg.require(Field::Threshold).and_then(|v| {
                    self.apply_update(&SettingsUpdate::threshold(v), hw.now_ms(), sink)
                });
                let ok = format!(
                    "\u{2705} Threshold set to {}",
                    self.store.settings().motion_threshold
                );
                self.reply_result(net, result, &ok);
            }
            Command::MotionOn => {
                let result = self.apply_update(&SettingsUpdate::motion(true), hw.now_ms(), sink);
                self.reply_result(net, result, "\u{2705} Motion detection enabled");
            }
            Command::MotionOff => {
                let result = self.apply_update(&SettingsUpdate::motion(false), hw.now_ms(), sink);
                self.reply_result(net, result, "\u{2B55} Motion detection disabled");
            }
            Command::Left(arg) => {
                let result = self
                    .nudge_degrees(arg)
                    .and_then(|d| self.move_pan(PanRequest::Nudge(-d), hw, sink));
                self.reply_pan(net, result, sink);
            }
            Command::Right(arg) => {
                let result = self
                    .nudge_degrees(arg)
                    .and_then(|d| self.move_pan(PanRequest::Nudge(d), hw, sink));
                self.reply_pan(net, result, sink);
            }
            Command::Center => {
                let result = self.move_pan(PanRequest::Center, hw, sink);
                self.reply_pan(net, result, sink);
            }
            Command::Pan(arg) => {
                let result = arg
                    .require(Field::Pan)
                    .map(|v| v.clamp(-1000, 1000) as i32)
                    .and_then(|a| self.move_pan(PanRequest::To(a), hw, sink));
                self.reply_pan(net, result, sink);
            }
            Command::Sweep => self.sweep(hw, net, sink),
            Command::Stream => {
                let text = report::stream_text(net.local_ip(), self.config.status_port);
                let _ = self.reply(net, &text);
            }
            Command::Reboot => self.request_restart(hw, net, nvs, sink),
            Command::Test => {
                let _ = self.reply(net, "\u{1F50D} Testing connection...");
                self.run_test(hw, net, sink);
            }
            Command::Debug => {
                let text = report::debug_text(&self.diagnostics(hw, net));
                let _ = self.reply(net, &text);
            }
            Command::Unknown(word) => {
                let text = format!("\u{2753} Unknown command: {word}\nType /help");
                let _ = self.reply(net, &text);
            }
        }
    }

    /// Run work requested through the local status server.
    pub fn run_local_action(
        &mut self,
        action: LocalAction,
        hw: &mut impl Board,
        net: &mut impl Network,
        sink: &mut impl EventSink,
    ) {
        match action {
            LocalAction::CaptureNow => {
                self.capture(CaptureKind::Local, hw, net, sink);
            }
            LocalAction::TestMessaging => {
                self.run_test(hw, net, sink);
            }
        }
    }

    // ── Settings mutation ─────────────────────────────────────

    /// The single entry point for changing user settings.
    ///
    /// Used by remote commands and the local `/save-settings` route alike.
    /// Validates every field before applying any; marks the store dirty
    /// only when something actually changed.
    pub fn apply_update(
        &mut self,
        update: &SettingsUpdate,
        now_ms: u64,
        sink: &mut impl EventSink,
    ) -> Result<bool, Rejection> {
        let was_enabled = self.store.settings().motion_enabled;
        match self.store.apply(now_ms, update) {
            Ok(changed) => {
                let s = *self.store.settings();
                if was_enabled && !s.motion_enabled {
                    self.motion.reset();
                }
                if changed {
                    sink.emit(&AppEvent::SettingsChanged(s));
                }
                Ok(changed)
            }
            Err(r) => {
                sink.emit(&AppEvent::Rejected(r));
                Err(r)
            }
        }
    }

    // ── Pan ───────────────────────────────────────────────────

    /// Move the pan servo (smoothly) and record the new angle.
    pub fn move_pan(
        &mut self,
        request: PanRequest,
        hw: &mut impl Board,
        sink: &mut impl EventSink,
    ) -> Result<u8, Rejection> {
        let Some(pan) = self.pan.as_mut() else {
            return Err(Rejection::NoServo);
        };
        let angle = match request {
            PanRequest::Nudge(delta) => pan.nudge(delta, hw),
            PanRequest::To(angle) => pan.set_target(angle, Movement::Smooth, hw),
            PanRequest::Center => pan.center(Movement::Smooth, hw),
        };
        self.store.modify(hw.now_ms(), |s| s.pan_angle = Some(angle));
        sink.emit(&AppEvent::PanMoved(angle));
        Ok(angle)
    }

    fn nudge_degrees(&self, arg: Arg) -> Result<i32, Rejection> {
        let Some(pan) = self.pan.as_ref() else {
            return Err(Rejection::NoServo);
        };
        match arg {
            Arg::Missing => Ok(i32::from(pan.nudge_deg())),
            Arg::Int(v) => Ok(v.clamp(-360, 360) as i32),
            Arg::NotANumber => Err(Rejection::BadArgument(Field::Pan)),
        }
    }

    /// Step across the pan range, capturing at every stop, then re-center.
    fn sweep(&mut self, hw: &mut impl Board, net: &mut impl Network, sink: &mut impl EventSink) {
        let Some(pan) = self.pan.as_ref() else {
            let _ = self.reply(net, &format!("\u{274C} {}", Rejection::NoServo));
            return;
        };
        let stops = pan.sweep_stops(self.config.sweep_step_deg);
        let _ = self.reply(
            net,
            &format!("\u{1F501} Sweeping {} positions...", stops.len()),
        );

        let mut sent = 0usize;
        for &stop in &stops {
            hw.feed_watchdog();
            // Servo present, checked above.
            let _ = self.move_pan(PanRequest::To(i32::from(stop)), hw, sink);
            hw.delay_ms(self.config.sweep_settle_ms);
            if self.capture(CaptureKind::Sweep, hw, net, sink).is_sent() {
                sent += 1;
            }
            hw.delay_ms(self.config.sweep_cooldown_ms);
        }
        let _ = self.move_pan(PanRequest::Center, hw, sink);

        let _ = self.reply(
            net,
            &format!("\u{2705} Sweep done: {sent}/{} sent", stops.len()),
        );
    }

    // ── Restart ───────────────────────────────────────────────

    fn request_restart(
        &mut self,
        hw: &mut impl Board,
        net: &mut impl Network,
        nvs: &mut impl StoragePort,
        sink: &mut impl EventSink,
    ) {
        let now = hw.now_ms();
        let window = u64::from(self.config.restart_debounce_ms);
        if let Some(last) = self.last_restart_ms {
            let age = now.saturating_sub(last);
            if age < window {
                info!("Restart ignored ({} ms since last request)", age);
                sink.emit(&AppEvent::RestartIgnored);
                let _ = self.reply(
                    net,
                    &format!("\u{23F3} Restart ignored ({}s since last restart)", age / 1000),
                );
                return;
            }
        }
        self.last_restart_ms = Some(now);

        let _ = self.reply(net, "\u{1F504} Restarting ESP32-CAM...");
        hw.delay_ms(self.config.restart_grace_ms);
        if self.store.force_flush(hw.now_ms(), nvs) {
            sink.emit(&AppEvent::SettingsPersisted);
        }
        sink.emit(&AppEvent::RestartRequested);
        hw.restart();
    }

    // ── Connectivity test ─────────────────────────────────────

    /// Send a test message, then one uncounted photo.
    pub fn run_test(
        &mut self,
        hw: &mut impl Board,
        net: &mut impl Network,
        sink: &mut impl EventSink,
    ) -> bool {
        let ip = net
            .local_ip()
            .map_or_else(|| "-".to_string(), |ip| ip.to_string());
        let text_ok = self
            .reply(
                net,
                &format!("\u{1F4E1} ESP32-CAM Connection Test\n\u{2705} Text messages work!\nIP: {ip}"),
            )
            .is_ok();
        let photo_ok = self.capture(CaptureKind::Test, hw, net, sink).is_sent();

        let verdict = match (text_ok, photo_ok) {
            (true, true) => "\u{2705} Test passed: text + photo",
            (true, false) => "\u{26A0}\u{FE0F} Test: text ok, photo failed",
            (false, _) => "\u{274C} Test failed: text not sent",
        };
        self.telemetry.set_debug(verdict);
        text_ok && photo_ok
    }

    // ── Replies ───────────────────────────────────────────────

    fn reply(&mut self, net: &mut impl Network, text: &str) -> Result<(), MessagingError> {
        let result = if net.is_connected() {
            net.send_text(text)
        } else {
            Err(MessagingError::LinkDown)
        };
        if let Err(e) = result {
            warn!("Reply failed: {}", e);
            self.telemetry.set_debug(&format!("Reply failed: {e}"));
        }
        result
    }

    fn reply_result(
        &mut self,
        net: &mut impl Network,
        result: Result<bool, Rejection>,
        ok_text: &str,
    ) {
        match result {
            Ok(_) => {
                let _ = self.reply(net, ok_text);
            }
            Err(r) => {
                let _ = self.reply(net, &format!("\u{274C} {r}"));
            }
        }
    }

    fn reply_pan(
        &mut self,
        net: &mut impl Network,
        result: Result<u8, Rejection>,
        sink: &mut impl EventSink,
    ) {
        match result {
            Ok(angle) => {
                let _ = self.reply(net, &format!("\u{2194}\u{FE0F} Pan: {angle}\u{00B0}"));
            }
            Err(r) => {
                sink.emit(&AppEvent::Rejected(r));
                let _ = self.reply(net, &format!("\u{274C} {r}"));
            }
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn settings(&self) -> &DeviceSettings {
        self.store.settings()
    }

    pub fn store(&self) -> &SettingsStore {
        &self.store
    }

    pub fn telemetry(&self) -> &CaptureTelemetry {
        &self.telemetry
    }

    pub fn pan_position(&self) -> Option<u8> {
        self.pan.as_ref().map(PanController::position)
    }

    pub fn config(&self) -> &FirmwareConfig {
        &self.config
    }

    pub fn status_report(&self, now_ms: u64) -> StatusReport {
        StatusReport::build(self.store.settings(), &self.telemetry, now_ms)
    }

    /// Board diagnostics with the link's RSSI filled in.
    pub fn diagnostics(&self, hw: &impl Board, net: &impl Network) -> Diagnostics {
        let mut d = hw.diagnostics();
        d.wifi_rssi = net.rssi().unwrap_or(0);
        d
    }
}

// ───────────────────────────────────────────────────────────────
// Local status capability
// ───────────────────────────────────────────────────────────────

/// The narrow view of the service handed to the local status server
/// for one request.
pub struct LocalStatus<'a, B: Board, S: EventSink> {
    service: &'a mut CameraService,
    hw: &'a mut B,
    sink: &'a mut S,
    now_ms: u64,
    diagnostics: Diagnostics,
}

impl<'a, B: Board, S: EventSink> LocalStatus<'a, B, S> {
    pub fn new(
        service: &'a mut CameraService,
        hw: &'a mut B,
        net: &impl Network,
        sink: &'a mut S,
    ) -> Self {
        let diagnostics = service.diagnostics(&*hw, net);
        let now_ms = hw.now_ms();
        Self {
            service,
            hw,
            sink,
            now_ms,
            diagnostics,
        }
    }
}

impl<B: Board, S: EventSink> StatusProvider for LocalStatus<'_, B, S> {
    fn status(&self) -> StatusReport {
        self.service.status_report(self.now_ms)
    }

    fn debug(&self) -> Diagnostics {
        self.diagnostics
    }

    fn update_settings(&mut self, update: &SettingsUpdate) -> Result<(), Rejection> {
        self.service
            .apply_update(update, self.now_ms, &mut *self.sink)
            .map(|_| ())
    }

    fn snapshot(&mut self) -> Option<Vec<u8>> {
        let lease = FrameLease::acquire(&mut *self.hw)?;
        let mut jpeg = Vec::new();
        if jpeg.try_reserve_exact(lease.len()).is_err() {
            warn!("LocalStatus: no memory for a {} byte snapshot", lease.len());
            return None;
        }
        jpeg.extend_from_slice(lease.bytes());
        Some(jpeg)
    }
}
