//! Integration tests for the CameraService tick pipeline.
//!
//! Drive the whole core (planner → motion → capture → poller → executor →
//! deferred flush) against the mock adapters in `mock_hw`.

use camwatch::app::events::{AppEvent, CaptureKind, CaptureOutcome};
use camwatch::app::ports::{InboundMessage, MessagingError};
use camwatch::app::service::CameraService;
use camwatch::config::{CaptureMode, FirmwareConfig, SettingsUpdate};
use camwatch::diagnostics::ResetReason;
use camwatch::storage::offset::OFFSET_KEY;
use camwatch::storage::settings::SETTINGS_KEY;
use camwatch::storage::SettingsStore;

use crate::mock_hw::{MockBoard, MockNetwork, MockNvs, RecordingSink, journal};

const POLL_GAP_MS: u64 = 2_000;

fn make_service(config: FirmwareConfig, nvs: &MockNvs, reason: ResetReason) -> CameraService {
    let store = SettingsStore::load(nvs, &config);
    CameraService::new(config, store, 0, reason)
}

fn fresh() -> (CameraService, MockBoard, MockNetwork, MockNvs, RecordingSink) {
    let nvs = MockNvs::new();
    let svc = make_service(FirmwareConfig::default(), &nvs, ResetReason::PowerOn);
    (svc, MockBoard::new(), MockNetwork::new(), nvs, RecordingSink::new())
}

/// Queue `text` as update `seq`, advance past the poll cadence and tick.
fn deliver(
    seq: u64,
    text: &str,
    svc: &mut CameraService,
    hw: &mut MockBoard,
    net: &mut MockNetwork,
    nvs: &mut MockNvs,
    sink: &mut RecordingSink,
) {
    net.push_text(seq, text);
    hw.set_now(hw.now.get() + POLL_GAP_MS);
    svc.tick(hw, net, nvs, sink);
}

// ── Motion scenario ──────────────────────────────────────────

#[test]
fn motion_scenario_compares_against_current_baseline() {
    let (mut svc, _, mut net, mut nvs, mut sink) = fresh();
    // Motion checks see 1000, 4000, 7000; the capture itself grabs 7100.
    let mut hw = MockBoard::with_frames(&[Some(1000), Some(4000), Some(7000), Some(7100)]);
    assert_eq!(svc.settings().motion_threshold, 5000);

    hw.set_now(0);
    svc.tick(&mut hw, &mut net, &mut nvs, &mut sink);
    hw.set_now(1_000);
    svc.tick(&mut hw, &mut net, &mut nvs, &mut sink);
    assert!(net.photos.is_empty(), "delta 3000 must not trigger");

    hw.set_now(2_000);
    svc.tick(&mut hw, &mut net, &mut nvs, &mut sink);
    assert_eq!(net.photos.len(), 1);
    assert_eq!(net.photos[0].1, 7100);
    assert!(net.photos[0].0.starts_with("Motion"));
    assert_eq!(sink.count(|e| matches!(e, AppEvent::MotionDetected { delta: 6000 })), 1);
    assert_eq!(svc.settings().captured_count, 1);
    assert_eq!(svc.settings().sent_count, 1);

    // Baseline is now 7000: a 1500 byte frame after the cooldown is a
    // 5500 delta (it would only be 500 against the first baseline).
    hw.frames.push_back(Some(1500));
    hw.set_now(12_000);
    svc.tick(&mut hw, &mut net, &mut nvs, &mut sink);
    assert_eq!(net.photos.len(), 2);
    assert_eq!(hw.outstanding(), 0);
}

#[test]
fn first_evaluation_never_reports_motion() {
    let (mut svc, _, mut net, mut nvs, mut sink) = fresh();
    let mut hw = MockBoard::with_frames(&[Some(30_000)]);
    svc.tick(&mut hw, &mut net, &mut nvs, &mut sink);
    assert!(net.photos.is_empty());
    assert_eq!(sink.count(|e| matches!(e, AppEvent::MotionDetected { .. })), 0);
}

#[test]
fn motion_cooldown_blocks_back_to_back_captures() {
    let (mut svc, _, mut net, mut nvs, mut sink) = fresh();
    let mut hw = MockBoard::with_frames(&[
        Some(1000),
        Some(9000),
        Some(9000), // capture
        Some(1000), // would be motion, but cooling down
    ]);
    for t in [0, 1_000, 2_000] {
        hw.set_now(t);
        svc.tick(&mut hw, &mut net, &mut nvs, &mut sink);
    }
    assert_eq!(net.photos.len(), 1);
    // During the cooldown no frame is even taken for a motion check.
    let acquired = hw.acquired;
    hw.set_now(5_000);
    svc.tick(&mut hw, &mut net, &mut nvs, &mut sink);
    assert_eq!(hw.acquired, acquired);
}

#[test]
fn disabling_motion_drops_the_baseline() {
    let (mut svc, _, mut net, mut nvs, mut sink) = fresh();
    let mut hw = MockBoard::with_frames(&[Some(1000), Some(9000)]);
    svc.tick(&mut hw, &mut net, &mut nvs, &mut sink);

    svc.apply_update(&SettingsUpdate::motion(false), 500, &mut sink).unwrap();
    svc.apply_update(&SettingsUpdate::motion(true), 600, &mut sink).unwrap();

    // 9000 becomes the new baseline instead of a 8000-byte delta.
    hw.set_now(1_000);
    svc.tick(&mut hw, &mut net, &mut nvs, &mut sink);
    assert!(net.photos.is_empty());
}

#[test]
fn baseline_that_cannot_grow_triggers_no_capture() {
    let nvs_seed = MockNvs::new();
    let config = FirmwareConfig {
        motion_baseline_max_bytes: 8_000,
        ..FirmwareConfig::default()
    };
    let mut svc = make_service(config, &nvs_seed, ResetReason::PowerOn);
    let (mut net, mut nvs, mut sink) = (MockNetwork::new(), nvs_seed, RecordingSink::new());
    let mut hw = MockBoard::with_frames(&[Some(1_000), Some(20_000), Some(1_200)]);

    hw.set_now(0);
    svc.tick(&mut hw, &mut net, &mut nvs, &mut sink);
    hw.set_now(1_000);
    svc.tick(&mut hw, &mut net, &mut nvs, &mut sink);

    assert!(net.photos.is_empty());
    assert_eq!(sink.count(|e| matches!(e, AppEvent::MotionDetected { .. })), 0);
    assert_eq!(svc.settings().captured_count, 0);
    assert!(svc.telemetry().debug.contains("Motion baseline alloc failed"));
    assert_eq!(hw.outstanding(), 0);

    // The 1000-byte baseline survived: 1200 is quiet against it.
    hw.set_now(2_000);
    svc.tick(&mut hw, &mut net, &mut nvs, &mut sink);
    assert!(net.photos.is_empty());
}

// ── Timer captures ───────────────────────────────────────────

#[test]
fn timer_mode_captures_once_per_interval() {
    let (mut svc, mut hw, mut net, mut nvs, mut sink) = fresh();
    let update = SettingsUpdate {
        capture_mode: Some(1),
        interval_minutes: Some(1),
        ..SettingsUpdate::default()
    };
    svc.apply_update(&update, 0, &mut sink).unwrap();
    assert_eq!(svc.settings().capture_mode, CaptureMode::Timer);

    hw.set_now(59_999);
    svc.tick(&mut hw, &mut net, &mut nvs, &mut sink);
    assert!(net.photos.is_empty());
    assert_eq!(hw.acquired, 0, "timer mode never takes motion frames");

    hw.set_now(60_000);
    svc.tick(&mut hw, &mut net, &mut nvs, &mut sink);
    assert_eq!(net.photos.len(), 1);
    assert!(net.photos[0].0.starts_with("Timer"));

    hw.set_now(90_000);
    svc.tick(&mut hw, &mut net, &mut nvs, &mut sink);
    assert_eq!(net.photos.len(), 1);
}

// ── Frame release ────────────────────────────────────────────

#[test]
fn frames_are_released_on_every_capture_path() {
    let (mut svc, mut hw, mut net, _, mut sink) = fresh();

    hw.frames.push_back(None);
    assert_eq!(
        svc.capture(CaptureKind::Remote, &mut hw, &mut net, &mut sink),
        CaptureOutcome::NoFrame
    );
    assert_eq!(svc.settings().captured_count, 0);

    net.photo_error = Some(MessagingError::Connect);
    let out = svc.capture(CaptureKind::Remote, &mut hw, &mut net, &mut sink);
    assert_eq!(
        out,
        CaptureOutcome::UploadFailed {
            bytes: 20_000,
            error: MessagingError::Connect
        }
    );
    assert!(svc.telemetry().last_upload_result.starts_with("Failed"));

    net.photo_error = None;
    net.connected = false;
    let out = svc.capture(CaptureKind::Remote, &mut hw, &mut net, &mut sink);
    assert!(matches!(
        out,
        CaptureOutcome::UploadFailed {
            error: MessagingError::LinkDown,
            ..
        }
    ));

    net.connected = true;
    assert!(svc.capture(CaptureKind::Remote, &mut hw, &mut net, &mut sink).is_sent());

    assert_eq!(hw.acquired, 3);
    assert_eq!(hw.outstanding(), 0);
    assert_eq!(svc.settings().captured_count, 3);
    assert_eq!(svc.settings().sent_count, 1);
}

// ── Command validation ───────────────────────────────────────

#[test]
fn interval_bounds_via_commands() {
    let (mut svc, mut hw, mut net, mut nvs, mut sink) = fresh();

    deliver(1, "/interval 0", &mut svc, &mut hw, &mut net, &mut nvs, &mut sink);
    assert!(net.last_text().unwrap().contains("interval must be 1..1000"));
    deliver(2, "/interval 1001", &mut svc, &mut hw, &mut net, &mut nvs, &mut sink);
    assert!(net.last_text().unwrap().contains("interval must be 1..1000"));
    assert_eq!(svc.settings().interval_minutes, 5);

    deliver(3, "/interval 500", &mut svc, &mut hw, &mut net, &mut nvs, &mut sink);
    assert_eq!(svc.settings().interval_minutes, 500);
    assert!(net.last_text().unwrap().contains("Interval set to 500 min"));
    assert_eq!(sink.count(|e| matches!(e, AppEvent::Rejected(_))), 2);
}

#[test]
fn bad_arguments_and_unknown_words_get_replies() {
    let (mut svc, mut hw, mut net, mut nvs, mut sink) = fresh();

    deliver(1, "/mode", &mut svc, &mut hw, &mut net, &mut nvs, &mut sink);
    assert!(net.last_text().unwrap().contains("mode must be 0,1,2"));
    deliver(2, "/threshold lots", &mut svc, &mut hw, &mut net, &mut nvs, &mut sink);
    assert!(net.last_text().unwrap().contains("threshold must be"));
    deliver(3, "/dance", &mut svc, &mut hw, &mut net, &mut nvs, &mut sink);
    assert!(net.last_text().unwrap().contains("Unknown command: /dance"));
    deliver(4, "/MODE@CamBot 2", &mut svc, &mut hw, &mut net, &mut nvs, &mut sink);
    assert_eq!(svc.settings().capture_mode, CaptureMode::Mixed);
    assert!(net.last_text().unwrap().contains("Mode set to 2 (Mixed)"));
}

#[test]
fn status_and_help_replies_carry_live_values() {
    let (mut svc, mut hw, mut net, mut nvs, mut sink) = fresh();
    deliver(1, "/status", &mut svc, &mut hw, &mut net, &mut nvs, &mut sink);
    let status = net.last_text().unwrap().to_string();
    assert!(status.contains("IP: 192.168.1.50"));
    assert!(status.contains("WiFi: -58 dBm"));
    assert!(status.contains("Captured: 0"));
    assert!(status.contains("Pan: 90"));

    deliver(2, "/help", &mut svc, &mut hw, &mut net, &mut nvs, &mut sink);
    assert!(net.last_text().unwrap().contains("/capture"));

    deliver(3, "/debug", &mut svc, &mut hw, &mut net, &mut nvs, &mut sink);
    assert!(net.last_text().unwrap().contains("freeHeap"));
}

// ── At-most-once delivery ────────────────────────────────────

#[test]
fn offset_is_persisted_before_the_command_runs() {
    let log = journal();
    let (mut svc, mut hw, mut net, mut nvs, mut sink) = fresh();
    nvs.journal = Some(log.clone());
    net.journal = Some(log.clone());

    deliver(7, "/capture", &mut svc, &mut hw, &mut net, &mut nvs, &mut sink);

    let entries = log.borrow();
    let saved = entries.iter().position(|e| e == "nvs:tg_offset").unwrap();
    let first_effect = entries
        .iter()
        .position(|e| e.starts_with("text:") || e.starts_with("photo:"))
        .unwrap();
    assert!(saved < first_effect, "journal: {entries:?}");
    assert_eq!(net.photos.len(), 1);
}

#[test]
fn command_is_not_replayed_after_a_crash() {
    let (mut svc, mut hw, mut net, mut nvs, mut sink) = fresh();
    deliver(41, "/capture", &mut svc, &mut hw, &mut net, &mut nvs, &mut sink);
    assert_eq!(net.photos.len(), 1);

    // Reboot: new service on the same flash, the update is still pending
    // on the server.
    let mut svc = make_service(FirmwareConfig::default(), &nvs, ResetReason::Panic);
    hw.set_now(0);
    svc.tick(&mut hw, &mut net, &mut nvs, &mut sink);

    assert_eq!(net.polls.last(), Some(&41));
    assert_eq!(net.photos.len(), 1);
}

#[test]
fn unsaved_offset_is_not_dispatched() {
    let (mut svc, mut hw, mut net, mut nvs, mut sink) = fresh();
    nvs.failing.push(OFFSET_KEY);

    deliver(5, "/capture", &mut svc, &mut hw, &mut net, &mut nvs, &mut sink);
    assert!(net.photos.is_empty());
    assert!(net.texts.is_empty());
    assert!(svc.telemetry().debug.contains("Offset save failed"));
}

#[test]
fn non_text_updates_still_advance_the_offset() {
    let (mut svc, mut hw, mut net, mut nvs, mut sink) = fresh();
    net.pending.push(InboundMessage {
        sequence: 9,
        text: None,
        sender: None,
    });
    hw.set_now(POLL_GAP_MS);
    svc.tick(&mut hw, &mut net, &mut nvs, &mut sink);

    assert_eq!(nvs.store.get(OFFSET_KEY).map(Vec::as_slice), Some(&9u64.to_le_bytes()[..]));
    assert!(net.texts.is_empty());
    assert_eq!(
        sink.count(|e| matches!(e, AppEvent::CommandReceived { sequence: 9, name: "none" })),
        1
    );
}

#[test]
fn link_down_skips_polling() {
    let (mut svc, mut hw, _, mut nvs, mut sink) = fresh();
    let mut net = MockNetwork::offline();
    net.push_text(1, "/capture");
    svc.tick(&mut hw, &mut net, &mut nvs, &mut sink);
    assert!(net.polls.is_empty());
}

#[test]
fn poll_failure_lands_in_telemetry() {
    let (mut svc, mut hw, mut net, mut nvs, mut sink) = fresh();
    net.poll_error = Some(MessagingError::Timeout);
    svc.tick(&mut hw, &mut net, &mut nvs, &mut sink);
    assert!(svc.telemetry().debug.contains("Poll failed"));
    assert_eq!(sink.count(|e| matches!(e, AppEvent::PollFailed(MessagingError::Timeout))), 1);
    assert_eq!(nvs.writes_to(OFFSET_KEY), 0);
}

// ── Restart debounce ─────────────────────────────────────────

#[test]
fn reboot_right_after_software_reset_is_ignored() {
    let nvs_seed = MockNvs::new();
    let mut svc = make_service(FirmwareConfig::default(), &nvs_seed, ResetReason::Software);
    let (mut hw, mut net, mut nvs, mut sink) =
        (MockBoard::new(), MockNetwork::new(), nvs_seed, RecordingSink::new());

    deliver(1, "/reboot", &mut svc, &mut hw, &mut net, &mut nvs, &mut sink);
    assert_eq!(hw.restarts, 0);
    assert!(net.last_text().unwrap().contains("Restart ignored"));

    hw.set_now(40_000);
    deliver(2, "/restart", &mut svc, &mut hw, &mut net, &mut nvs, &mut sink);
    assert_eq!(hw.restarts, 1);
    assert!(hw.delays.contains(&800));
    assert!(nvs.writes_to(SETTINGS_KEY) >= 1, "settings flushed before restart");
}

#[test]
fn duplicate_reboot_within_window_is_ignored() {
    let (mut svc, mut hw, mut net, mut nvs, mut sink) = fresh();
    deliver(1, "/reboot", &mut svc, &mut hw, &mut net, &mut nvs, &mut sink);
    deliver(2, "/reboot", &mut svc, &mut hw, &mut net, &mut nvs, &mut sink);
    assert_eq!(hw.restarts, 1);
    assert_eq!(sink.count(|e| matches!(e, AppEvent::RestartIgnored)), 1);
}

// ── Deferred persistence ─────────────────────────────────────

#[test]
fn settings_changes_coalesce_into_one_write_per_window() {
    let (mut svc, mut hw, mut net, mut nvs, mut sink) = fresh();

    // t=2000: first change, first write after boot goes straight out.
    deliver(1, "/mode 2", &mut svc, &mut hw, &mut net, &mut nvs, &mut sink);
    assert_eq!(nvs.writes_to(SETTINGS_KEY), 1);

    // t=4000 and t=6000: inside the 5 s window.
    deliver(2, "/interval 10", &mut svc, &mut hw, &mut net, &mut nvs, &mut sink);
    deliver(3, "/threshold 8000", &mut svc, &mut hw, &mut net, &mut nvs, &mut sink);
    assert_eq!(nvs.writes_to(SETTINGS_KEY), 1);

    hw.set_now(7_000);
    svc.tick(&mut hw, &mut net, &mut nvs, &mut sink);
    assert_eq!(nvs.writes_to(SETTINGS_KEY), 2);

    let reloaded = SettingsStore::load(&nvs, &FirmwareConfig::default());
    assert_eq!(reloaded.settings().capture_mode, CaptureMode::Mixed);
    assert_eq!(reloaded.settings().interval_minutes, 10);
    assert_eq!(reloaded.settings().motion_threshold, 8000);
}

#[test]
fn unchanged_value_does_not_dirty_the_store() {
    let (mut svc, mut hw, mut net, mut nvs, mut sink) = fresh();
    deliver(1, "/threshold 5000", &mut svc, &mut hw, &mut net, &mut nvs, &mut sink);
    assert!(!svc.store().is_dirty());
    assert_eq!(nvs.writes_to(SETTINGS_KEY), 0);
}

// ── Pan ──────────────────────────────────────────────────────

#[test]
fn left_and_right_move_smoothly_and_persist() {
    let (mut svc, mut hw, mut net, mut nvs, mut sink) = fresh();
    svc.start(&mut hw, &mut sink);
    assert_eq!(hw.last_angle(), Some(90));

    deliver(1, "/left 20", &mut svc, &mut hw, &mut net, &mut nvs, &mut sink);
    assert_eq!(svc.pan_position(), Some(70));
    assert_eq!(hw.last_angle(), Some(70));
    // One write per degree after the initial attach.
    assert_eq!(hw.angles.len(), 1 + 20);
    assert!(net.last_text().unwrap().contains("Pan: 70"));

    deliver(2, "/right", &mut svc, &mut hw, &mut net, &mut nvs, &mut sink);
    assert_eq!(svc.pan_position(), Some(75));

    deliver(3, "/pan 500", &mut svc, &mut hw, &mut net, &mut nvs, &mut sink);
    assert_eq!(svc.pan_position(), Some(170));
    assert_eq!(svc.settings().pan_angle, Some(170));

    deliver(4, "/center", &mut svc, &mut hw, &mut net, &mut nvs, &mut sink);
    assert_eq!(svc.pan_position(), Some(90));
}

#[test]
fn pan_commands_without_servo_are_rejected() {
    let nvs_seed = MockNvs::new();
    let config = FirmwareConfig {
        servo_fitted: false,
        ..FirmwareConfig::default()
    };
    let mut svc = make_service(config, &nvs_seed, ResetReason::PowerOn);
    let (mut hw, mut net, mut nvs, mut sink) =
        (MockBoard::new(), MockNetwork::new(), nvs_seed, RecordingSink::new());
    hw.servo_fitted = false;

    deliver(1, "/left", &mut svc, &mut hw, &mut net, &mut nvs, &mut sink);
    assert!(net.last_text().unwrap().contains("no pan servo fitted"));
    deliver(2, "/sweep", &mut svc, &mut hw, &mut net, &mut nvs, &mut sink);
    assert!(net.last_text().unwrap().contains("no pan servo fitted"));
    assert!(hw.angles.is_empty());
    assert_eq!(svc.settings().pan_angle, None);
}

#[test]
fn sweep_captures_at_every_stop_then_recenters() {
    let (mut svc, mut hw, mut net, mut nvs, mut sink) = fresh();
    deliver(1, "/sweep", &mut svc, &mut hw, &mut net, &mut nvs, &mut sink);

    // 10, 20, ..., 170
    assert_eq!(net.photos.len(), 17);
    assert!(net.photos.iter().all(|(caption, _)| caption.starts_with("Sweep")));
    assert_eq!(svc.pan_position(), Some(90));
    assert!(net.last_text().unwrap().contains("Sweep done: 17/17 sent"));
    assert_eq!(hw.outstanding(), 0);
}

// ── Connectivity test ────────────────────────────────────────

#[test]
fn test_command_does_not_move_counters() {
    let (mut svc, mut hw, mut net, mut nvs, mut sink) = fresh();
    deliver(1, "/test", &mut svc, &mut hw, &mut net, &mut nvs, &mut sink);

    assert_eq!(net.photos.len(), 1);
    assert!(net.texts_containing("Text messages work") == 1);
    assert_eq!(svc.settings().captured_count, 0);
    assert_eq!(svc.settings().sent_count, 0);
    assert!(svc.telemetry().debug.contains("Test passed"));
}

#[test]
fn tick_feeds_the_watchdog() {
    let (mut svc, mut hw, mut net, mut nvs, mut sink) = fresh();
    svc.tick(&mut hw, &mut net, &mut nvs, &mut sink);
    assert!(hw.watchdog_feeds >= 1);
}
