//! Capture → upload through the real Telegram client.
//!
//! The service is wired to `Uplink<UpLink, TelegramClient<ScriptedTransport>>`
//! so the multipart streaming, response parsing and session teardown all
//! run for real; only the bytes on the wire are scripted.

use camwatch::adapters::uplink::Uplink;
use camwatch::app::events::{CaptureKind, CaptureOutcome};
use camwatch::app::ports::MessagingError;
use camwatch::app::service::CameraService;
use camwatch::config::{FirmwareConfig, truncated};
use camwatch::diagnostics::ResetReason;
use camwatch::storage::SettingsStore;
use camwatch::storage::offset::OFFSET_KEY;
use camwatch::telegram::TelegramClient;

use crate::mock_hw::{MockBoard, MockNvs, RecordingSink, ScriptedTransport, UpLink};

type Wire = Uplink<UpLink, TelegramClient<ScriptedTransport>>;

fn config() -> FirmwareConfig {
    FirmwareConfig {
        bot_token: truncated("4242:XYZ"),
        chat_id: truncated("-100555"),
        upload_chunk_size: 512,
        ..FirmwareConfig::default()
    }
}

fn rig(transport: ScriptedTransport) -> (CameraService, MockBoard, Wire, RecordingSink) {
    let cfg = config();
    let store = SettingsStore::load(&MockNvs::new(), &cfg);
    let wire = Uplink::new(UpLink, TelegramClient::new(transport, &cfg));
    (
        CameraService::new(cfg, store, 0, ResetReason::PowerOn),
        MockBoard::new(),
        wire,
        RecordingSink::new(),
    )
}

#[test]
fn acknowledged_upload_streams_the_whole_frame() {
    let (mut svc, mut hw, mut wire, mut sink) = rig(ScriptedTransport::ok());

    let out = svc.capture(CaptureKind::Remote, &mut hw, &mut wire, &mut sink);
    assert_eq!(out, CaptureOutcome::Sent { bytes: 20_000 });
    assert_eq!(hw.outstanding(), 0);

    let t = wire.messaging().transport();
    assert_eq!((t.connects, t.closes), (1, 1));
    let sent = String::from_utf8_lossy(&t.written);
    assert!(sent.starts_with("POST /bot4242:XYZ/sendPhoto HTTP/1.1\r\n"));
    let head_end = sent.find("\r\n\r\n").unwrap() + 4;
    let declared: usize = sent
        .lines()
        .find_map(|l| l.strip_prefix("Content-Length: "))
        .unwrap()
        .parse()
        .unwrap();
    assert_eq!(t.written.len() - head_end, declared);
    assert!(declared > 20_000);
    assert!(svc.telemetry().last_upload_result.starts_with("Success"));
}

#[test]
fn refused_connect_releases_the_frame() {
    let mut transport = ScriptedTransport::ok();
    transport.refuse_connect = true;
    let (mut svc, mut hw, mut wire, mut sink) = rig(transport);

    let out = svc.capture(CaptureKind::Remote, &mut hw, &mut wire, &mut sink);
    assert_eq!(
        out,
        CaptureOutcome::UploadFailed {
            bytes: 20_000,
            error: MessagingError::Connect
        }
    );
    assert_eq!(hw.outstanding(), 0);
    assert_eq!(wire.messaging().transport().closes, 1);
    assert_eq!(svc.settings().sent_count, 0);
}

#[test]
fn mid_stream_write_failure_releases_the_frame() {
    let mut transport = ScriptedTransport::ok();
    transport.write_budget = Some(5_000);
    let (mut svc, mut hw, mut wire, mut sink) = rig(transport);

    let out = svc.capture(CaptureKind::Remote, &mut hw, &mut wire, &mut sink);
    assert_eq!(
        out,
        CaptureOutcome::UploadFailed {
            bytes: 20_000,
            error: MessagingError::Write
        }
    );
    assert_eq!(hw.outstanding(), 0);
    let t = wire.messaging().transport();
    assert_eq!(t.written.len(), 5_000);
    assert_eq!(t.closes, 1);
}

#[test]
fn rejected_upload_is_reported_with_status() {
    let transport = ScriptedTransport::answering(
        "HTTP/1.1 413 Request Entity Too Large\r\n\r\n{\"ok\":false,\"description\":\"too big\"}",
    );
    let (mut svc, mut hw, mut wire, mut sink) = rig(transport);

    let out = svc.capture(CaptureKind::Remote, &mut hw, &mut wire, &mut sink);
    assert!(matches!(
        out,
        CaptureOutcome::UploadFailed {
            error: MessagingError::Http(413),
            ..
        }
    ));
    assert!(svc.telemetry().last_upload_result.contains("413"));
}

#[test]
fn unacknowledged_200_is_a_failure() {
    let transport = ScriptedTransport::answering("HTTP/1.1 200 OK\r\n\r\n{\"ok\":false}");
    let (mut svc, mut hw, mut wire, mut sink) = rig(transport);

    let out = svc.capture(CaptureKind::Remote, &mut hw, &mut wire, &mut sink);
    assert!(!out.is_sent());
    assert_eq!(svc.settings().captured_count, 1);
    assert_eq!(svc.settings().sent_count, 0);
}

#[test]
fn remote_capture_round_trip_over_the_wire() {
    // Every request gets the same canned body: a getUpdates answer that
    // also reads as `"ok":true` for sendMessage and sendPhoto.
    let transport = ScriptedTransport::answering(
        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\n\r\n\
         {\"ok\":true,\"result\":[{\"update_id\":55,\"message\":{\"text\":\"/photo\",\
         \"from\":{\"id\":1,\"username\":\"owner\"},\"chat\":{\"id\":-100555}}}]}",
    );
    let (mut svc, mut hw, mut wire, mut sink) = rig(transport);
    let mut nvs = MockNvs::new();

    svc.tick(&mut hw, &mut wire, &mut nvs, &mut sink);

    // getUpdates, "Capturing photo..." reply, sendPhoto
    let t = wire.messaging().transport();
    assert_eq!(t.connects, 3);
    assert_eq!(t.closes, 3);
    let sent = String::from_utf8_lossy(&t.written);
    assert!(sent.contains("GET /bot4242:XYZ/getUpdates?offset=1&limit=1&timeout=1"));
    assert!(sent.contains("/sendMessage"));
    assert!(sent.contains("/sendPhoto"));

    assert_eq!(nvs.store.get(OFFSET_KEY).map(Vec::as_slice), Some(&55u64.to_le_bytes()[..]));
    assert_eq!(svc.settings().sent_count, 1);
    assert_eq!(hw.outstanding(), 0);
}
