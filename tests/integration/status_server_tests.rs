//! Local status server over a real loopback socket.
//!
//! The server is polled from the test thread exactly as the main loop
//! does it; a client thread plays the browser.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::thread;
use std::time::{Duration, Instant};

use camwatch::adapters::status_server::{REQUEST_DEADLINE, StatusServer};
use camwatch::app::commands::LocalAction;
use camwatch::app::service::{CameraService, LocalStatus};
use camwatch::config::FirmwareConfig;
use camwatch::diagnostics::ResetReason;
use camwatch::storage::SettingsStore;

use crate::mock_hw::{MockBoard, MockNetwork, MockNvs, RecordingSink};

struct Rig {
    server: StatusServer,
    svc: CameraService,
    hw: MockBoard,
    net: MockNetwork,
    sink: RecordingSink,
}

impl Rig {
    fn new() -> Self {
        let cfg = FirmwareConfig::default();
        let store = SettingsStore::load(&MockNvs::new(), &cfg);
        Self {
            server: StatusServer::bind_addr("127.0.0.1:0").unwrap(),
            svc: CameraService::new(cfg, store, 0, ResetReason::PowerOn),
            hw: MockBoard::new(),
            net: MockNetwork::new(),
            sink: RecordingSink::new(),
        }
    }

    /// Send `raw` from a client thread and serve it; returns the response
    /// text and any deferred action.
    fn exchange(&mut self, raw: &str) -> (String, Option<LocalAction>) {
        let port = self.server.local_port().unwrap();
        let request = raw.to_string();
        let client = thread::spawn(move || {
            let mut s = TcpStream::connect(("127.0.0.1", port)).unwrap();
            s.write_all(request.as_bytes()).unwrap();
            let mut out = String::new();
            s.read_to_string(&mut out).unwrap();
            out
        });

        let served_before = self.server.served();
        let mut action = None;
        for _ in 0..500 {
            let mut status = LocalStatus::new(&mut self.svc, &mut self.hw, &self.net, &mut self.sink);
            action = self.server.poll(&mut status);
            if self.server.served() > served_before {
                break;
            }
            thread::sleep(Duration::from_millis(5));
        }
        (client.join().unwrap(), action)
    }
}

fn post_json(path: &str, body: &str) -> String {
    format!(
        "POST {path} HTTP/1.1\r\nHost: cam\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{body}",
        body.len()
    )
}

#[test]
fn status_route_serves_json_snapshot() {
    let mut rig = Rig::new();
    rig.hw.set_now(3_723_000);
    let (resp, action) = rig.exchange("GET /status HTTP/1.1\r\nHost: cam\r\n\r\n");

    assert!(resp.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(resp.contains("Content-Type: application/json"));
    assert!(resp.contains("\"capturedCount\":0"));
    assert!(resp.contains("\"currentMode\":\"Motion Detection\""));
    assert!(resp.contains("\"uptime\":\"01:02:03\""));
    assert_eq!(action, None);
}

#[test]
fn debug_route_reports_rssi() {
    let mut rig = Rig::new();
    let (resp, _) = rig.exchange("GET /debug HTTP/1.1\r\n\r\n");
    assert!(resp.contains("\"wifiRSSI\":-58"));
    assert!(resp.contains("\"resetReason\""));
}

#[test]
fn save_settings_goes_through_validation() {
    let mut rig = Rig::new();

    let (resp, _) = rig.exchange(&post_json("/save-settings", r#"{"mode":2,"interval":15}"#));
    assert!(resp.starts_with("HTTP/1.1 200 OK"));
    assert_eq!(rig.svc.settings().interval_minutes, 15);
    assert!(rig.svc.store().is_dirty());

    let (resp, _) = rig.exchange(&post_json("/save-settings", r#"{"interval":0}"#));
    assert!(resp.starts_with("HTTP/1.1 400"));
    assert!(resp.contains("interval must be"));
    assert_eq!(rig.svc.settings().interval_minutes, 15);

    let (resp, _) = rig.exchange(&post_json("/save-settings", "{not json"));
    assert!(resp.starts_with("HTTP/1.1 400"));
}

#[test]
fn capture_now_is_deferred_to_the_main_loop() {
    let mut rig = Rig::new();
    let (resp, action) = rig.exchange("GET /capture-now HTTP/1.1\r\n\r\n");
    assert!(resp.starts_with("HTTP/1.1 200 OK"));
    assert_eq!(action, Some(LocalAction::CaptureNow));
    assert!(rig.net.photos.is_empty(), "nothing runs inside the request");

    rig.svc
        .run_local_action(LocalAction::CaptureNow, &mut rig.hw, &mut rig.net, &mut rig.sink);
    assert_eq!(rig.net.photos.len(), 1);
    assert!(rig.net.photos[0].0.starts_with("Manual"));
    assert_eq!(rig.svc.settings().captured_count, 1);
}

#[test]
fn stream_returns_a_snapshot_and_releases_it() {
    let mut rig = Rig::new();
    rig.hw.default_frame = Some(3_000);
    let (resp, action) = rig.exchange("GET /stream HTTP/1.1\r\n\r\n");
    assert!(resp.starts_with("HTTP/1.1 200 OK"));
    assert!(resp.contains("Content-Type: image/jpeg"));
    assert!(resp.contains("Content-Length: 3000\r\n"));
    assert_eq!(action, None);
    assert_eq!(rig.hw.acquired, 1);
    assert_eq!(rig.hw.outstanding(), 0);
    assert_eq!(rig.svc.settings().captured_count, 0);

    rig.hw.default_frame = None;
    let (resp, _) = rig.exchange("GET /stream HTTP/1.1\r\n\r\n");
    assert!(resp.starts_with("HTTP/1.1 500"));
}

#[test]
fn slow_sender_is_cut_off_at_the_deadline() {
    let mut rig = Rig::new();
    let port = rig.server.local_port().unwrap();
    let client = thread::spawn(move || {
        let mut s = TcpStream::connect(("127.0.0.1", port)).unwrap();
        s.set_read_timeout(Some(Duration::from_millis(100))).unwrap();
        let mut got = Vec::new();
        let mut buf = [0u8; 256];
        for b in "GET /status HTTP/1.1\r\nX-Pad: ".bytes().chain(std::iter::repeat(b'a')).take(80) {
            if s.write_all(&[b]).is_err() {
                break;
            }
            // The read timeout doubles as the pause between bytes.
            match s.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    got.extend_from_slice(&buf[..n]);
                    let _ = s.read_to_end(&mut got);
                    break;
                }
                Err(_) => {}
            }
        }
        String::from_utf8_lossy(&got).into_owned()
    });

    let mut longest = Duration::ZERO;
    let waited = Instant::now();
    while rig.server.served() == 0 && waited.elapsed() < Duration::from_secs(10) {
        let started = Instant::now();
        let mut status = LocalStatus::new(&mut rig.svc, &mut rig.hw, &rig.net, &mut rig.sink);
        let _ = rig.server.poll(&mut status);
        longest = longest.max(started.elapsed());
        thread::sleep(Duration::from_millis(5));
    }

    assert_eq!(rig.server.served(), 1);
    assert!(
        longest < REQUEST_DEADLINE + Duration::from_millis(500),
        "one poll held the loop for {longest:?}"
    );
    assert!(client.join().unwrap().starts_with("HTTP/1.1 408"));
}

#[test]
fn unknown_paths_and_wrong_methods() {
    let mut rig = Rig::new();
    let (resp, _) = rig.exchange("GET / HTTP/1.1\r\n\r\n");
    assert!(resp.starts_with("HTTP/1.1 404"));
    let (resp, _) = rig.exchange("POST /status HTTP/1.1\r\nContent-Length: 0\r\n\r\n");
    assert!(resp.starts_with("HTTP/1.1 405"));
    assert_eq!(rig.server.served(), 2);
}
