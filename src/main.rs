//! CamWatch Firmware: Main Entry Point
//!
//! Hexagonal architecture on a single cooperative thread.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  BoardAdapter          LogEventSink   NvsAdapter   StatusServer │
//! │  (Camera+Servo+Clock   (EventSink)    (Storage)    (LAN HTTP)   │
//! │   +System)                                                     │
//! │  Uplink = WifiAdapter (Link) + TelegramClient<TlsClient>       │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              CameraService (pure logic)                │    │
//! │  │  Planner · Motion · Poller · Pan · SettingsStore       │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

// ── Imports ───────────────────────────────────────────────────
use anyhow::Result;
use log::{error, info, warn};

use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::ledc::{LedcDriver, LedcTimerDriver, Resolution, config::TimerConfig};
use esp_idf_svc::hal::peripherals::Peripherals;
use esp_idf_svc::hal::units::Hertz;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::wifi::{BlockingWifi, EspWifi};

use camwatch::adapters::hardware::BoardAdapter;
use camwatch::adapters::log_sink::LogEventSink;
use camwatch::adapters::nvs::NvsAdapter;
use camwatch::adapters::status_server::StatusServer;
use camwatch::adapters::time::Esp32TimeAdapter;
use camwatch::adapters::tls_client::TlsClient;
use camwatch::adapters::uplink::Uplink;
use camwatch::adapters::wifi::WifiAdapter;
use camwatch::app::ports::{ClockPort, SystemPort};
use camwatch::app::service::{CameraService, LocalStatus};
use camwatch::config::FirmwareConfig;
use camwatch::diagnostics::ResetReason;
use camwatch::drivers::camera::CameraDriver;
use camwatch::drivers::servo::ServoDriver;
use camwatch::drivers::watchdog::Watchdog;
use camwatch::error::Error;
use camwatch::pins;
use camwatch::storage::SettingsStore;
use camwatch::telegram::TelegramClient;

/// Main-loop pacing between ticks.
const LOOP_DELAY_MS: u32 = 20;

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  CamWatch v{}                        ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    let reset_reason = ResetReason::current();
    info!("Boot: reset reason {}", reset_reason);

    let config = FirmwareConfig::default();
    config.validate().map_err(Error::Config)?;
    if !config.has_messaging_credentials() {
        warn!("No bot token / chat id configured, uploads will fail");
    }

    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;

    // ── 2. Persistent settings ────────────────────────────────
    // The default partition handle initialises NVS for the WiFi driver;
    // the settings adapter shares the same partition.
    let nvs_partition = EspDefaultNvsPartition::take()?;
    let mut nvs = NvsAdapter::new().map_err(Error::Storage)?;
    let store = SettingsStore::load(&nvs, &config);

    // ── 3. Camera ─────────────────────────────────────────────
    let camera = match CameraDriver::init() {
        Ok(c) => c,
        Err(e) => {
            // Without a sensor there is nothing useful to do; a fresh boot
            // usually recovers a wedged SCCB bus.
            error!("Camera init failed: {}, restarting", e);
            let mut clock = Esp32TimeAdapter::new();
            clock.delay_ms(1000);
            esp_idf_svc::hal::reset::restart();
        }
    };

    // ── 4. Pan servo (LEDC timer1 / channel2, 50 Hz, 14-bit) ──
    let servo_timer = LedcTimerDriver::new(
        peripherals.ledc.timer1,
        &TimerConfig::default()
            .frequency(Hertz(pins::SERVO_PWM_FREQ_HZ))
            .resolution(Resolution::Bits14),
    )?;
    let servo = if config.servo_fitted {
        let pwm = LedcDriver::new(peripherals.ledc.channel2, &servo_timer, peripherals.pins.gpio14)?;
        ServoDriver::new(pwm)
    } else {
        ServoDriver::absent()
    };

    // ── 5. Board adapter + watchdog ───────────────────────────
    let watchdog = Watchdog::new(config.watchdog_timeout_secs);
    let mut board = BoardAdapter::new(camera, servo, Esp32TimeAdapter::new(), watchdog);

    // ── 6. Network: WiFi station + Telegram over esp-tls ──────
    let esp_wifi = EspWifi::new(peripherals.modem, sysloop.clone(), Some(nvs_partition))?;
    let mut wifi = WifiAdapter::new(BlockingWifi::wrap(esp_wifi, sysloop)?, &config);
    if let Err(e) = wifi.connect() {
        warn!("WiFi: {}, will keep retrying in the background", e);
    }
    let mut uplink = Uplink::new(wifi, TelegramClient::new(TlsClient::new(), &config));

    // ── 7. Local status server ────────────────────────────────
    let mut server = match StatusServer::bind(config.status_port) {
        Ok(s) => Some(s),
        Err(e) => {
            warn!("StatusServer: bind on port {} failed: {}", config.status_port, e);
            None
        }
    };

    // ── 8. Application service ────────────────────────────────
    let mut sink = LogEventSink::new();
    let mut service = CameraService::new(config, store, board.now_ms(), reset_reason);
    service.start(&mut board, &mut sink);

    info!("System ready. Entering main loop.");

    // ── 9. Main loop ──────────────────────────────────────────
    loop {
        uplink.link_mut().poll(board.now_ms());

        service.tick(&mut board, &mut uplink, &mut nvs, &mut sink);

        if let Some(server) = server.as_mut() {
            let action = {
                let mut status = LocalStatus::new(&mut service, &mut board, &uplink, &mut sink);
                server.poll(&mut status)
            };
            if let Some(action) = action {
                service.run_local_action(action, &mut board, &mut uplink, &mut sink);
            }
        }

        board.feed_watchdog();
        board.delay_ms(LOOP_DELAY_MS);
    }
}
