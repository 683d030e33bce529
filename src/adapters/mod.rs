//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter         | Implements                   | Connects to               |
//! |-----------------|------------------------------|---------------------------|
//! | `hardware`      | CameraPort, ServoPort,       | esp32-camera, LEDC PWM,   |
//! |                 | ClockPort, SystemPort        | esp_timer, TWDT           |
//! | `log_sink`      | EventSink                    | Serial log output         |
//! | `nvs`           | StoragePort                  | NVS / in-memory store     |
//! | `status_server` | (driving) StatusProvider     | LAN HTTP on port 80       |
//! | `time`          | ClockPort                    | ESP32 system timer        |
//! | `tls_client`    | Transport                    | esp-tls / plain TCP (sim) |
//! | `uplink`        | LinkPort + MessagingPort     | wifi + Telegram client    |
//! | `wifi`          | LinkPort                     | ESP-IDF WiFi STA          |

pub mod hardware;
pub mod log_sink;
pub mod nvs;
pub mod status_server;
pub mod time;
pub mod tls_client;
pub mod uplink;
pub mod wifi;
