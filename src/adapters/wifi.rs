//! WiFi station-mode adapter.
//!
//! Implements [`LinkPort`], the read-side view the core uses to decide
//! whether network work is worth attempting.  Bring-up and reconnection
//! are driven from `main` through [`WifiAdapter::connect`] and
//! [`WifiAdapter::poll`].
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: `BlockingWifi<EspWifi>` from `esp_idf_svc::wifi`.
//! - **all other targets**: an in-memory link for host-side tests.
//!
//! ## Reconnection policy
//!
//! Boot makes a bounded number of join attempts (the device keeps running
//! offline if all fail).  Afterwards, a lost link is retried from `poll`
//! with exponential backoff (2 s → 4 s → 8 s … capped at 60 s).

use core::fmt;
use core::net::Ipv4Addr;

use log::{error, info, warn};

use crate::app::ports::LinkPort;
use crate::config::FirmwareConfig;

#[cfg(target_os = "espidf")]
use esp_idf_svc::wifi::{AuthMethod, BlockingWifi, ClientConfiguration, Configuration, EspWifi};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityError {
    NoCredentials,
    InvalidSsid,
    InvalidPassword,
    ConnectionFailed,
}

impl fmt::Display for ConnectivityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoCredentials => write!(f, "no WiFi credentials configured"),
            Self::InvalidSsid => write!(f, "SSID invalid (must be 1-32 printable ASCII bytes)"),
            Self::InvalidPassword => write!(f, "password invalid (must be 8-64 bytes for WPA2, or empty for open)"),
            Self::ConnectionFailed => write!(f, "WiFi connection failed"),
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Connection state
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WifiState {
    Disconnected,
    Connected,
    Reconnecting { attempt: u32, next_try_ms: u64 },
}

/// Join attempts made by [`WifiAdapter::connect`] before giving up.
pub const BOOT_ATTEMPTS: u32 = 3;
const MIN_BACKOFF_MS: u32 = 2_000;
const MAX_BACKOFF_MS: u32 = 60_000;

// ───────────────────────────────────────────────────────────────
// Validation
// ───────────────────────────────────────────────────────────────

fn is_printable_ascii(s: &str) -> bool {
    s.bytes().all(|b| (0x20..=0x7E).contains(&b))
}

fn validate_ssid(ssid: &str) -> Result<(), ConnectivityError> {
    if ssid.is_empty() {
        return Err(ConnectivityError::NoCredentials);
    }
    if ssid.len() > 32 || !is_printable_ascii(ssid) {
        return Err(ConnectivityError::InvalidSsid);
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), ConnectivityError> {
    if password.is_empty() {
        return Ok(());
    }
    if password.len() < 8 || password.len() > 64 {
        return Err(ConnectivityError::InvalidPassword);
    }
    Ok(())
}

// ───────────────────────────────────────────────────────────────
// WiFi adapter
// ───────────────────────────────────────────────────────────────

pub struct WifiAdapter {
    state: WifiState,
    ssid: heapless::String<32>,
    password: heapless::String<64>,
    backoff_ms: u32,
    last_rssi: Option<i8>,
    ip: Option<Ipv4Addr>,
    #[cfg(target_os = "espidf")]
    wifi: BlockingWifi<EspWifi<'static>>,
    /// Simulation: whether the "AP" is reachable.
    #[cfg(not(target_os = "espidf"))]
    sim_ap_up: bool,
}

impl WifiAdapter {
    #[cfg(target_os = "espidf")]
    pub fn new(wifi: BlockingWifi<EspWifi<'static>>, config: &FirmwareConfig) -> Self {
        Self::with_platform(config, wifi)
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn new(config: &FirmwareConfig) -> Self {
        Self::with_platform(config, true)
    }

    #[cfg(target_os = "espidf")]
    fn with_platform(config: &FirmwareConfig, wifi: BlockingWifi<EspWifi<'static>>) -> Self {
        Self {
            state: WifiState::Disconnected,
            ssid: config.wifi_ssid.clone(),
            password: config.wifi_pass.clone(),
            backoff_ms: MIN_BACKOFF_MS,
            last_rssi: None,
            ip: None,
            wifi,
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn with_platform(config: &FirmwareConfig, sim_ap_up: bool) -> Self {
        Self {
            state: WifiState::Disconnected,
            ssid: config.wifi_ssid.clone(),
            password: config.wifi_pass.clone(),
            backoff_ms: MIN_BACKOFF_MS,
            last_rssi: None,
            ip: None,
            sim_ap_up,
        }
    }

    pub fn state(&self) -> WifiState {
        self.state
    }

    /// Boot-time join: up to [`BOOT_ATTEMPTS`] tries.
    pub fn connect(&mut self) -> Result<(), ConnectivityError> {
        validate_ssid(&self.ssid)?;
        validate_password(&self.password)?;

        info!("WiFi: connecting to '{}'", self.ssid);
        let mut last = ConnectivityError::ConnectionFailed;
        for attempt in 1..=BOOT_ATTEMPTS {
            match self.platform_connect() {
                Ok(()) => {
                    self.on_connected();
                    return Ok(());
                }
                Err(e) => {
                    warn!("WiFi: attempt {}/{} failed: {}", attempt, BOOT_ATTEMPTS, e);
                    last = e;
                }
            }
        }
        error!("WiFi: giving up, continuing offline");
        self.state = WifiState::Reconnecting {
            attempt: 0,
            next_try_ms: 0,
        };
        Err(last)
    }

    /// Watch the link and retry with backoff once it is lost.
    pub fn poll(&mut self, now_ms: u64) {
        match self.state {
            WifiState::Connected => {
                if self.platform_is_connected() {
                    self.last_rssi = self.platform_rssi();
                } else {
                    warn!("WiFi: connection lost, entering reconnect");
                    self.last_rssi = None;
                    self.ip = None;
                    self.backoff_ms = MIN_BACKOFF_MS;
                    self.state = WifiState::Reconnecting {
                        attempt: 0,
                        next_try_ms: now_ms + u64::from(MIN_BACKOFF_MS),
                    };
                }
            }
            WifiState::Reconnecting {
                attempt,
                next_try_ms,
            } if now_ms >= next_try_ms => {
                info!("WiFi: reconnect attempt {} (backoff {} ms)", attempt, self.backoff_ms);
                if self.platform_connect().is_ok() {
                    self.on_connected();
                } else {
                    self.backoff_ms = (self.backoff_ms * 2).min(MAX_BACKOFF_MS);
                    self.state = WifiState::Reconnecting {
                        attempt: attempt + 1,
                        next_try_ms: now_ms + u64::from(self.backoff_ms),
                    };
                }
            }
            WifiState::Reconnecting { .. } | WifiState::Disconnected => {}
        }
    }

    fn on_connected(&mut self) {
        self.state = WifiState::Connected;
        self.backoff_ms = MIN_BACKOFF_MS;
        self.last_rssi = self.platform_rssi();
        self.ip = self.platform_ip();
        info!(
            "WiFi: connected, IP {} (RSSI={:?})",
            self.ip.map_or_else(|| "-".to_string(), |ip| ip.to_string()),
            self.last_rssi
        );
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_connect(&mut self) -> Result<(), ConnectivityError> {
        let auth_method = if self.password.is_empty() {
            AuthMethod::None
        } else {
            AuthMethod::WPA2Personal
        };
        let client = ClientConfiguration {
            ssid: self
                .ssid
                .as_str()
                .try_into()
                .map_err(|_| ConnectivityError::InvalidSsid)?,
            password: self
                .password
                .as_str()
                .try_into()
                .map_err(|_| ConnectivityError::InvalidPassword)?,
            auth_method,
            ..Default::default()
        };
        let result = (|| {
            self.wifi.set_configuration(&Configuration::Client(client))?;
            if !self.wifi.is_started()? {
                self.wifi.start()?;
            }
            self.wifi.connect()?;
            self.wifi.wait_netif_up()
        })();
        result.map_err(|e| {
            warn!("WiFi: {}", e);
            ConnectivityError::ConnectionFailed
        })
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_connect(&mut self) -> Result<(), ConnectivityError> {
        if self.sim_ap_up {
            Ok(())
        } else {
            Err(ConnectivityError::ConnectionFailed)
        }
    }

    #[cfg(target_os = "espidf")]
    fn platform_is_connected(&self) -> bool {
        self.wifi.is_connected().unwrap_or(false)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_is_connected(&self) -> bool {
        self.sim_ap_up
    }

    #[cfg(target_os = "espidf")]
    fn platform_rssi(&self) -> Option<i8> {
        let mut ap_info = esp_idf_svc::sys::wifi_ap_record_t::default();
        // SAFETY: fills a caller-owned record; fails harmlessly when not associated.
        let ret = unsafe { esp_idf_svc::sys::esp_wifi_sta_get_ap_info(&mut ap_info) };
        (ret == esp_idf_svc::sys::ESP_OK as esp_idf_svc::sys::esp_err_t).then_some(ap_info.rssi)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_rssi(&self) -> Option<i8> {
        self.sim_ap_up.then_some(-61)
    }

    #[cfg(target_os = "espidf")]
    fn platform_ip(&self) -> Option<Ipv4Addr> {
        self.wifi
            .wifi()
            .sta_netif()
            .get_ip_info()
            .ok()
            .map(|info| info.ip)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_ip(&self) -> Option<Ipv4Addr> {
        self.sim_ap_up.then_some(Ipv4Addr::new(192, 168, 4, 23))
    }

    /// Simulation only: take the AP up or down.
    #[cfg(not(target_os = "espidf"))]
    pub fn set_sim_ap(&mut self, up: bool) {
        self.sim_ap_up = up;
    }
}

// ───────────────────────────────────────────────────────────────
// LinkPort
// ───────────────────────────────────────────────────────────────

impl LinkPort for WifiAdapter {
    fn is_connected(&self) -> bool {
        self.state == WifiState::Connected
    }

    fn rssi(&self) -> Option<i8> {
        if self.is_connected() {
            self.last_rssi
        } else {
            None
        }
    }

    fn local_ip(&self) -> Option<Ipv4Addr> {
        if self.is_connected() { self.ip } else { None }
    }
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────
