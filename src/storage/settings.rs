//! Settings store with deferred, rate-limited persistence.
//!
//! ```text
//!            mark_dirty(now)                flush_if_due(now) ok
//!   Clean ────────────────────▶ Dirty{since} ────────────────────▶ Clean
//!                                 │    ▲
//!                                 └────┘ mark_dirty (keeps `since`)
//!                                 └────┘ flush_if_due: not due / write failed
//! ```
//!
//! Mutations only touch RAM.  A physical write happens from
//! [`SettingsStore::flush_if_due`] at most once per cooldown window, so a
//! burst of commands costs one flash write.  [`SettingsStore::force_flush`]
//! is the single synchronous path and is reserved for intentional restarts.

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::app::ports::{StorageError, StoragePort};
use crate::config::{
    CaptureMode, DEFAULT_INTERVAL_MIN, DEFAULT_THRESHOLD, DeviceSettings, FirmwareConfig,
    INTERVAL_MAX, INTERVAL_MIN, Rejection, SettingsUpdate, THRESHOLD_MAX, THRESHOLD_MIN,
};

/// NVS key holding the settings record.
pub const SETTINGS_KEY: &str = "settings";

/// Layout tag.  Any other value means "no valid record".
pub const RECORD_MAGIC: u8 = 0xA8;

/// Fixed slot size for the encoded record.
pub const RECORD_CAPACITY: usize = 32;

// ───────────────────────────────────────────────────────────────
// On-flash record
// ───────────────────────────────────────────────────────────────

/// Persisted form of [`DeviceSettings`].
///
/// Fields are stored raw; [`SettingsRecord::into_settings`] coerces anything
/// out of range back to its default so a half-valid record never leaks
/// nonsense into the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsRecord {
    pub magic: u8,
    pub mode: u8,
    pub interval_min: u16,
    pub motion_enabled: bool,
    pub threshold: u16,
    pub captured: u32,
    pub sent: u32,
    pub pan_angle: Option<u8>,
}

impl SettingsRecord {
    pub fn from_settings(s: &DeviceSettings) -> Self {
        Self {
            magic: RECORD_MAGIC,
            mode: s.capture_mode.as_u8(),
            interval_min: s.interval_minutes,
            motion_enabled: s.motion_enabled,
            threshold: s.motion_threshold,
            captured: s.captured_count,
            sent: s.sent_count,
            pan_angle: s.pan_angle,
        }
    }

    /// Decode a slot.  `None` for undecodable bytes or a foreign magic.
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        let rec: Self = postcard::from_bytes(bytes).ok()?;
        (rec.magic == RECORD_MAGIC).then_some(rec)
    }

    /// Encode into a zero-padded fixed slot.
    pub fn encode(&self) -> Result<[u8; RECORD_CAPACITY], StorageError> {
        let mut slot = [0u8; RECORD_CAPACITY];
        postcard::to_slice(self, &mut slot).map_err(|_| StorageError::Full)?;
        Ok(slot)
    }

    /// Convert to in-memory settings, coercing out-of-range fields.
    pub fn into_settings(self, config: &FirmwareConfig) -> DeviceSettings {
        let interval_minutes = if (INTERVAL_MIN..=INTERVAL_MAX).contains(&self.interval_min) {
            self.interval_min
        } else {
            DEFAULT_INTERVAL_MIN
        };
        let motion_threshold = if (THRESHOLD_MIN..=THRESHOLD_MAX).contains(&self.threshold) {
            self.threshold
        } else {
            DEFAULT_THRESHOLD
        };
        let pan_angle = config.servo_fitted.then(|| {
            self.pan_angle
                .map_or(config.pan_center, |a| a.clamp(config.pan_min, config.pan_max))
        });

        DeviceSettings {
            capture_mode: CaptureMode::from_u8(self.mode).unwrap_or_default(),
            interval_minutes,
            motion_enabled: self.motion_enabled,
            motion_threshold,
            captured_count: self.captured,
            sent_count: self.sent,
            pan_angle,
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Persistence state machine
// ───────────────────────────────────────────────────────────────

/// Whether RAM and flash agree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistState {
    Clean,
    /// RAM differs from flash since `since_ms`.
    Dirty { since_ms: u64 },
}

// ───────────────────────────────────────────────────────────────
// SettingsStore
// ───────────────────────────────────────────────────────────────

/// Owner of the live [`DeviceSettings`].
pub struct SettingsStore {
    current: DeviceSettings,
    state: PersistState,
    last_write_ms: Option<u64>,
    cooldown_ms: u64,
}

impl SettingsStore {
    /// Read the persisted record, falling back to defaults on any problem.
    pub fn load(nvs: &impl StoragePort, config: &FirmwareConfig) -> Self {
        let mut slot = [0u8; RECORD_CAPACITY];
        let current = match nvs.read(SETTINGS_KEY, &mut slot) {
            Ok(n) => match SettingsRecord::decode(&slot[..n]) {
                Some(rec) => {
                    info!("SettingsStore: loaded record ({} bytes)", n);
                    rec.into_settings(config)
                }
                None => {
                    warn!("SettingsStore: invalid record, using defaults");
                    DeviceSettings::defaults_for(config)
                }
            },
            Err(StorageError::NotFound) => {
                info!("SettingsStore: no stored settings, using defaults");
                DeviceSettings::defaults_for(config)
            }
            Err(e) => {
                warn!("SettingsStore: read failed ({}), using defaults", e);
                DeviceSettings::defaults_for(config)
            }
        };

        Self::with_settings(current, config)
    }

    /// Start from known settings without touching storage.
    pub fn with_settings(current: DeviceSettings, config: &FirmwareConfig) -> Self {
        Self {
            current,
            state: PersistState::Clean,
            last_write_ms: None,
            cooldown_ms: u64::from(config.persist_cooldown_ms),
        }
    }

    pub fn settings(&self) -> &DeviceSettings {
        &self.current
    }

    pub fn state(&self) -> PersistState {
        self.state
    }

    pub fn is_dirty(&self) -> bool {
        matches!(self.state, PersistState::Dirty { .. })
    }

    /// Mutate the settings and mark them dirty.
    pub fn modify<R>(&mut self, now_ms: u64, f: impl FnOnce(&mut DeviceSettings) -> R) -> R {
        let r = f(&mut self.current);
        self.mark_dirty(now_ms);
        r
    }

    /// Validate and apply `update`.  Marks dirty only if something changed.
    pub fn apply(&mut self, now_ms: u64, update: &SettingsUpdate) -> Result<bool, Rejection> {
        let changed = self.current.apply(update)?;
        if changed {
            self.mark_dirty(now_ms);
        }
        Ok(changed)
    }

    /// Flag RAM as ahead of flash.  Idempotent; keeps the first `since_ms`.
    pub fn mark_dirty(&mut self, now_ms: u64) {
        if self.state == PersistState::Clean {
            self.state = PersistState::Dirty { since_ms: now_ms };
        }
    }

    /// Write the record if dirty and the cooldown since the last physical
    /// write has elapsed.  Returns `true` when a write succeeded.
    pub fn flush_if_due(&mut self, now_ms: u64, nvs: &mut impl StoragePort) -> bool {
        if self.state == PersistState::Clean {
            return false;
        }
        if let Some(last) = self.last_write_ms {
            if now_ms.saturating_sub(last) < self.cooldown_ms {
                return false;
            }
        }

        self.last_write_ms = Some(now_ms);
        match self.write(nvs) {
            Ok(()) => {
                self.state = PersistState::Clean;
                true
            }
            Err(e) => {
                warn!("SettingsStore: deferred write failed: {}", e);
                false
            }
        }
    }

    /// Write now, ignoring the cooldown.  Only for the restart path.
    pub fn force_flush(&mut self, now_ms: u64, nvs: &mut impl StoragePort) -> bool {
        self.last_write_ms = Some(now_ms);
        match self.write(nvs) {
            Ok(()) => {
                self.state = PersistState::Clean;
                info!("SettingsStore: flushed before restart");
                true
            }
            Err(e) => {
                warn!("SettingsStore: forced write failed: {}", e);
                false
            }
        }
    }

    fn write(&self, nvs: &mut impl StoragePort) -> Result<(), StorageError> {
        let slot = SettingsRecord::from_settings(&self.current).encode()?;
        nvs.write(SETTINGS_KEY, &slot)
    }
}
