//! Durable remote command offset.
//!
//! Holds the highest update sequence already taken from the channel.  The
//! poller writes it *before* handing a command to execution, so a command
//! that crashes the device is skipped after reboot instead of replayed.

use log::warn;

use crate::app::ports::{StorageError, StoragePort};

/// NVS key holding the offset (8 bytes, little-endian).
pub const OFFSET_KEY: &str = "tg_offset";

/// Stateless view over the offset record; every call goes to storage.
#[derive(Debug, Default, Clone, Copy)]
pub struct CommandOffsetStore;

impl CommandOffsetStore {
    pub fn new() -> Self {
        Self
    }

    /// Last consumed sequence, or 0 if absent or unreadable.
    pub fn last(&self, nvs: &impl StoragePort) -> u64 {
        let mut buf = [0u8; 8];
        match nvs.read(OFFSET_KEY, &mut buf) {
            Ok(8) => u64::from_le_bytes(buf),
            Ok(n) => {
                warn!("CommandOffsetStore: short record ({} bytes), treating as 0", n);
                0
            }
            Err(StorageError::NotFound) => 0,
            Err(e) => {
                warn!("CommandOffsetStore: read failed ({}), treating as 0", e);
                0
            }
        }
    }

    /// Overwrite the stored offset.  Failures are logged only.
    pub fn save(&self, nvs: &mut impl StoragePort, sequence: u64) -> bool {
        match nvs.write(OFFSET_KEY, &sequence.to_le_bytes()) {
            Ok(()) => true,
            Err(e) => {
                warn!("CommandOffsetStore: save {} failed: {}", sequence, e);
                false
            }
        }
    }
}
