//! Unified error types for the CamWatch firmware.
//!
//! Bring-up errors that stop `main` before the control loop starts.  All
//! variants are `Copy` so they can be logged without allocation.
//!
//! Runtime failures never reach this type: the per-port error enums live
//! next to their traits in [`app::ports`](crate::app::ports) and
//! [`net::transport`](crate::net::transport) and are handled inside the
//! service.  A camera that fails to initialise restarts the board instead
//! of returning.

use core::fmt;

use crate::app::ports::StorageError;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Bring-up failures raised by firmware code.  ESP-IDF errors reach
/// `main`'s `anyhow::Result` directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Persistent storage could not be opened.
    Storage(StorageError),
    /// Configuration is invalid.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Storage(e) => write!(f, "storage: {e}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<StorageError> for Error {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}
