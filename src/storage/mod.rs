//! Durable state: user settings and the remote command offset.
//!
//! Both stores sit on top of [`StoragePort`](crate::app::ports::StoragePort)
//! and never fail outward; storage problems are logged and the caller
//! continues with in-memory state.

pub mod offset;
pub mod settings;

pub use offset::CommandOffsetStore;
pub use settings::{PersistState, SettingsRecord, SettingsStore};
