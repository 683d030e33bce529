//! CamWatch firmware library.
//!
//! Exposes the domain core, adapters and drivers for integration testing
//! and for the `camwatch` binary. All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module; on the host every
//! adapter falls back to a simulation backend.

#![deny(unused_must_use)]

pub mod app;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod motion;
pub mod scheduler;
pub mod storage;

pub mod adapters;
pub mod control;
pub mod drivers;
pub mod net;
pub mod pins;
pub mod telegram;
