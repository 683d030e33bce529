//! Application core: pure domain logic, zero I/O.
//!
//! This module contains the business rules for CamWatch: capture
//! orchestration, remote command handling, settings mutation and status
//! reporting.  All interaction with hardware and the network happens
//! through **port traits** defined in [`ports`], keeping this layer fully
//! testable without real peripherals.

pub mod commands;
pub mod events;
pub mod poller;
pub mod ports;
pub mod report;
pub mod service;
