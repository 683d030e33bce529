//! Peripheral drivers: camera sensor, pan servo and task watchdog.

pub mod camera;
pub mod servo;
pub mod watchdog;
