//! Actuator control.

pub mod pan;
