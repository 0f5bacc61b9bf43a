//! Thermostat firmware library.
//!
//! Exposes the decision engine (schedule resolution, temperature source
//! arbitration, relay actuation and runtime accounting) for integration
//! testing on the host. All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod control;
pub mod engine;
pub mod error;
pub mod schedule;
pub mod sensors;

// Links the host critical-section implementation that backs the
// inbound event channel in unit tests.
#[cfg(test)]
use critical_section as _;
