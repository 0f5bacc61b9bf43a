//! Application core — domain orchestration, zero I/O.
//!
//! This module owns the thermostat aggregate: schedule, override, readings,
//! heating state and the publish edge cache. All interaction with hardware
//! happens through **port traits** defined in [`ports`], keeping this layer
//! fully testable without real peripherals.

pub mod commands;
pub mod events;
pub mod keys;
pub mod ports;
pub mod service;
