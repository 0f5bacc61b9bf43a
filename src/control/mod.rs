//! Heating control — from "what should the room be" to "is the relay on".
//!
//! - [`arbiter`] picks the temperature the decision is based on.
//! - [`actuation`] compares it against the active set-point and drives the relay.
//! - [`runtime`] accounts for how long the heater has been running.

pub mod actuation;
pub mod arbiter;
pub mod runtime;

use core::fmt;

/// Thermostat system mode, using the thermostat cluster's wire values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum Mode {
    #[default]
    Off = 0x00,
    Auto = 0x01,
    Heat = 0x04,
}

impl Mode {
    pub fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0x00 => Some(Self::Off),
            0x01 => Some(Self::Auto),
            0x04 => Some(Self::Heat),
            _ => None,
        }
    }

    pub const fn raw(self) -> u8 {
        self as u8
    }

    /// Whether the mode allows the heater to run at all.
    pub fn heating_enabled(self) -> bool {
        matches!(self, Self::Heat | Self::Auto)
    }
}

/// Why the active set-point is what it is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SetpointSource {
    Override = 0,
    Schedule = 1,
}

/// Set-point and its start minute packed as `set_point << 16 | minute`,
/// compared to detect target changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PackedTarget(u32);

impl PackedTarget {
    pub fn pack(set_point: i16, minute_of_day: u16) -> Self {
        Self(u32::from(set_point as u16) << 16 | u32::from(minute_of_day))
    }

    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    /// `(set_point, minute_of_day)`.
    pub fn unpack(self) -> (i16, u16) {
        ((self.0 >> 16) as u16 as i16, (self.0 & 0xFFFF) as u16)
    }
}

impl fmt::Display for PackedTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (set_point, minute) = self.unpack();
        write!(f, "{}@{:02}:{:02}", set_point, minute / 60, minute % 60)
    }
}
