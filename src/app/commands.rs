//! Inbound commands to the application service.
//!
//! These represent changes requested by the outside world (attribute
//! writes and cluster commands from the network, the on-board sensor) that
//! the [`ThermostatService`](super::service::ThermostatService) applies.

use crate::schedule::store::ScheduleSlot;
use crate::schedule::{DayMask, Transition};

/// Commands that external adapters can send into the application core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThermostatCommand {
    /// Apply one transition list to every day in the mask.
    SetWeeklyPattern {
        days: DayMask,
        transitions: Vec<Transition>,
    },

    /// Replace only the listed slots, each with its own list.
    SetSlotSchedules(Vec<(ScheduleSlot, Vec<Transition>)>),

    /// "Clear weekly schedule": the program is kept and a clock resync is
    /// requested instead.
    ClearSchedule,

    /// Raw thermostat system-mode value.
    SetMode(u8),

    /// Manual set-point (hundredths); non-positive cancels the override.
    SetOverride(i16),

    /// Room temperature pushed by a remote sensor (hundredths).
    SetRemoteTemperature(i16),

    /// Reading from the on-board sensor (hundredths).
    SetLocalTemperature(i16),

    /// Overwrite the cumulative heating runtime.
    SetRuntime(u32),

    /// UTC time from the network, epoch seconds.
    SyncUtcTime(i64),

    /// Local time offset from UTC in seconds.
    SetTimeZoneOffset(i32),

    /// Local wall time as epoch seconds; the offset is taken against the
    /// current UTC clock.
    SyncLocalTime(i64),
}
