//! Persistent storage layout.
//!
//! Everything the engine persists lives in one NVS namespace. Key names
//! stay under the 15-byte NVS limit.

use crate::schedule::DayOfWeek;

pub const NAMESPACE: &str = "thermostat";

pub const MODE: &str = "mode";
pub const OVERRIDE_SET_POINT: &str = "ovr_temp";
pub const OVERRIDE_CAPTURED_AT: &str = "ovr_time";
pub const REMOTE_TEMPERATURE: &str = "rmt_temp";
pub const REMOTE_RECEIVED_AT: &str = "rmt_time";
pub const RUNTIME: &str = "runtime";
pub const HEAT_START: &str = "heat_start";
pub const HEATING: &str = "heating";
pub const TZ_OFFSET: &str = "tz_offset";
pub const AWAY_SCHEDULE: &str = "sched_away";

const DAY_SCHEDULES: [&str; 7] = [
    "sched_0", "sched_1", "sched_2", "sched_3", "sched_4", "sched_5", "sched_6",
];

/// Blob key holding one calendar day's transitions.
pub fn day_schedule(day: DayOfWeek) -> &'static str {
    DAY_SCHEDULES[day.index() as usize]
}
