//! Unified error types for the thermostat firmware.
//!
//! A single `Error` enum that every subsystem converts into, keeping the
//! engine's error handling uniform. Domain errors are `Copy` so they can be
//! logged and returned without allocation.

use core::fmt;

use crate::app::ports::{BusError, ConfigError, StorageError};
use crate::schedule::store::MAX_TRANSITIONS_PER_DAY;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug)]
pub enum Error {
    /// A schedule mutation was rejected.
    Schedule(ScheduleError),
    /// An inbound command payload was malformed.
    Payload(PayloadError),
    /// No schedule entry or override exists to resolve against.
    NoSchedule(NoScheduleError),
    /// The storage backend failed.
    Storage(StorageError),
    /// The attribute bus rejected a publish.
    Bus(BusError),
    /// Configuration is invalid or could not be loaded.
    Config(ConfigError),
    /// Timezone offset outside ±24 h.
    InvalidTimeZone(i32),
    /// The sensor subsystem refused a request.
    Sensor(SensorError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Schedule(e) => write!(f, "schedule: {e}"),
            Self::Payload(e) => write!(f, "payload: {e}"),
            Self::NoSchedule(e) => write!(f, "resolve: {e}"),
            Self::Storage(e) => write!(f, "storage: {e}"),
            Self::Bus(e) => write!(f, "bus: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
            Self::InvalidTimeZone(secs) => write!(f, "timezone offset {secs}s out of range"),
            Self::Sensor(e) => write!(f, "sensor: {e}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Schedule errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleError {
    /// A transition's minute of day is outside `0..=1439`.
    InvalidArgument { minute_of_day: u16 },
    /// A day was given more transitions than it can hold.
    TooManyTransitions { count: usize },
}

impl fmt::Display for ScheduleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArgument { minute_of_day } => {
                write!(f, "minute of day {minute_of_day} out of range")
            }
            Self::TooManyTransitions { count } => write!(
                f,
                "{count} transitions exceeds {MAX_TRANSITIONS_PER_DAY} per day"
            ),
        }
    }
}

impl From<ScheduleError> for Error {
    fn from(e: ScheduleError) -> Self {
        Self::Schedule(e)
    }
}

// ---------------------------------------------------------------------------
// Payload errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadError {
    /// Payload shorter than its fixed header.
    HeaderTooShort { len: usize, needed: usize },
    /// Declared transition count needs more bytes than were received.
    Truncated { declared: usize, needed: usize, available: usize },
}

impl fmt::Display for PayloadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HeaderTooShort { len, needed } => {
                write!(f, "header needs {needed} bytes, got {len}")
            }
            Self::Truncated {
                declared,
                needed,
                available,
            } => write!(
                f,
                "{declared} transitions need {needed} bytes, only {available} available"
            ),
        }
    }
}

impl From<PayloadError> for Error {
    fn from(e: PayloadError) -> Self {
        Self::Payload(e)
    }
}

// ---------------------------------------------------------------------------
// Resolution errors
// ---------------------------------------------------------------------------

/// Raised when neither the weekly program nor the override offers a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoScheduleError;

impl fmt::Display for NoScheduleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "no schedule entry or override to resolve against")
    }
}

impl From<NoScheduleError> for Error {
    fn from(e: NoScheduleError) -> Self {
        Self::NoSchedule(e)
    }
}

// ---------------------------------------------------------------------------
// Sensor errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// No room left for another temperature observer.
    ObserverListFull,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ObserverListFull => write!(f, "observer list full"),
        }
    }
}

impl From<SensorError> for Error {
    fn from(e: SensorError) -> Self {
        Self::Sensor(e)
    }
}

// ---------------------------------------------------------------------------
// Port errors
// ---------------------------------------------------------------------------

impl From<StorageError> for Error {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

impl From<BusError> for Error {
    fn from(e: BusError) -> Self {
        Self::Bus(e)
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
