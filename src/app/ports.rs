//! Port traits — the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ ThermostatService (domain)
//! ```
//!
//! Driven adapters (relay, clock, attribute bus, storage) implement these
//! traits. The [`ThermostatService`](super::service::ThermostatService)
//! consumes them via generics, so the domain core never touches hardware
//! directly.

use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::config::ThermostatConfig;
use crate::schedule::DayOfWeek;

// ───────────────────────────────────────────────────────────────
// Relay port (driven adapter: domain → heater)
// ───────────────────────────────────────────────────────────────

/// Write-side port: the domain switches the heater through this.
pub trait RelayPort {
    /// Energise (`true`) or release (`false`) the heater relay.
    fn set_heating(&mut self, on: bool);

    /// Last commanded relay state.
    fn is_on(&self) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Clock port (driven adapter: RTC / network time → domain)
// ───────────────────────────────────────────────────────────────

/// UTC wall-clock fields derived from an epoch timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WallClock {
    pub year: i32,
    pub weekday: DayOfWeek,
    pub minute_of_day: u16,
    pub second: u8,
}

impl WallClock {
    /// Break `epoch_secs` into calendar fields. Timestamps chrono cannot
    /// represent map to year 0 so they never pass a plausibility check.
    pub fn from_epoch(epoch_secs: i64) -> Self {
        match DateTime::<Utc>::from_timestamp(epoch_secs, 0) {
            Some(dt) => Self {
                year: dt.year(),
                weekday: DayOfWeek::from_chrono(dt.weekday()),
                minute_of_day: (dt.hour() * 60 + dt.minute()) as u16,
                second: dt.second() as u8,
            },
            None => Self {
                year: 0,
                weekday: DayOfWeek::Sunday,
                minute_of_day: 0,
                second: 0,
            },
        }
    }
}

/// Source of the current time.
pub trait ClockPort {
    /// Seconds since the Unix epoch (UTC).
    fn now_epoch_secs(&self) -> i64;

    /// Set the system clock from a network time sync.
    fn set_utc(&mut self, epoch_secs: i64);

    /// Ask the network for a fresh time sync. Best-effort.
    fn request_sync(&mut self);

    /// UTC wall-clock fields of [`now_epoch_secs`](Self::now_epoch_secs).
    fn wall_clock(&self) -> WallClock {
        WallClock::from_epoch(self.now_epoch_secs())
    }
}

// ───────────────────────────────────────────────────────────────
// Attribute bus port (driven adapter: domain → network attributes)
// ───────────────────────────────────────────────────────────────

/// Typed attribute payloads exchanged with the network stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttributeValue {
    /// 8-bit enumeration (system mode, running mode, set-point source).
    Enum8(u8),
    /// Unsigned 8-bit integer.
    U8(u8),
    /// Signed 16-bit integer (temperatures in hundredths of a degree).
    S16(i16),
    /// Unsigned 32-bit integer (runtime seconds, packed target).
    U32(u32),
    /// Signed 32-bit integer (timezone offset seconds).
    S32(i32),
    /// UTC time in seconds.
    UtcTime(u32),
}

/// Outbound attribute reporting. Publishing is best-effort: the engine logs
/// failures and never retries.
pub trait AttributeBus {
    fn publish(
        &mut self,
        cluster_id: u16,
        attribute_id: u16,
        value: AttributeValue,
    ) -> Result<(), BusError>;
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists system configuration.
///
/// Implementations MUST validate config values before persisting.
/// Invalid ranges are rejected with [`ConfigError::ValidationFailed`],
/// not silently clamped.
pub trait ConfigPort {
    /// Load configuration from persistent storage.
    /// Returns [`ThermostatConfig::default()`] if no stored config exists.
    fn load(&self) -> Result<ThermostatConfig, ConfigError>;

    /// Validate and persist configuration.
    fn save(&self, config: &ThermostatConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Storage port (driven adapter: domain ↔ NVS / flash)
// ───────────────────────────────────────────────────────────────

/// Persistent key-value storage for schedules, readings and heating state.
///
/// - Keys are namespaced to prevent collisions between subsystems.
/// - Write operations MUST be atomic — no partial writes on power loss.
///   The ESP-IDF NVS API guarantees this natively; in-memory simulation
///   achieves it trivially.
pub trait StoragePort {
    /// Read a value.  Returns the number of bytes written to `buf`.
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError>;

    /// Write a value atomically.
    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError>;

    /// Delete a key.  Returns `Ok(())` even if the key didn't exist.
    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError>;

    /// Check whether a key exists without reading it.
    fn exists(&self, namespace: &str, key: &str) -> bool;
}

/// Fixed-width little-endian scalar helpers over any [`StoragePort`].
pub trait StorageExt: StoragePort {
    fn read_array<const N: usize>(&self, namespace: &str, key: &str) -> Result<[u8; N], StorageError> {
        let mut buf = [0u8; N];
        let n = self.read(namespace, key, &mut buf)?;
        if n != N {
            return Err(StorageError::Corrupted);
        }
        Ok(buf)
    }

    fn read_u8(&self, namespace: &str, key: &str) -> Result<u8, StorageError> {
        self.read_array::<1>(namespace, key).map(|b| b[0])
    }

    fn read_i16(&self, namespace: &str, key: &str) -> Result<i16, StorageError> {
        self.read_array(namespace, key).map(i16::from_le_bytes)
    }

    fn read_i32(&self, namespace: &str, key: &str) -> Result<i32, StorageError> {
        self.read_array(namespace, key).map(i32::from_le_bytes)
    }

    fn read_u32(&self, namespace: &str, key: &str) -> Result<u32, StorageError> {
        self.read_array(namespace, key).map(u32::from_le_bytes)
    }

    fn read_i64(&self, namespace: &str, key: &str) -> Result<i64, StorageError> {
        self.read_array(namespace, key).map(i64::from_le_bytes)
    }

    fn write_u8(&mut self, namespace: &str, key: &str, value: u8) -> Result<(), StorageError> {
        self.write(namespace, key, &[value])
    }

    fn write_i16(&mut self, namespace: &str, key: &str, value: i16) -> Result<(), StorageError> {
        self.write(namespace, key, &value.to_le_bytes())
    }

    fn write_i32(&mut self, namespace: &str, key: &str, value: i32) -> Result<(), StorageError> {
        self.write(namespace, key, &value.to_le_bytes())
    }

    fn write_u32(&mut self, namespace: &str, key: &str, value: u32) -> Result<(), StorageError> {
        self.write(namespace, key, &value.to_le_bytes())
    }

    fn write_i64(&mut self, namespace: &str, key: &str, value: i64) -> Result<(), StorageError> {
        self.write(namespace, key, &value.to_le_bytes())
    }
}

impl<T: StoragePort + ?Sized> StorageExt for T {}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations.
#[derive(Debug)]
pub enum ConfigError {
    /// No config found in storage (first boot).
    NotFound,
    /// Stored config failed integrity / deserialization check.
    Corrupted,
    /// A config field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
    /// Underlying storage is full.
    StorageFull,
    /// Generic I/O error from the storage backend.
    IoError,
}

/// Errors from [`StoragePort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Requested key does not exist.
    NotFound,
    /// Storage partition is full.
    Full,
    /// Generic I/O error.
    IoError,
    /// Stored value has the wrong size or failed to decode.
    Corrupted,
}

/// Errors from [`AttributeBus`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusError {
    /// The device has not joined a network yet.
    NotJoined,
    /// The stack refused the attribute write with a status code.
    Rejected(u8),
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "config not found"),
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::StorageFull => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl core::fmt::Display for StorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "key not found"),
            Self::Full => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
            Self::Corrupted => write!(f, "stored value corrupted"),
        }
    }
}

impl core::fmt::Display for BusError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotJoined => write!(f, "not joined to a network"),
            Self::Rejected(status) => write!(f, "rejected with status 0x{:02x}", status),
        }
    }
}
