//! System configuration parameters
//!
//! All tunable parameters for the thermostat decision engine.
//! Values can be overridden via NVS (non-volatile storage); the
//! defaults reproduce the behaviour of the shipped firmware.

use serde::{Deserialize, Serialize};

use crate::app::ports::ConfigError;

/// Core system configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThermostatConfig {
    // --- Timing ---
    /// Evaluation period once the clock is valid (seconds, phase-aligned)
    pub tick_period_secs: u32,
    /// Poll interval while waiting for a plausible wall clock (seconds)
    pub clock_poll_secs: u32,
    /// Earliest calendar year accepted as a synchronised clock
    pub min_valid_year: i32,
    /// Interval between network time requests (seconds, 0 = only at start-up)
    pub time_sync_interval_secs: u32,
    /// Interval between local temperature samples (seconds)
    pub sensor_period_secs: u32,

    // --- Decision inputs ---
    /// How long a remote temperature reading stays usable (seconds)
    pub remote_freshness_secs: u32,
    /// How long a manual override stays live after capture (seconds)
    pub override_lifetime_secs: u32,
    /// Effective temperatures below this (hundredths of a degree) suspend actuation
    pub min_valid_temperature: i16,

    // --- Publishing ---
    /// Clear the publish edge cache every N ticks (0 = never)
    pub republish_interval_ticks: u32,

    // --- Hardware ---
    /// GPIO driving the heater relay
    pub heater_gpio: u8,
    /// GPIO carrying the 1-Wire temperature sensor bus
    pub onewire_gpio: u8,
}

impl Default for ThermostatConfig {
    fn default() -> Self {
        Self {
            // Timing
            tick_period_secs: 60,
            clock_poll_secs: 10,
            min_valid_year: 2000,
            time_sync_interval_secs: 10_000, // ~3 h
            sensor_period_secs: 60,

            // Decision inputs
            remote_freshness_secs: 3600,       // 1 h
            override_lifetime_secs: 7 * 86400, // 1 week
            min_valid_temperature: 5,

            // Publishing
            republish_interval_ticks: 0,

            // Hardware
            heater_gpio: 21,
            onewire_gpio: 0,
        }
    }
}

impl ThermostatConfig {
    /// Range-check every field before the config is persisted or applied.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=3600).contains(&self.tick_period_secs) {
            return Err(ConfigError::ValidationFailed(
                "tick_period_secs must be 1–3600",
            ));
        }
        if !(1..=600).contains(&self.clock_poll_secs) {
            return Err(ConfigError::ValidationFailed(
                "clock_poll_secs must be 1–600",
            ));
        }
        if !(1970..=2100).contains(&self.min_valid_year) {
            return Err(ConfigError::ValidationFailed(
                "min_valid_year must be 1970–2100",
            ));
        }
        if self.time_sync_interval_secs != 0 && self.time_sync_interval_secs < 60 {
            return Err(ConfigError::ValidationFailed(
                "time_sync_interval_secs must be 0 or >= 60",
            ));
        }
        if !(1..=3600).contains(&self.sensor_period_secs) {
            return Err(ConfigError::ValidationFailed(
                "sensor_period_secs must be 1–3600",
            ));
        }
        if self.remote_freshness_secs == 0 {
            return Err(ConfigError::ValidationFailed(
                "remote_freshness_secs must be > 0",
            ));
        }
        if self.override_lifetime_secs == 0 {
            return Err(ConfigError::ValidationFailed(
                "override_lifetime_secs must be > 0",
            ));
        }
        if self.min_valid_temperature < 0 {
            return Err(ConfigError::ValidationFailed(
                "min_valid_temperature must be >= 0",
            ));
        }
        if self.heater_gpio > 48 {
            return Err(ConfigError::ValidationFailed("heater_gpio must be 0–48"));
        }
        if self.onewire_gpio > 48 || self.onewire_gpio == self.heater_gpio {
            return Err(ConfigError::ValidationFailed(
                "onewire_gpio must be 0–48 and differ from heater_gpio",
            ));
        }
        Ok(())
    }
}
