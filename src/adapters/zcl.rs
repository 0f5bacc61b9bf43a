//! Zigbee Cluster Library mapping for the thermostat endpoint.
//!
//! Translates between the application core's [`Publication`]s and
//! [`ThermostatCommand`]s and the (cluster, attribute/command) identifiers
//! seen on the network. The radio stack itself lives outside this crate;
//! it hands attribute writes and cluster commands to [`decode_attribute`]
//! and [`decode_command`] and sends whatever [`encode_publication`] yields.
//!
//! ```text
//!   network ──▶ decode_attribute / decode_command ──▶ ThermostatCommand
//!   Publication ──▶ encode_publication ──▶ (cluster, attribute, value)
//! ```

use log::debug;

use crate::app::commands::ThermostatCommand;
use crate::app::events::Publication;
use crate::app::ports::AttributeValue;
use crate::error::PayloadError;
use crate::schedule::codec::{decode_custom_schedule, decode_weekly_schedule};

/// Cluster identifiers.
pub mod cluster {
    pub const TIME: u16 = 0x000A;
    pub const THERMOSTAT: u16 = 0x0201;
    pub const TEMPERATURE_MEASUREMENT: u16 = 0x0402;
    /// Manufacturer-specific attributes on the thermostat endpoint.
    pub const CUSTOM: u16 = 0xFF00;
}

/// Attribute identifiers, grouped by cluster.
pub mod attr {
    pub mod time {
        pub const TIME: u16 = 0x0000;
        pub const TIME_ZONE: u16 = 0x0002;
        pub const LOCAL_TIME: u16 = 0x0007;
    }

    pub mod thermostat {
        pub const UNOCCUPIED_HEATING_SETPOINT: u16 = 0x0014;
        pub const SYSTEM_MODE: u16 = 0x001C;
        pub const RUNNING_MODE: u16 = 0x001E;
        pub const SETPOINT_CHANGE_SOURCE: u16 = 0x0030;
    }

    pub mod measurement {
        pub const MEASURED_VALUE: u16 = 0x0000;
    }

    pub mod custom {
        pub const RUNTIME: u16 = 0x0000;
        pub const TEMPERATURE_SOURCE: u16 = 0x0001;
        pub const CURRENT_TARGET: u16 = 0x0002;
    }
}

/// Thermostat cluster command identifiers.
pub mod command {
    pub const SET_WEEKLY_SCHEDULE: u8 = 0x01;
    pub const CLEAR_WEEKLY_SCHEDULE: u8 = 0x03;
    pub const SET_CUSTOM_WEEKLY_SCHEDULE: u8 = 0xFF;
}

/// Running-mode values.
pub const RUNNING_MODE_OFF: u8 = 0x00;
pub const RUNNING_MODE_HEAT: u8 = 0x04;

/// Where a publication lands on the network and what it carries.
pub fn encode_publication(publication: &Publication) -> (u16, u16, AttributeValue) {
    match *publication {
        Publication::HeatingChanged(on) => (
            cluster::THERMOSTAT,
            attr::thermostat::RUNNING_MODE,
            AttributeValue::Enum8(if on { RUNNING_MODE_HEAT } else { RUNNING_MODE_OFF }),
        ),
        Publication::RuntimeSeconds(secs) => (
            cluster::CUSTOM,
            attr::custom::RUNTIME,
            AttributeValue::U32(secs),
        ),
        Publication::TemperatureSource(source) => (
            cluster::CUSTOM,
            attr::custom::TEMPERATURE_SOURCE,
            AttributeValue::U8(source as u8),
        ),
        Publication::CurrentTarget(target) => (
            cluster::CUSTOM,
            attr::custom::CURRENT_TARGET,
            AttributeValue::U32(target.raw()),
        ),
        Publication::SetpointSource(source) => (
            cluster::THERMOSTAT,
            attr::thermostat::SETPOINT_CHANGE_SOURCE,
            AttributeValue::Enum8(source as u8),
        ),
        Publication::LocalTemperature(hundredths) => (
            cluster::TEMPERATURE_MEASUREMENT,
            attr::measurement::MEASURED_VALUE,
            AttributeValue::S16(hundredths),
        ),
    }
}

/// Map an inbound attribute write or report to a command. Attributes the
/// thermostat does not consume, or values of an unexpected type, yield
/// `None`.
pub fn decode_attribute(
    cluster_id: u16,
    attribute_id: u16,
    value: AttributeValue,
) -> Option<ThermostatCommand> {
    use AttributeValue as V;

    let cmd = match (cluster_id, attribute_id, value) {
        (cluster::TIME, attr::time::TIME, V::UtcTime(secs)) => {
            ThermostatCommand::SyncUtcTime(i64::from(secs))
        }
        (cluster::TIME, attr::time::TIME_ZONE, V::S32(secs)) => {
            ThermostatCommand::SetTimeZoneOffset(secs)
        }
        (cluster::TIME, attr::time::LOCAL_TIME, V::U32(secs)) => {
            ThermostatCommand::SyncLocalTime(i64::from(secs))
        }
        (cluster::TEMPERATURE_MEASUREMENT, attr::measurement::MEASURED_VALUE, V::S16(t)) => {
            ThermostatCommand::SetRemoteTemperature(t)
        }
        (cluster::THERMOSTAT, attr::thermostat::SYSTEM_MODE, V::Enum8(raw) | V::U8(raw)) => {
            ThermostatCommand::SetMode(raw)
        }
        (cluster::THERMOSTAT, attr::thermostat::UNOCCUPIED_HEATING_SETPOINT, V::S16(sp)) => {
            ThermostatCommand::SetOverride(sp)
        }
        (cluster::CUSTOM, attr::custom::RUNTIME, V::U32(secs)) => ThermostatCommand::SetRuntime(secs),
        _ => {
            debug!(
                "ZCL: ignoring attribute 0x{:04X}/0x{:04X} = {:?}",
                cluster_id, attribute_id, value
            );
            return None;
        }
    };
    Some(cmd)
}

/// Map an inbound cluster command to a thermostat command. Schedule
/// commands are accepted on both the thermostat and the custom cluster.
pub fn decode_command(
    cluster_id: u16,
    command_id: u8,
    payload: &[u8],
) -> Result<Option<ThermostatCommand>, PayloadError> {
    if cluster_id != cluster::THERMOSTAT && cluster_id != cluster::CUSTOM {
        debug!(
            "ZCL: command 0x{:02X} on cluster 0x{:04X} ({} bytes) not handled",
            command_id,
            cluster_id,
            payload.len()
        );
        return Ok(None);
    }

    let cmd = match command_id {
        command::SET_WEEKLY_SCHEDULE => {
            let pattern = decode_weekly_schedule(payload)?;
            ThermostatCommand::SetWeeklyPattern {
                days: pattern.days,
                transitions: pattern.transitions,
            }
        }
        command::SET_CUSTOM_WEEKLY_SCHEDULE => {
            ThermostatCommand::SetSlotSchedules(decode_custom_schedule(payload)?)
        }
        command::CLEAR_WEEKLY_SCHEDULE => ThermostatCommand::ClearSchedule,
        other => {
            debug!("ZCL: unknown thermostat command 0x{:02X}", other);
            return Ok(None);
        }
    };
    Ok(Some(cmd))
}
