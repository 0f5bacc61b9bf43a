//! Adapters — concrete implementations of the hexagonal port traits.
//!
//! | Adapter   | Implements         | Connects to                  |
//! |-----------|--------------------|------------------------------|
//! | `console` | (network ingress)  | JSON lines on the UART       |
//! | `ds18b20` | TemperatureSensor  | 1-Wire bus (RMT)             |
//! | `log_bus` | AttributeBus       | Serial log output            |
//! | `nvs`     | ConfigPort         | NVS / in-memory store        |
//! |           | StoragePort        |                              |
//! | `relay`   | RelayPort          | Heater relay GPIO            |
//! | `time`    | ClockPort          | ESP32 system clock           |
//! | `zcl`     | (wire mapping)     | Zigbee thermostat clusters   |

pub mod console;
pub mod ds18b20;
pub mod log_bus;
pub mod nvs;
pub mod relay;
pub mod time;
pub mod zcl;
