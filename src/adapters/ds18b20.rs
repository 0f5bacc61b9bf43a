//! DS18B20 1-Wire temperature sensor.
//!
//! The first DS18B20 found on the bus is used, switched to 9-bit resolution
//! (0.5 °C steps, under 100 ms per conversion). Every scratchpad read is
//! CRC-checked before it is trusted.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: RMT-backed 1-Wire bus from `esp_idf_hal::onewire`.
//! On host/test: a static raw reading injected with [`sim_set_raw`].

use core::sync::atomic::AtomicI32;
#[cfg(not(target_os = "espidf"))]
use core::sync::atomic::Ordering;
#[cfg(target_os = "espidf")]
use core::time::Duration;

#[cfg(target_os = "espidf")]
use esp_idf_hal::onewire::OWDriver;
#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::EspError;
use log::debug;
#[cfg(target_os = "espidf")]
use log::{info, warn};

use crate::sensors::TemperatureSensor;

/// Family code in the low byte of every DS18B20 ROM address.
pub const FAMILY_CODE: u8 = 0x28;

#[cfg(target_os = "espidf")]
const CMD_MATCH_ROM: u8 = 0x55;
#[cfg(target_os = "espidf")]
const CMD_CONVERT_T: u8 = 0x44;
#[cfg(target_os = "espidf")]
const CMD_READ_SCRATCHPAD: u8 = 0xBE;
#[cfg(target_os = "espidf")]
const CMD_WRITE_SCRATCHPAD: u8 = 0x4E;
#[cfg(target_os = "espidf")]
const CONVERSION_TIME: Duration = Duration::from_millis(100);

/// Configuration register value for 9-bit conversions.
const CONFIG_9_BIT: u8 = 0x1F;

/// Register contents after power-on, before the first conversion (85 °C).
const POWER_ON_RAW: i16 = 0x0550;

/// No device on the simulated bus.
const SIM_ABSENT: i32 = i32::MIN;
static SIM_RAW: AtomicI32 = AtomicI32::new(SIM_ABSENT);

/// Put a device on the simulated bus reporting `raw` (1/16 °C), or take it
/// off with `None`.
#[cfg(not(target_os = "espidf"))]
pub fn sim_set_raw(raw: Option<i16>) {
    SIM_RAW.store(raw.map_or(SIM_ABSENT, i32::from), Ordering::Relaxed);
}

pub struct Ds18b20 {
    #[cfg(target_os = "espidf")]
    bus: OWDriver<'static>,
    address: Option<u64>,
}

// SAFETY: the driver only wraps a bus handle that is used from one thread
// at a time; the sensor thread owns it after construction.
#[cfg(target_os = "espidf")]
unsafe impl Send for Ds18b20 {}

#[cfg(target_os = "espidf")]
impl Ds18b20 {
    pub fn new(bus: OWDriver<'static>) -> Self {
        Self { bus, address: None }
    }

    /// ROM address of the first DS18B20 on the bus.
    fn search(&mut self) -> Option<u64> {
        let devices = match self.bus.search() {
            Ok(devices) => devices,
            Err(e) => {
                warn!("DS18B20: bus search failed ({})", e);
                return None;
            }
        };
        for device in devices {
            match device {
                Ok(rom) if (rom.address() & 0xFF) as u8 == FAMILY_CODE => {
                    info!("DS18B20: found {:016X}", rom.address());
                    return Some(rom.address());
                }
                Ok(rom) => debug!("DS18B20: ignoring device {:016X}", rom.address()),
                Err(e) => {
                    warn!("DS18B20: bus search failed ({})", e);
                    return None;
                }
            }
        }
        None
    }

    /// Reset the bus and address one device.
    fn send(&self, address: u64, command: u8) -> Result<(), EspError> {
        let mut frame = [0u8; 10];
        frame[0] = CMD_MATCH_ROM;
        frame[1..9].copy_from_slice(&address.to_le_bytes());
        frame[9] = command;
        self.bus.reset()?;
        self.bus.write(&frame)
    }

    fn set_resolution(&self, address: u64) -> Result<(), EspError> {
        self.send(address, CMD_WRITE_SCRATCHPAD)?;
        // Alarm thresholds are unused.
        self.bus.write(&[0x00, 0x00, CONFIG_9_BIT])
    }

    fn convert_and_read(&self, address: u64) -> Result<[u8; 9], EspError> {
        self.send(address, CMD_CONVERT_T)?;
        std::thread::sleep(CONVERSION_TIME);
        self.send(address, CMD_READ_SCRATCHPAD)?;
        let mut scratchpad = [0u8; 9];
        self.bus.read(&mut scratchpad)?;
        Ok(scratchpad)
    }
}

#[cfg(not(target_os = "espidf"))]
impl Default for Ds18b20 {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(not(target_os = "espidf"))]
impl Ds18b20 {
    pub fn new() -> Self {
        Self { address: None }
    }
}

impl TemperatureSensor for Ds18b20 {
    #[cfg(target_os = "espidf")]
    fn detect(&mut self) -> bool {
        self.address = self.search();
        if let Some(address) = self.address {
            if let Err(e) = self.set_resolution(address) {
                warn!("DS18B20: setting resolution failed ({}), keeping default", e);
            }
        }
        self.address.is_some()
    }

    #[cfg(target_os = "espidf")]
    fn read_celsius(&mut self) -> Option<f32> {
        let address = self.address?;
        match self.convert_and_read(address) {
            Ok(scratchpad) => decode_scratchpad(&scratchpad),
            Err(e) => {
                warn!("DS18B20: read failed ({})", e);
                None
            }
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn detect(&mut self) -> bool {
        self.address = (SIM_RAW.load(Ordering::Relaxed) != SIM_ABSENT).then_some(u64::from(FAMILY_CODE));
        self.address.is_some()
    }

    #[cfg(not(target_os = "espidf"))]
    fn read_celsius(&mut self) -> Option<f32> {
        self.address?;
        let raw = i16::try_from(SIM_RAW.load(Ordering::Relaxed)).ok()?;
        decode_scratchpad(&scratchpad(raw, CONFIG_9_BIT))
    }
}

/// Temperature from a 9-byte scratchpad. `None` on a CRC mismatch or when
/// the register still holds its power-on value.
pub fn decode_scratchpad(scratchpad: &[u8; 9]) -> Option<f32> {
    if crc8(&scratchpad[..8]) != scratchpad[8] {
        debug!("DS18B20: scratchpad CRC mismatch");
        return None;
    }
    let raw = i16::from_le_bytes([scratchpad[0], scratchpad[1]]);
    if raw == POWER_ON_RAW {
        debug!("DS18B20: no conversion yet");
        return None;
    }
    // Below 12 bits the low fraction bits are undefined.
    let resolution_bits = 9 + ((scratchpad[4] >> 5) & 0x03);
    let undefined = 12 - resolution_bits;
    let raw = raw & !((1i16 << undefined) - 1);
    Some(f32::from(raw) / 16.0)
}

/// Dallas/Maxim CRC-8 (polynomial x^8 + x^5 + x^4 + 1, reflected).
pub fn crc8(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |mut crc, &byte| {
        let mut byte = byte;
        for _ in 0..8 {
            let mix = (crc ^ byte) & 0x01;
            crc >>= 1;
            if mix != 0 {
                crc ^= 0x8C;
            }
            byte >>= 1;
        }
        crc
    })
}

/// Scratchpad as the device would return it for `raw` at `config`.
#[cfg(any(test, not(target_os = "espidf")))]
fn scratchpad(raw: i16, config: u8) -> [u8; 9] {
    let [lsb, msb] = raw.to_le_bytes();
    let mut s = [lsb, msb, 0x4B, 0x46, config, 0xFF, 0x0C, 0x10, 0];
    s[8] = crc8(&s[..8]);
    s
}
