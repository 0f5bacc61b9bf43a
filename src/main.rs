//! Thermostat Firmware — Main Entry Point
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  HeaterRelay   SystemClock   NvsAdapter   LogAttributeBus      │
//! │  (RelayPort)   (ClockPort)   (Config+NVS) (AttributeBus)       │
//! │  Ds18b20 ─▶ SensorService      console (JSON lines ⇄ UART)     │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │        ThermostatService (pure decision logic)         │    │
//! │  │  Schedule · Resolver · Arbiter · Actuation · Runtime   │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  ScheduleEngine (clock-aligned tick + inbound dispatcher)      │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Threads: the engine runs on the main task; the sensor poll, the console
//! reader and the time-request forwarder each get a small thread.
#![deny(unused_must_use)]

use std::io;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::Result;
use log::{info, warn};

use esp_idf_hal::gpio::{AnyIOPin, AnyOutputPin, PinDriver};
use esp_idf_hal::onewire::OWDriver;
use esp_idf_hal::peripherals::Peripherals;

use thermostat::adapters::console;
use thermostat::adapters::ds18b20::Ds18b20;
use thermostat::adapters::log_bus::LogAttributeBus;
use thermostat::adapters::nvs::NvsAdapter;
use thermostat::adapters::relay::HeaterRelay;
use thermostat::adapters::time::SystemClock;
use thermostat::app::ports::ConfigPort;
use thermostat::app::service::ThermostatService;
use thermostat::config::ThermostatConfig;
use thermostat::engine::ScheduleEngine;
use thermostat::error::Error;
use thermostat::sensors::SensorService;

/// How often the forwarder checks for a pending time request.
const SYNC_POLL: Duration = Duration::from_secs(1);

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("Thermostat v{}", env!("CARGO_PKG_VERSION"));
    let peripherals = Peripherals::take()?;

    // ── 2. Load config from NVS (or defaults) ─────────────────
    let nvs = match NvsAdapter::new() {
        Ok(n) => n,
        Err(e) => {
            warn!("NVS init failed ({}), running without persistence", e);
            NvsAdapter::default()
        }
    };
    let config = match nvs.load() {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!("NVS config load failed ({}), using defaults", e);
            ThermostatConfig::default()
        }
    };

    // ── 3. Construct adapters ─────────────────────────────────
    // SAFETY: the relay GPIO is not claimed by any other driver.
    let pin = unsafe { AnyOutputPin::new(i32::from(config.heater_gpio)) };
    let relay = HeaterRelay::new(PinDriver::output(pin)?);
    let clock = SystemClock::new();
    let sync_requests = clock.sync_requests();

    // SAFETY: validated to differ from the relay GPIO; nothing else uses it.
    let onewire_pin = unsafe { AnyIOPin::new(i32::from(config.onewire_gpio)) };
    let onewire = OWDriver::new(onewire_pin, peripherals.rmt.channel0)?;
    let sensors = SensorService::new(Ds18b20::new(onewire));
    let sensor_period = Duration::from_secs(u64::from(config.sensor_period_secs));

    let bus = LogAttributeBus::new();

    // ── 4. Service + engine ───────────────────────────────────
    let service = ThermostatService::new(config, nvs, relay, clock, sensors.presence());
    let engine = ScheduleEngine::new(service, bus);
    let handle = engine.handle();
    sensors
        .subscribe(Arc::new(handle.clone()))
        .map_err(Error::from)?;

    // ── 5. Worker threads ─────────────────────────────────────
    thread::Builder::new()
        .name("sensors".into())
        .stack_size(4 * 1024)
        .spawn(move || {
            sensors.run(sensor_period);
        })?;
    thread::Builder::new()
        .name("console".into())
        .stack_size(8 * 1024)
        .spawn(move || {
            console::serve(io::stdin().lock(), &handle);
        })?;
    thread::Builder::new()
        .name("time-sync".into())
        .stack_size(4 * 1024)
        .spawn(move || {
            console::run_sync_forwarder(sync_requests, SYNC_POLL);
        })?;

    info!("System ready. Entering engine loop.");
    engine.run();
    Ok(())
}
