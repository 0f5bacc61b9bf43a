//! Sensor subsystem — the on-board temperature sensor and its subscribers.
//!
//! [`SensorService`] polls one [`TemperatureSensor`], tracks whether a sensor
//! is currently present and fans each reading out to registered
//! [`TemperatureObserver`]s. The observer list is copied before each
//! dispatch pass, so an observer may subscribe others without deadlocking.
//!
//! ```text
//!  sensor ─▶ SensorService ──┬──▶ observer (engine handle)
//!                  │         └──▶ observer ...
//!                  ▼
//!           SensorPresence (shared flag read by the engine)
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use log::{debug, info, warn};

use crate::error::SensorError;

/// Maximum number of registered observers.
pub const MAX_OBSERVERS: usize = 4;

/// A temperature sensor on some bus.
pub trait TemperatureSensor: Send {
    /// Look for the device; `true` when one answers.
    fn detect(&mut self) -> bool;

    /// Current temperature in °C, or `None` when the device did not answer.
    fn read_celsius(&mut self) -> Option<f32>;
}

/// Receives every successful reading, in hundredths of a degree.
pub trait TemperatureObserver: Send + Sync {
    fn on_temperature(&self, hundredths: i16);
}

/// Shared "sensor present" flag.
#[derive(Debug, Clone, Default)]
pub struct SensorPresence(Arc<AtomicBool>);

impl SensorPresence {
    /// A flag that starts out absent.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_found(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub fn set(&self, found: bool) {
        self.0.store(found, Ordering::Release);
    }
}

type ObserverList = heapless::Vec<Arc<dyn TemperatureObserver>, MAX_OBSERVERS>;

pub struct SensorService<P> {
    device: P,
    presence: SensorPresence,
    observers: Mutex<ObserverList>,
}

impl<P: TemperatureSensor> SensorService<P> {
    pub fn new(device: P) -> Self {
        Self {
            device,
            presence: SensorPresence::new(),
            observers: Mutex::new(ObserverList::new()),
        }
    }

    /// Handle on the presence flag for consumers that only need to know
    /// whether a sensor is attached.
    pub fn presence(&self) -> SensorPresence {
        self.presence.clone()
    }

    pub fn is_found(&self) -> bool {
        self.presence.is_found()
    }

    pub fn subscribe(&self, observer: Arc<dyn TemperatureObserver>) -> Result<(), SensorError> {
        self.observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(observer)
            .map_err(|_| SensorError::ObserverListFull)
    }

    /// One poll: (re)detect the sensor if needed, read it, and dispatch the
    /// reading. A sensor that stops answering is marked absent.
    pub fn sample(&mut self) -> Option<i16> {
        if !self.presence.is_found() {
            if !self.device.detect() {
                debug!("Sensors: no sensor found");
                return None;
            }
            info!("Sensors: sensor found");
            self.presence.set(true);
        }

        let Some(celsius) = self.device.read_celsius() else {
            warn!("Sensors: sensor stopped answering");
            self.presence.set(false);
            return None;
        };
        let Some(hundredths) = celsius_to_hundredths(celsius) else {
            warn!("Sensors: implausible reading {}", celsius);
            return None;
        };

        let observers = self
            .observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for observer in &observers {
            observer.on_temperature(hundredths);
        }
        Some(hundredths)
    }

    /// Poll forever on the calling thread.
    pub fn run(mut self, period: Duration) -> ! {
        info!("Sensors: polling every {:?}", period);
        loop {
            self.sample();
            std::thread::sleep(period);
        }
    }
}

/// °C to hundredths of a degree; `None` for non-finite or out-of-range values.
pub fn celsius_to_hundredths(celsius: f32) -> Option<i16> {
    let scaled = (celsius * 100.0).round();
    if scaled.is_finite() && scaled >= f32::from(i16::MIN) && scaled <= f32::from(i16::MAX) {
        Some(scaled as i16)
    } else {
        None
    }
}
