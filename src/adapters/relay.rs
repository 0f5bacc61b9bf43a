//! Heater relay driver.
//!
//! Drives the relay coil through any `embedded_hal` output pin, so the same
//! adapter runs on an ESP-IDF `PinDriver` and on a test double. Pin errors
//! are logged; the commanded state is still recorded so the domain's view
//! of the heater never disagrees with what it asked for.

use embedded_hal::digital::OutputPin;
use log::{debug, warn};

use crate::app::ports::RelayPort;

pub struct HeaterRelay<P> {
    pin: P,
    on: bool,
}

impl<P: OutputPin> HeaterRelay<P> {
    /// Take the pin and drive it low so the heater starts released.
    pub fn new(mut pin: P) -> Self {
        if let Err(e) = pin.set_low() {
            warn!("Relay: initial release failed: {:?}", e);
        }
        Self { pin, on: false }
    }

    pub fn into_inner(self) -> P {
        self.pin
    }
}

impl<P: OutputPin> RelayPort for HeaterRelay<P> {
    fn set_heating(&mut self, on: bool) {
        let result = if on {
            self.pin.set_high()
        } else {
            self.pin.set_low()
        };
        if let Err(e) = result {
            warn!("Relay: drive {} failed: {:?}", if on { "high" } else { "low" }, e);
        }
        debug!("Relay: heater {}", if on { "on" } else { "off" });
        self.on = on;
    }

    fn is_on(&self) -> bool {
        self.on
    }
}
