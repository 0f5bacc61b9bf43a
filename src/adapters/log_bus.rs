//! Log-based attribute bus adapter.
//!
//! Implements [`AttributeBus`] by writing every attribute report to the
//! ESP-IDF logger (UART / USB-CDC). Used until the radio stack is wired in,
//! and handy on the bench. A Zigbee adapter implements the same trait.

use log::info;

use crate::app::ports::{AttributeBus, AttributeValue, BusError};

/// Adapter that logs every attribute report to the serial console.
#[derive(Debug, Default)]
pub struct LogAttributeBus {
    reports: u32,
}

impl LogAttributeBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of reports written so far.
    pub fn reports(&self) -> u32 {
        self.reports
    }
}

impl AttributeBus for LogAttributeBus {
    fn publish(
        &mut self,
        cluster_id: u16,
        attribute_id: u16,
        value: AttributeValue,
    ) -> Result<(), BusError> {
        self.reports = self.reports.wrapping_add(1);
        match value {
            AttributeValue::S16(v) => {
                let sign = if v < 0 { "-" } else { "" };
                let abs = v.unsigned_abs();
                info!(
                    "ATTR | 0x{:04X}/0x{:04X} = {}{}.{:02}",
                    cluster_id,
                    attribute_id,
                    sign,
                    abs / 100,
                    abs % 100
                );
            }
            other => info!("ATTR | 0x{:04X}/0x{:04X} = {:?}", cluster_id, attribute_id, other),
        }
        Ok(())
    }
}
