//! Relay actuation.
//!
//! Each evaluation compares the active set-point with the effective
//! temperature and switches the relay only on edges. Target and set-point
//! source publications are edge-triggered against the last published value.
//!
//! A heating period restored from storage does not close the relay by
//! itself. The relay stays released until the first evaluation that has a
//! usable temperature and confirms heating is still wanted.

use log::{debug, info, warn};

use crate::app::events::{Outbox, Publication};
use crate::app::ports::{RelayPort, StoragePort};
use crate::error::NoScheduleError;
use crate::schedule::resolver::Resolution;

use super::arbiter::{EffectiveTemperature, TemperatureSource};
use super::runtime::RuntimeAccumulator;
use super::{Mode, PackedTarget, SetpointSource};

/// What an evaluation did to the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// No usable temperature; nothing changed.
    Suspended,
    /// Relay left as it was.
    Unchanged { heating: bool },
    /// Relay switched on.
    Started,
    /// Relay closed again for a heating period restored after a restart.
    Resumed,
    /// Relay switched off.
    Stopped { runtime_secs: u32 },
}

/// Owns the heating state and the publish edge cache.
#[derive(Debug)]
pub struct ActuationController {
    accumulator: RuntimeAccumulator,
    min_valid_temperature: i16,
    last_target: Option<PackedTarget>,
    last_setpoint_source: Option<SetpointSource>,
    /// Whether the relay has been driven since construction.
    relay_synced: bool,
}

impl ActuationController {
    pub fn new(accumulator: RuntimeAccumulator, min_valid_temperature: i16) -> Self {
        Self {
            accumulator,
            min_valid_temperature,
            last_target: None,
            last_setpoint_source: None,
            relay_synced: false,
        }
    }

    pub fn is_heating(&self) -> bool {
        self.accumulator.is_heating()
    }

    /// Whether an evaluation has driven the relay since start-up.
    pub fn relay_synced(&self) -> bool {
        self.relay_synced
    }

    pub fn runtime(&self) -> &RuntimeAccumulator {
        &self.accumulator
    }

    pub fn last_target(&self) -> Option<PackedTarget> {
        self.last_target
    }

    /// Overwrite the cumulative runtime and announce it.
    pub fn set_runtime(&mut self, secs: u32, storage: &mut impl StoragePort, outbox: &mut Outbox) {
        self.accumulator.set_runtime(secs, storage);
        outbox.push(Publication::RuntimeSeconds(secs));
    }

    /// Run one actuation decision.
    ///
    /// An unusable temperature suspends everything, including the
    /// no-schedule shutdown. Without a schedule the heater is forced off.
    #[allow(clippy::too_many_arguments)]
    pub fn evaluate(
        &mut self,
        resolution: Result<&Resolution, NoScheduleError>,
        effective: EffectiveTemperature,
        mode: Mode,
        now: i64,
        relay: &mut impl RelayPort,
        storage: &mut impl StoragePort,
        outbox: &mut Outbox,
    ) -> Decision {
        if effective.source == TemperatureSource::None || effective.value < self.min_valid_temperature {
            debug!(
                "Actuation: suspended (source {:?}, value {})",
                effective.source, effective.value
            );
            return Decision::Suspended;
        }

        let resolution = match resolution {
            Ok(r) => r,
            Err(e) => {
                warn!("Actuation: {}, forcing heater off", e);
                return self.force_off(now, relay, storage, outbox);
            }
        };

        let target = PackedTarget::pack(resolution.entry.set_point, resolution.entry.minute_of_day);
        if self.last_target != Some(target) {
            info!("Actuation: target {}", target);
            self.last_target = Some(target);
            outbox.push(Publication::CurrentTarget(target));
        }

        let source = if resolution.from_override {
            SetpointSource::Override
        } else {
            SetpointSource::Schedule
        };
        if self.last_setpoint_source != Some(source) {
            self.last_setpoint_source = Some(source);
            outbox.push(Publication::SetpointSource(source));
        }

        let should_heat = mode.heating_enabled() && resolution.entry.set_point > effective.value;
        match (self.is_heating(), should_heat) {
            (false, true) => {
                info!(
                    "Actuation: heating on ({} < {})",
                    effective.value, resolution.entry.set_point
                );
                self.start(now, relay, storage, outbox);
                Decision::Started
            }
            (true, false) => {
                info!("Actuation: heating off (mode {:?}, {} >= {})", mode, effective.value, resolution.entry.set_point);
                let runtime_secs = self.stop(now, relay, storage, outbox);
                Decision::Stopped { runtime_secs }
            }
            (true, true) if !self.relay_synced => {
                info!(
                    "Actuation: resuming heating period from {:?}",
                    self.accumulator.started_at()
                );
                self.relay_synced = true;
                relay.set_heating(true);
                outbox.push(Publication::HeatingChanged(true));
                Decision::Resumed
            }
            (heating, _) => Decision::Unchanged { heating },
        }
    }

    /// Stop heating if it is on; otherwise a no-op.
    pub fn force_off(
        &mut self,
        now: i64,
        relay: &mut impl RelayPort,
        storage: &mut impl StoragePort,
        outbox: &mut Outbox,
    ) -> Decision {
        if self.is_heating() {
            let runtime_secs = self.stop(now, relay, storage, outbox);
            Decision::Stopped { runtime_secs }
        } else {
            Decision::Unchanged { heating: false }
        }
    }

    /// Forget what was last published so the next evaluation re-publishes.
    pub fn reset_edges(&mut self) {
        self.last_target = None;
        self.last_setpoint_source = None;
    }

    fn start(
        &mut self,
        now: i64,
        relay: &mut impl RelayPort,
        storage: &mut impl StoragePort,
        outbox: &mut Outbox,
    ) {
        self.accumulator.start(now, storage);
        self.relay_synced = true;
        relay.set_heating(true);
        outbox.push(Publication::HeatingChanged(true));
    }

    fn stop(
        &mut self,
        now: i64,
        relay: &mut impl RelayPort,
        storage: &mut impl StoragePort,
        outbox: &mut Outbox,
    ) -> u32 {
        let total = self.accumulator.stop(now, storage);
        self.relay_synced = true;
        relay.set_heating(false);
        outbox.push(Publication::HeatingChanged(false));
        outbox.push(Publication::RuntimeSeconds(total));
        total
    }
}
