//! Outbound publications emitted by the application core.
//!
//! The service never talks to the attribute bus while it holds its own
//! state lock. Instead every mutation and evaluation appends to an
//! [`Outbox`], which the engine drains after the lock is released.

use log::warn;

use crate::control::arbiter::TemperatureSource;
use crate::control::{PackedTarget, SetpointSource};

/// Capacity of one outbox; a single tick emits at most six publications.
pub const OUTBOX_CAPACITY: usize = 8;

/// A value the outside world should learn about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Publication {
    /// Heater relay switched on or off.
    HeatingChanged(bool),
    /// Cumulative heating seconds after a stop.
    RuntimeSeconds(u32),
    /// Effective temperature source changed.
    TemperatureSource(TemperatureSource),
    /// Active set-point and its start minute changed.
    CurrentTarget(PackedTarget),
    /// Active set-point switched between override and schedule.
    SetpointSource(SetpointSource),
    /// Fresh reading from the on-board sensor.
    LocalTemperature(i16),
}

/// Bounded list of pending publications.
#[derive(Debug, Default)]
pub struct Outbox {
    pending: heapless::Vec<Publication, OUTBOX_CAPACITY>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a publication; on overflow it is dropped with a warning.
    pub fn push(&mut self, publication: Publication) {
        if self.pending.push(publication).is_err() {
            warn!("Outbox: full, dropping {:?}", publication);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Publication> {
        self.pending.iter()
    }

    /// Remove and return every pending publication in push order.
    pub fn drain(&mut self) -> impl Iterator<Item = Publication> {
        let taken = core::mem::take(&mut self.pending);
        taken.into_iter()
    }
}
