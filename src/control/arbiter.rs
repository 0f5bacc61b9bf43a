//! Temperature source arbitration.
//!
//! A fresh remote reading (pushed over the network by a room sensor) beats
//! the on-board sensor; the sensor is used only while it is present. With
//! neither, the source is `None` and actuation is suspended.

use log::info;

use crate::app::events::{Outbox, Publication};

/// Where the effective temperature came from. Wire values are the
/// discriminants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TemperatureSource {
    None = 0,
    Local = 1,
    Remote = 2,
}

/// A reading in hundredths of a degree with its receive time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TemperatureReading {
    pub value: i16,
    pub received_at: i64,
}

impl TemperatureReading {
    pub const fn new(value: i16, received_at: i64) -> Self {
        Self { value, received_at }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffectiveTemperature {
    pub value: i16,
    pub source: TemperatureSource,
}

impl EffectiveTemperature {
    pub const NONE: Self = Self {
        value: 0,
        source: TemperatureSource::None,
    };
}

/// Picks the effective temperature and reports source changes.
#[derive(Debug)]
pub struct SourceArbiter {
    freshness_secs: i64,
    last_source: Option<TemperatureSource>,
}

impl SourceArbiter {
    pub fn new(freshness_secs: i64) -> Self {
        Self {
            freshness_secs,
            last_source: None,
        }
    }

    /// Resolve the effective temperature at `now`. A change of source
    /// (including the first resolution) queues a publication.
    pub fn resolve_temperature(
        &mut self,
        local: Option<TemperatureReading>,
        sensor_present: bool,
        remote: Option<TemperatureReading>,
        now: i64,
        outbox: &mut Outbox,
    ) -> EffectiveTemperature {
        let effective = select(local, sensor_present, remote, now, self.freshness_secs);
        if self.last_source != Some(effective.source) {
            info!(
                "Arbiter: source {:?} -> {:?}",
                self.last_source, effective.source
            );
            self.last_source = Some(effective.source);
            outbox.push(Publication::TemperatureSource(effective.source));
        }
        effective
    }

    /// Forget the last published source so the next resolution re-publishes.
    pub fn reset_edge(&mut self) {
        self.last_source = None;
    }
}

/// Pure selection rule.
pub fn select(
    local: Option<TemperatureReading>,
    sensor_present: bool,
    remote: Option<TemperatureReading>,
    now: i64,
    freshness_secs: i64,
) -> EffectiveTemperature {
    let fresh = |r: &TemperatureReading| {
        r.value > 0
            && now
                .checked_sub(r.received_at)
                .is_some_and(|age| age <= freshness_secs)
    };
    if let Some(r) = remote.filter(fresh) {
        return EffectiveTemperature {
            value: r.value,
            source: TemperatureSource::Remote,
        };
    }
    match local {
        Some(l) if sensor_present => EffectiveTemperature {
            value: l.value,
            source: TemperatureSource::Local,
        },
        _ => EffectiveTemperature::NONE,
    }
}
