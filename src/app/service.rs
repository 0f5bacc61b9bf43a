//! Application service — the hexagonal core.
//!
//! [`ThermostatService`] is the aggregate that owns every piece of mutable
//! decision state. The engine keeps it behind a single lock: a tick's
//! evaluation and every inbound mutation run as methods on it, so they can
//! never interleave. Publications are queued in an [`Outbox`] and sent by
//! the caller after the lock is released.
//!
//! ```text
//!  ThermostatCommand ──▶ ┌──────────────────────────────┐ ──▶ Outbox
//!                        │      ThermostatService        │
//!        ClockPort ────▶ │ Schedule · Arbiter · Actuation│ ──▶ RelayPort
//!                        └──────────────┬───────────────┘
//!                                       ▼
//!                                  StoragePort
//! ```

use log::{debug, info, warn};

use crate::config::ThermostatConfig;
use crate::control::actuation::{ActuationController, Decision};
use crate::control::arbiter::{SourceArbiter, TemperatureReading};
use crate::control::runtime::RuntimeAccumulator;
use crate::control::Mode;
use crate::error::{Error, NoScheduleError, Result};
use crate::schedule::resolver::{self, ManualOverride, Resolution};
use crate::schedule::store::ScheduleStore;
use crate::sensors::SensorPresence;

use super::commands::ThermostatCommand;
use super::events::{Outbox, Publication};
use super::keys;
use super::ports::{ClockPort, RelayPort, StorageError, StorageExt, StoragePort, WallClock};

/// Largest accepted timezone offset magnitude.
const MAX_TZ_OFFSET_SECS: i32 = 86_400;

// ───────────────────────────────────────────────────────────────
// ThermostatService
// ───────────────────────────────────────────────────────────────

pub struct ThermostatService<S, R, C> {
    config: ThermostatConfig,
    storage: S,
    relay: R,
    clock: C,
    sensor: SensorPresence,

    schedule: ScheduleStore,
    manual: Option<ManualOverride>,
    local: Option<TemperatureReading>,
    remote: Option<TemperatureReading>,
    mode: Mode,
    tz_offset_secs: i32,

    arbiter: SourceArbiter,
    actuation: ActuationController,
    tick_count: u64,
    /// Clock reading when a time sync was last requested or received.
    last_time_sync: Option<i64>,
}

impl<S: StoragePort, R: RelayPort, C: ClockPort> ThermostatService<S, R, C> {
    /// Construct the service and restore persisted state.
    ///
    /// Does **not** touch the relay — call [`start`](Self::start) next.
    pub fn new(
        config: ThermostatConfig,
        storage: S,
        relay: R,
        clock: C,
        sensor: SensorPresence,
    ) -> Self {
        let schedule = ScheduleStore::load(&storage);
        let accumulator = RuntimeAccumulator::load(&storage);

        let mode = match load(&storage, keys::MODE, StorageExt::read_u8) {
            Some(raw) => Mode::from_raw(raw).unwrap_or_else(|| {
                warn!("Service: stored mode 0x{:02x} unknown, using Off", raw);
                Mode::Off
            }),
            None => Mode::Off,
        };
        let manual = load(&storage, keys::OVERRIDE_SET_POINT, StorageExt::read_i16)
            .zip(load(&storage, keys::OVERRIDE_CAPTURED_AT, StorageExt::read_i64))
            .map(|(set_point, at)| ManualOverride::new(set_point, at));
        let remote = load(&storage, keys::REMOTE_TEMPERATURE, StorageExt::read_i16)
            .zip(load(&storage, keys::REMOTE_RECEIVED_AT, StorageExt::read_i64))
            .map(|(value, at)| TemperatureReading::new(value, at));
        let tz_offset_secs = load(&storage, keys::TZ_OFFSET, StorageExt::read_i32).unwrap_or(0);

        info!(
            "Service: mode={:?} override={:?} remote={:?} tz={}s",
            mode, manual, remote, tz_offset_secs
        );

        Self {
            arbiter: SourceArbiter::new(i64::from(config.remote_freshness_secs)),
            actuation: ActuationController::new(accumulator, config.min_valid_temperature),
            config,
            storage,
            relay,
            clock,
            sensor,
            schedule,
            manual,
            local: None,
            remote,
            mode,
            tz_offset_secs,
            tick_count: 0,
            last_time_sync: None,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Release the relay and announce it together with the cumulative
    /// runtime. A heating period restored from storage keeps its start time
    /// but the relay only closes again once an evaluation asks for heat.
    pub fn start(&mut self, outbox: &mut Outbox) {
        self.relay.set_heating(false);
        outbox.push(Publication::HeatingChanged(false));
        outbox.push(Publication::RuntimeSeconds(
            self.actuation.runtime().runtime_secs(),
        ));
        info!(
            "Service started (restored heating period: {})",
            self.actuation.is_heating()
        );
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Ask the network for the time at start-up and then every
    /// `time_sync_interval_secs`. A clock that moved backwards past the last
    /// request also triggers one. Returns whether a request was made.
    pub fn maintain_time_sync(&mut self) -> bool {
        let now = self.clock.now_epoch_secs();
        let interval = i64::from(self.config.time_sync_interval_secs);
        let due = match self.last_time_sync {
            None => true,
            Some(_) if interval == 0 => false,
            Some(last) => now
                .checked_sub(last)
                .map_or(true, |elapsed| elapsed < 0 || elapsed >= interval),
        };
        if due {
            debug!("Service: requesting network time");
            self.clock.request_sync();
            self.last_time_sync = Some(now);
        }
        due
    }

    /// Whether the wall clock looks synchronised.
    pub fn clock_valid(&self) -> bool {
        self.clock.wall_clock().year >= self.config.min_valid_year
    }

    /// One scheduled evaluation. Every `republish_interval_ticks` ticks the
    /// edge caches are cleared first so current values go out again.
    pub fn tick(&mut self, outbox: &mut Outbox) -> Decision {
        self.tick_count += 1;
        let every = u64::from(self.config.republish_interval_ticks);
        if every > 0 && self.tick_count % every == 0 {
            debug!("Service: periodic re-publish");
            self.arbiter.reset_edge();
            self.actuation.reset_edges();
        }
        self.evaluate(outbox)
    }

    /// Arbitration → resolution → actuation at the current time.
    pub fn evaluate(&mut self, outbox: &mut Outbox) -> Decision {
        let now = self.clock.now_epoch_secs();
        let effective = self.arbiter.resolve_temperature(
            self.local,
            self.sensor.is_found(),
            self.remote,
            now,
            outbox,
        );
        let resolution = self.resolve_at(now);
        self.actuation.evaluate(
            resolution.as_ref().map_err(|e| *e),
            effective,
            self.mode,
            now,
            &mut self.relay,
            &mut self.storage,
            outbox,
        )
    }

    /// Active set-point at `now` in local time.
    pub fn resolve_at(&self, now: i64) -> core::result::Result<Resolution, NoScheduleError> {
        let utc = WallClock::from_epoch(now);
        let (weekday, minute) =
            resolver::local_query_point(utc.weekday, utc.minute_of_day, self.tz_offset_secs);
        let manual = self.manual.and_then(|m| {
            m.snapshot(
                now,
                self.tz_offset_secs,
                i64::from(self.config.override_lifetime_secs),
            )
        });
        resolver::resolve_active(weekday, minute, self.schedule.entries(), manual)
    }

    // ── Command handling ──────────────────────────────────────

    /// Apply an inbound command. Decision inputs (mode, override, remote
    /// temperature) trigger an immediate evaluation once the clock is valid.
    pub fn handle_command(&mut self, cmd: ThermostatCommand, outbox: &mut Outbox) -> Result<()> {
        match cmd {
            ThermostatCommand::SetWeeklyPattern { days, transitions } => {
                self.schedule
                    .set_weekly_pattern(days, &transitions, &mut self.storage)?;
            }
            ThermostatCommand::SetSlotSchedules(slots) => {
                self.schedule.replace_slots(&slots, &mut self.storage)?;
            }
            ThermostatCommand::ClearSchedule => {
                info!("Service: clear schedule received, requesting time sync");
                self.clock.request_sync();
            }
            ThermostatCommand::SetMode(raw) => {
                self.mode = Mode::from_raw(raw).unwrap_or_else(|| {
                    warn!("Service: unknown mode 0x{:02x}, treating as Off", raw);
                    Mode::Off
                });
                info!("Service: mode {:?}", self.mode);
                self.persist(keys::MODE, |s| s.write_u8(keys::NAMESPACE, keys::MODE, raw));
                self.reevaluate(outbox);
            }
            ThermostatCommand::SetOverride(set_point) => {
                let now = self.clock.now_epoch_secs();
                self.manual = Some(ManualOverride::new(set_point, now));
                info!("Service: manual set-point {} at {}", set_point, now);
                self.persist(keys::OVERRIDE_SET_POINT, |s| {
                    s.write_i16(keys::NAMESPACE, keys::OVERRIDE_SET_POINT, set_point)
                });
                self.persist(keys::OVERRIDE_CAPTURED_AT, |s| {
                    s.write_i64(keys::NAMESPACE, keys::OVERRIDE_CAPTURED_AT, now)
                });
                self.reevaluate(outbox);
            }
            ThermostatCommand::SetRemoteTemperature(value) => {
                let now = self.clock.now_epoch_secs();
                self.remote = Some(TemperatureReading::new(value, now));
                debug!("Service: remote temperature {}", value);
                self.persist(keys::REMOTE_TEMPERATURE, |s| {
                    s.write_i16(keys::NAMESPACE, keys::REMOTE_TEMPERATURE, value)
                });
                self.persist(keys::REMOTE_RECEIVED_AT, |s| {
                    s.write_i64(keys::NAMESPACE, keys::REMOTE_RECEIVED_AT, now)
                });
                self.reevaluate(outbox);
            }
            ThermostatCommand::SetLocalTemperature(value) => {
                let now = self.clock.now_epoch_secs();
                self.local = Some(TemperatureReading::new(value, now));
                outbox.push(Publication::LocalTemperature(value));
            }
            ThermostatCommand::SetRuntime(secs) => {
                info!("Service: runtime set to {}s", secs);
                self.actuation
                    .set_runtime(secs, &mut self.storage, outbox);
            }
            ThermostatCommand::SyncUtcTime(epoch) => {
                info!("Service: clock set to {}", epoch);
                self.clock.set_utc(epoch);
                self.last_time_sync = Some(epoch);
            }
            ThermostatCommand::SyncLocalTime(local) => {
                let offset = local.saturating_sub(self.clock.now_epoch_secs());
                let secs = i32::try_from(offset).unwrap_or(i32::MAX);
                return self.handle_command(ThermostatCommand::SetTimeZoneOffset(secs), outbox);
            }
            ThermostatCommand::SetTimeZoneOffset(secs) => {
                if secs.unsigned_abs() > MAX_TZ_OFFSET_SECS.unsigned_abs() {
                    return Err(Error::InvalidTimeZone(secs));
                }
                self.tz_offset_secs = secs;
                info!("Service: timezone offset {}s", secs);
                self.persist(keys::TZ_OFFSET, |s| {
                    s.write_i32(keys::NAMESPACE, keys::TZ_OFFSET, secs)
                });
            }
        }
        Ok(())
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn config(&self) -> &ThermostatConfig {
        &self.config
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn relay(&self) -> &R {
        &self.relay
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn schedule(&self) -> &ScheduleStore {
        &self.schedule
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn manual_override(&self) -> Option<ManualOverride> {
        self.manual
    }

    pub fn remote_reading(&self) -> Option<TemperatureReading> {
        self.remote
    }

    pub fn tz_offset_secs(&self) -> i32 {
        self.tz_offset_secs
    }

    /// Whether a heating period is open. After a restart this can be true
    /// while the relay is still released.
    pub fn is_heating(&self) -> bool {
        self.actuation.is_heating()
    }

    pub fn runtime_secs(&self) -> u32 {
        self.actuation.runtime().runtime_secs()
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    // ── Internal helpers ──────────────────────────────────────

    fn reevaluate(&mut self, outbox: &mut Outbox) {
        if self.clock_valid() {
            self.evaluate(outbox);
        } else {
            debug!("Service: clock not set, evaluation deferred");
        }
    }

    fn persist(
        &mut self,
        key: &str,
        write: impl FnOnce(&mut S) -> core::result::Result<(), StorageError>,
    ) {
        if let Err(e) = write(&mut self.storage) {
            warn!("Service: persisting {} failed: {}", key, e);
        }
    }
}

/// Read one persisted scalar; missing keys are silent, other failures logged.
fn load<S: StoragePort, T>(
    storage: &S,
    key: &str,
    read: fn(&S, &str, &str) -> core::result::Result<T, StorageError>,
) -> Option<T> {
    match read(storage, keys::NAMESPACE, key) {
        Ok(v) => Some(v),
        Err(StorageError::NotFound) => None,
        Err(e) => {
            warn!("Service: {} unreadable ({})", key, e);
            None
        }
    }
}
