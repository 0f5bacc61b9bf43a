//! End-to-end tests: inbound commands → ScheduleEngine → relay + bus.

use std::time::Duration;

use thermostat::app::commands::ThermostatCommand;
use thermostat::app::ports::{AttributeValue, StorageExt, StoragePort};
use thermostat::app::service::ThermostatService;
use thermostat::config::ThermostatConfig;
use thermostat::control::{Mode, PackedTarget};
use thermostat::engine::{EngineState, ScheduleEngine};
use thermostat::schedule::{DayMask, Transition};
use thermostat::sensors::{SensorPresence, TemperatureObserver};

use crate::mock_hw::{at, FakeClock, MockRelay, MockStorage, RecordingBus, DAY};

type Engine = ScheduleEngine<MockStorage, MockRelay, FakeClock, RecordingBus>;

struct Rig {
    storage: MockStorage,
    relay: MockRelay,
    clock: FakeClock,
    bus: RecordingBus,
    presence: SensorPresence,
}

impl Rig {
    fn at(now: i64) -> Self {
        Self {
            storage: MockStorage::new(),
            relay: MockRelay::new(),
            clock: FakeClock::at(now),
            bus: RecordingBus::new(),
            presence: SensorPresence::new(),
        }
    }

    fn engine(&self) -> Engine {
        self.engine_with(ThermostatConfig::default())
    }

    fn engine_with(&self, config: ThermostatConfig) -> Engine {
        let svc = ThermostatService::new(
            config,
            self.storage.clone(),
            self.relay.clone(),
            self.clock.clone(),
            self.presence.clone(),
        );
        ScheduleEngine::new(svc, self.bus.clone())
    }
}

fn every_day(transitions: Vec<Transition>) -> ThermostatCommand {
    ThermostatCommand::SetWeeklyPattern {
        days: DayMask::from_bits(0b0111_1111),
        transitions,
    }
}

/// Heat mode with 21.00 all day.
fn heat_at_21(engine: &Engine) {
    engine.apply(every_day(vec![Transition::at(0, 0, 2100)])).unwrap();
    engine.apply(ThermostatCommand::SetMode(Mode::Heat.raw())).unwrap();
}

// ── Actuation + accounting ───────────────────────────────────

#[test]
fn runtime_grows_by_exactly_the_heating_interval() {
    let t0 = at(1, 9, 0);
    let rig = Rig::at(t0);
    let mut engine = rig.engine();
    heat_at_21(&engine);

    engine.apply(ThermostatCommand::SetRemoteTemperature(2000)).unwrap();
    engine.poll();
    assert!(rig.relay.energised());
    assert!(engine.with_service(|s| s.is_heating()));

    let t1 = t0 + 1_260;
    rig.clock.set(t1);
    engine.apply(ThermostatCommand::SetRemoteTemperature(2200)).unwrap();
    engine.poll();

    assert!(!rig.relay.energised());
    assert_eq!(engine.with_service(|s| s.runtime_secs()), 1_260);
    assert_eq!(
        rig.bus.values_of(0xFF00, 0x0000).last(),
        Some(&AttributeValue::U32(1_260))
    );
    assert_eq!(
        rig.bus.values_of(0x0201, 0x001E),
        vec![
            AttributeValue::Enum8(0x00),
            AttributeValue::Enum8(0x04),
            AttributeValue::Enum8(0x00),
        ]
    );
}

#[test]
fn restart_resumes_from_persisted_start() {
    let t = at(2, 6, 0);
    let rig = Rig::at(t);
    {
        let engine = rig.engine();
        heat_at_21(&engine);
        engine.apply(ThermostatCommand::SetRemoteTemperature(1900)).unwrap();
        assert!(rig.relay.energised());
    }

    // Power cycle: relay drops, process comes back 120 s later.
    let relay = MockRelay::new();
    rig.clock.set(t + 120);
    let svc = ThermostatService::new(
        ThermostatConfig::default(),
        rig.storage.clone(),
        relay.clone(),
        rig.clock.clone(),
        SensorPresence::new(),
    );
    let mut engine = ScheduleEngine::new(svc, rig.bus.clone());
    assert!(!relay.energised(), "relay stays released until evaluated");
    assert!(engine.with_service(|s| s.is_heating()));
    engine.poll();
    assert!(relay.energised(), "stored remote 19.00 still calls for heat");

    rig.clock.set(t + 300);
    engine.apply(ThermostatCommand::SetRemoteTemperature(2150)).unwrap();
    assert!(!relay.energised());
    assert_eq!(engine.with_service(|s| s.runtime_secs()), 300);
    assert_eq!(rig.storage.read_u32("thermostat", "runtime"), Ok(300));
}

#[test]
fn missing_schedule_forces_heater_off() {
    let t = at(0, 12, 0);
    let mut storage = MockStorage::new();
    storage.write_u8("thermostat", "heating", 1).unwrap();
    storage.write_i64("thermostat", "heat_start", t - 600).unwrap();
    let rig = Rig {
        storage,
        ..Rig::at(t)
    };
    let mut engine = rig.engine();
    assert!(!rig.relay.energised());

    engine.apply(ThermostatCommand::SetRemoteTemperature(1500)).unwrap();
    engine.poll();
    assert!(!rig.relay.energised());
    assert_eq!(engine.with_service(|s| s.runtime_secs()), 600);
}

#[test]
fn no_temperature_suspends_even_without_schedule() {
    let t = at(0, 12, 0);
    let mut storage = MockStorage::new();
    storage.write_u8("thermostat", "heating", 1).unwrap();
    storage.write_i64("thermostat", "heat_start", t - 600).unwrap();
    let rig = Rig {
        storage,
        ..Rig::at(t)
    };
    let mut engine = rig.engine();
    engine.poll();
    engine.poll();
    assert!(!rig.relay.energised());
    assert!(engine.with_service(|s| s.is_heating()));
    assert_eq!(rig.relay.switches(), 0);
}

#[test]
fn reboot_without_clock_keeps_heater_released() {
    let t = at(2, 6, 0);
    let rig = Rig::at(t);
    {
        let engine = rig.engine();
        heat_at_21(&engine);
        engine.apply(ThermostatCommand::SetRemoteTemperature(1900)).unwrap();
        assert!(rig.relay.energised());
    }

    // Reset: the RTC restarts near the epoch and no time sync arrives.
    let relay = MockRelay::new();
    rig.clock.set(5);
    let svc = ThermostatService::new(
        ThermostatConfig::default(),
        rig.storage.clone(),
        relay.clone(),
        rig.clock.clone(),
        SensorPresence::new(),
    );
    let mut engine = ScheduleEngine::new(svc, rig.bus.clone());
    for _ in 0..50 {
        engine.poll();
        rig.clock.advance(10);
    }
    assert_eq!(engine.state(), EngineState::WaitingForClock);
    assert!(!relay.energised());
    assert!(engine.with_service(|s| s.is_heating()));

    // Time arrives 200 s after the original start; 19.00 is still fresh.
    let handle = engine.handle();
    assert!(handle.on_attribute(0x000A, 0x0000, AttributeValue::UtcTime((t + 200) as u32)));
    engine.process_pending();
    engine.poll();
    assert_eq!(engine.state(), EngineState::Running);
    assert!(relay.energised());

    rig.clock.set(t + 500);
    engine.apply(ThermostatCommand::SetRemoteTemperature(2200)).unwrap();
    assert!(!relay.energised());
    assert_eq!(engine.with_service(|s| s.runtime_secs()), 500);
}

#[test]
fn corrupt_persisted_timestamps_do_not_panic() {
    let t = at(0, 12, 0);
    let mut storage = MockStorage::new();
    storage.write_i16("thermostat", "ovr_temp", 2400).unwrap();
    storage.write_i64("thermostat", "ovr_time", i64::MIN + 1).unwrap();
    storage.write_i16("thermostat", "rmt_temp", 1900).unwrap();
    storage.write_i64("thermostat", "rmt_time", i64::MIN).unwrap();
    storage.write_u8("thermostat", "heating", 1).unwrap();
    storage.write_i64("thermostat", "heat_start", i64::MIN).unwrap();
    let rig = Rig {
        storage,
        ..Rig::at(t)
    };
    let mut engine = rig.engine();
    heat_at_21(&engine);
    engine.poll();
    assert_eq!(
        rig.bus.values_of(0xFF00, 0x0001).last(),
        Some(&AttributeValue::U8(0)),
        "ancient remote reading is stale"
    );

    engine.apply(ThermostatCommand::SetRemoteTemperature(2500)).unwrap();
    let r = engine.with_service(|s| s.resolve_at(t)).unwrap();
    assert!(!r.from_override);
    assert!(!rig.relay.energised());
    assert_eq!(engine.with_service(|s| s.runtime_secs()), u32::MAX);
}

#[test]
fn lost_heat_start_write_does_not_inflate_runtime() {
    let t0 = at(1, 9, 0);
    let rig = Rig::at(t0);
    let mut engine = rig.engine();
    heat_at_21(&engine);

    // First period persists its start normally.
    engine.apply(ThermostatCommand::SetRemoteTemperature(2000)).unwrap();
    rig.clock.advance(100);
    engine.apply(ThermostatCommand::SetRemoteTemperature(2200)).unwrap();
    assert_eq!(engine.with_service(|s| s.runtime_secs()), 100);

    // The second start cannot be written; flash still holds t0.
    rig.clock.set(t0 + 50_000);
    rig.storage.fail_writes(true);
    engine.apply(ThermostatCommand::SetRemoteTemperature(2000)).unwrap();
    assert!(rig.relay.energised());
    rig.storage.fail_writes(false);

    rig.clock.advance(60);
    engine.apply(ThermostatCommand::SetRemoteTemperature(2200)).unwrap();
    engine.poll();
    assert!(!rig.relay.energised());
    assert_eq!(engine.with_service(|s| s.runtime_secs()), 160);
}

#[test]
fn readings_below_sentinel_floor_suspend() {
    let rig = Rig::at(at(3, 10, 0));
    let mut engine = rig.engine();
    heat_at_21(&engine);
    engine.apply(ThermostatCommand::SetRemoteTemperature(4)).unwrap();
    engine.poll();
    assert!(!rig.relay.energised());
    assert!(rig.bus.values_of(0xFF00, 0x0002).is_empty());
}

#[test]
fn off_mode_never_heats() {
    let rig = Rig::at(at(3, 10, 0));
    let mut engine = rig.engine();
    engine.apply(every_day(vec![Transition::at(0, 0, 2500)])).unwrap();
    engine.apply(ThermostatCommand::SetRemoteTemperature(1500)).unwrap();
    engine.poll();
    assert!(!rig.relay.energised());
    assert_eq!(engine.with_service(|s| s.mode()), Mode::Off);
}

// ── Override precedence ──────────────────────────────────────

#[test]
fn override_precedence_at_tuesday_three_pm() {
    use thermostat::schedule::store::ScheduleSlot;
    use thermostat::schedule::DayOfWeek;

    let rig = Rig::at(at(1, 14, 0));
    let engine = rig.engine();
    engine
        .apply(ThermostatCommand::SetSlotSchedules(vec![(
            ScheduleSlot::Day(DayOfWeek::Tuesday),
            vec![Transition::at(13, 0, 2000)],
        )]))
        .unwrap();
    engine.apply(ThermostatCommand::SetOverride(3000)).unwrap();

    rig.clock.set(at(1, 15, 0));
    let now = at(1, 15, 0);
    let r = engine.with_service(|s| s.resolve_at(now)).unwrap();
    assert!(r.from_override);
    assert_eq!(r.entry.set_point, 3000);

    engine
        .apply(ThermostatCommand::SetSlotSchedules(vec![(
            ScheduleSlot::Day(DayOfWeek::Tuesday),
            vec![Transition::at(13, 0, 2000), Transition::at(14, 30, 1800)],
        )]))
        .unwrap();
    let r = engine.with_service(|s| s.resolve_at(now)).unwrap();
    assert!(!r.from_override);
    assert_eq!(r.entry.set_point, 1800);
}

#[test]
fn override_expires_after_a_week() {
    let captured = at(0, 8, 0);
    let rig = Rig::at(captured);
    let engine = rig.engine();
    engine.apply(every_day(vec![Transition::at(6, 0, 1900)])).unwrap();
    engine.apply(ThermostatCommand::SetOverride(2600)).unwrap();

    let live = engine.with_service(|s| s.resolve_at(captured + 3600)).unwrap();
    assert!(live.from_override);
    assert_eq!(live.entry.set_point, 2600);

    for offset in [0, 1, 3600, 3 * DAY, 6 * DAY + 43_200] {
        let now = captured + 7 * DAY + offset;
        let r = engine.with_service(|s| s.resolve_at(now)).unwrap();
        assert!(!r.from_override, "override selected at +7d+{offset}s");
        assert_eq!(r.entry.set_point, 1900);
    }
}

#[test]
fn setpoint_source_follows_the_winner() {
    let rig = Rig::at(at(1, 14, 0));
    let mut engine = rig.engine();
    heat_at_21(&engine);
    engine.apply(ThermostatCommand::SetRemoteTemperature(2000)).unwrap();
    engine.apply(ThermostatCommand::SetOverride(2300)).unwrap();
    engine.poll();

    assert_eq!(
        rig.bus.values_of(0x0201, 0x0030),
        vec![AttributeValue::Enum8(1), AttributeValue::Enum8(0)]
    );
    assert_eq!(
        rig.bus.values_of(0xFF00, 0x0002).last(),
        Some(&AttributeValue::U32(PackedTarget::pack(2300, 14 * 60).raw()))
    );
}

// ── Source arbitration ───────────────────────────────────────

#[test]
fn remote_freshness_boundary() {
    let t = at(4, 7, 0);
    let rig = Rig::at(t);
    rig.presence.set(true);
    let mut engine = rig.engine();
    heat_at_21(&engine);

    engine.handle().on_temperature(1950);
    engine.process_pending();
    engine.apply(ThermostatCommand::SetRemoteTemperature(2300)).unwrap();
    assert!(!rig.relay.energised(), "fresh remote 23.00 is above target");

    rig.clock.set(t + 3599);
    engine.poll();
    assert_eq!(
        rig.bus.values_of(0xFF00, 0x0001).last(),
        Some(&AttributeValue::U8(2))
    );
    assert!(!rig.relay.energised());

    rig.clock.set(t + 3601);
    engine.poll();
    assert_eq!(
        rig.bus.values_of(0xFF00, 0x0001).last(),
        Some(&AttributeValue::U8(1))
    );
    assert!(rig.relay.energised(), "stale remote falls back to local 19.50");
}

#[test]
fn absent_sensor_ignores_old_local_reading() {
    let t = at(4, 7, 0);
    let rig = Rig::at(t);
    rig.presence.set(true);
    let mut engine = rig.engine();
    heat_at_21(&engine);
    engine.handle().on_temperature(1800);
    assert_eq!(engine.process_pending(), 1);
    engine.poll();
    assert!(rig.relay.energised());

    rig.presence.set(false);
    rig.clock.advance(60);
    engine.poll();
    assert_eq!(
        rig.bus.values_of(0xFF00, 0x0001).last(),
        Some(&AttributeValue::U8(0))
    );
    assert!(rig.relay.energised(), "no source suspends, relay is left alone");
}

// ── Publishing ───────────────────────────────────────────────

#[test]
fn target_is_published_on_change_only() {
    let rig = Rig::at(at(0, 9, 0));
    let mut engine = rig.engine();
    engine.apply(every_day(vec![Transition::at(8, 0, 2100)])).unwrap();
    engine.apply(ThermostatCommand::SetRemoteTemperature(2000)).unwrap();

    engine.poll();
    rig.clock.advance(60);
    engine.poll();
    rig.clock.advance(60);
    engine.poll();

    assert_eq!(
        rig.bus.values_of(0xFF00, 0x0002),
        vec![AttributeValue::U32((2100 << 16) | 480)]
    );
}

#[test]
fn periodic_republish_repeats_current_values() {
    let rig = Rig::at(at(0, 9, 0));
    let mut engine = rig.engine_with(ThermostatConfig {
        republish_interval_ticks: 2,
        ..Default::default()
    });
    engine.apply(every_day(vec![Transition::at(8, 0, 2100)])).unwrap();
    engine.apply(ThermostatCommand::SetRemoteTemperature(2000)).unwrap();
    rig.bus.clear();

    for _ in 0..4 {
        rig.clock.advance(60);
        engine.poll();
    }
    assert_eq!(rig.bus.values_of(0xFF00, 0x0002).len(), 2);
    assert_eq!(rig.bus.values_of(0xFF00, 0x0001).len(), 2);
}

#[test]
fn bus_failures_do_not_stop_the_engine() {
    let rig = Rig::at(at(0, 9, 0));
    rig.bus.reject(true);
    let mut engine = rig.engine();
    heat_at_21(&engine);
    engine.apply(ThermostatCommand::SetRemoteTemperature(2000)).unwrap();
    engine.poll();
    assert!(rig.relay.energised());
    assert!(rig.bus.reports().is_empty());
}

#[test]
fn storage_failures_keep_memory_authoritative() {
    let rig = Rig::at(at(0, 9, 0));
    rig.storage.fail_writes(true);
    let mut engine = rig.engine();
    heat_at_21(&engine);
    engine.apply(ThermostatCommand::SetRemoteTemperature(2000)).unwrap();
    engine.poll();
    assert!(rig.relay.energised());
    assert_eq!(engine.with_service(|s| s.schedule().len()), 7);

    rig.clock.advance(600);
    engine.apply(ThermostatCommand::SetRemoteTemperature(2200)).unwrap();
    assert_eq!(engine.with_service(|s| s.runtime_secs()), 600);
}

// ── State machine ────────────────────────────────────────────

#[test]
fn engine_waits_then_runs_on_the_minute() {
    let rig = Rig::at(5_000);
    let mut engine = rig.engine();
    assert_eq!(engine.poll(), Duration::from_secs(10));
    assert_eq!(engine.state(), EngineState::WaitingForClock);

    let handle = engine.handle();
    assert!(handle.on_attribute(0x000A, 0x0000, AttributeValue::UtcTime(at(0, 9, 0) as u32 + 42)));
    assert_eq!(engine.process_pending(), 1);

    assert_eq!(engine.poll(), Duration::from_secs(18));
    assert_eq!(engine.state(), EngineState::Running);
}

#[test]
fn network_time_is_requested_at_boot_and_every_interval() {
    let rig = Rig::at(5_000);
    let mut engine = rig.engine();
    engine.poll();
    assert_eq!(rig.clock.sync_requests(), 1);

    for _ in 0..10 {
        rig.clock.advance(10);
        engine.poll();
    }
    assert_eq!(rig.clock.sync_requests(), 1, "no retry before the interval");

    let synced = at(0, 9, 0);
    engine.apply(ThermostatCommand::SyncUtcTime(synced)).unwrap();
    rig.clock.set(synced + 9_999);
    engine.poll();
    assert_eq!(rig.clock.sync_requests(), 1);

    rig.clock.set(synced + 10_000);
    engine.poll();
    assert_eq!(rig.clock.sync_requests(), 2);
}

#[test]
fn clear_schedule_requests_time_sync_only() {
    let rig = Rig::at(at(0, 9, 0));
    let engine = rig.engine();
    engine.apply(every_day(vec![Transition::at(8, 0, 2100)])).unwrap();
    let handle = engine.handle();
    assert!(handle.on_command(0x0201, 0x03, &[]));
    engine.process_pending();
    assert_eq!(rig.clock.sync_requests(), 1);
    assert_eq!(engine.with_service(|s| s.schedule().len()), 7);
}

#[test]
fn network_schedule_command_reaches_the_store() {
    let rig = Rig::at(at(0, 9, 0));
    let engine = rig.engine();
    // Sat only: 07:00 → 22.00
    let payload = [1, 0b0100_0000, 0x01, 0xA4, 0x01, 0x98, 0x08];
    assert!(engine.handle().on_command(0x0201, 0x01, &payload));
    engine.process_pending();
    assert_eq!(
        engine.with_service(|s| s.schedule().day_schedule(thermostat::schedule::DayOfWeek::Saturday).to_vec()),
        vec![Transition::at(7, 0, 2200)]
    );
    assert!(rig.storage.exists("thermostat", "sched_6"));
}
