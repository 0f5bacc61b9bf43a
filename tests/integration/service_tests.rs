//! ThermostatService against mock ports: persistence, restart and the
//! command surface that does not need the engine.

use thermostat::app::commands::ThermostatCommand;
use thermostat::app::events::{Outbox, Publication};
use thermostat::app::ports::{StorageExt, StoragePort};
use thermostat::app::service::ThermostatService;
use thermostat::config::ThermostatConfig;
use thermostat::control::Mode;
use thermostat::error::{Error, ScheduleError};
use thermostat::schedule::{DayMask, DayOfWeek, Transition};
use thermostat::sensors::SensorPresence;

use crate::mock_hw::{at, FakeClock, MockRelay, MockStorage};

type Service = ThermostatService<MockStorage, MockRelay, FakeClock>;

fn service(storage: &MockStorage, clock: &FakeClock) -> Service {
    ThermostatService::new(
        ThermostatConfig::default(),
        storage.clone(),
        MockRelay::new(),
        clock.clone(),
        SensorPresence::new(),
    )
}

fn drained(outbox: &mut Outbox) -> Vec<Publication> {
    outbox.drain().collect()
}

#[test]
fn identical_schedule_writes_are_idempotent() {
    let storage = MockStorage::new();
    let clock = FakeClock::at(at(2, 10, 0));
    let mut svc = service(&storage, &clock);
    let mut outbox = Outbox::new();

    let cmd = ThermostatCommand::SetWeeklyPattern {
        days: DayMask::from_bits(0).with_day(DayOfWeek::Wednesday),
        transitions: vec![Transition::at(18, 0, 1900), Transition::at(6, 30, 2100)],
    };
    svc.handle_command(cmd.clone(), &mut outbox).unwrap();
    let first_bytes = storage.raw("thermostat", "sched_3");
    let first = svc.resolve_at(at(2, 10, 0)).unwrap();

    svc.handle_command(cmd, &mut outbox).unwrap();
    assert_eq!(storage.raw("thermostat", "sched_3"), first_bytes);
    assert_eq!(svc.resolve_at(at(2, 10, 0)).unwrap(), first);
    assert_eq!(
        svc.schedule().day_schedule(DayOfWeek::Wednesday),
        &[Transition::at(6, 30, 2100), Transition::at(18, 0, 1900)]
    );
}

#[test]
fn rejected_schedule_leaves_every_day_untouched() {
    let storage = MockStorage::new();
    let clock = FakeClock::at(at(0, 10, 0));
    let mut svc = service(&storage, &clock);
    let mut outbox = Outbox::new();

    svc.handle_command(
        ThermostatCommand::SetWeeklyPattern {
            days: DayMask::from_bits(0b0111_1111),
            transitions: vec![Transition::at(7, 0, 2000)],
        },
        &mut outbox,
    )
    .unwrap();
    let writes = storage.writes();

    let err = svc
        .handle_command(
            ThermostatCommand::SetWeeklyPattern {
                days: DayMask::from_bits(0b0111_1111),
                transitions: vec![Transition::at(8, 0, 2100), Transition::new(1440, 1500)],
            },
            &mut outbox,
        )
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Schedule(ScheduleError::InvalidArgument { minute_of_day: 1440 })
    ));
    assert_eq!(storage.writes(), writes);
    for day in DayOfWeek::ALL {
        assert_eq!(svc.schedule().day_schedule(day), &[Transition::at(7, 0, 2000)]);
    }
}

#[test]
fn schedule_survives_restart() {
    let storage = MockStorage::new();
    let clock = FakeClock::at(at(0, 10, 0));
    let mut outbox = Outbox::new();
    {
        let mut svc = service(&storage, &clock);
        svc.handle_command(
            ThermostatCommand::SetWeeklyPattern {
                days: DayMask::from_bits(0b0000_0011),
                transitions: vec![Transition::at(7, 0, 2000), Transition::at(22, 0, 1600)],
            },
            &mut outbox,
        )
        .unwrap();
    }
    let svc = service(&storage, &clock);
    assert_eq!(svc.schedule().len(), 4);
    assert_eq!(
        svc.schedule().day_schedule(DayOfWeek::Monday),
        &[Transition::at(7, 0, 2000), Transition::at(22, 0, 1600)]
    );
    assert!(svc.schedule().day_schedule(DayOfWeek::Tuesday).is_empty());
}

#[test]
fn timezone_offset_is_persisted_and_shifts_resolution() {
    let storage = MockStorage::new();
    let clock = FakeClock::at(at(0, 10, 0));
    let mut outbox = Outbox::new();
    {
        let mut svc = service(&storage, &clock);
        svc.handle_command(
            ThermostatCommand::SetWeeklyPattern {
                days: DayMask::from_bits(0b0111_1111),
                transitions: vec![Transition::at(6, 0, 1800), Transition::at(11, 0, 2200)],
            },
            &mut outbox,
        )
        .unwrap();
        svc.handle_command(ThermostatCommand::SetTimeZoneOffset(7200), &mut outbox)
            .unwrap();
    }
    assert_eq!(storage.read_i32("thermostat", "tz_offset"), Ok(7200));

    let svc = service(&storage, &clock);
    assert_eq!(svc.tz_offset_secs(), 7200);
    // 10:00 UTC is 12:00 local.
    assert_eq!(svc.resolve_at(at(0, 10, 0)).unwrap().entry.set_point, 2200);
}

#[test]
fn out_of_range_timezone_is_rejected() {
    let storage = MockStorage::new();
    let clock = FakeClock::at(at(0, 10, 0));
    let mut svc = service(&storage, &clock);
    let mut outbox = Outbox::new();

    let err = svc
        .handle_command(ThermostatCommand::SetTimeZoneOffset(90_000), &mut outbox)
        .unwrap_err();
    assert!(matches!(err, Error::InvalidTimeZone(90_000)));
    assert!(svc
        .handle_command(ThermostatCommand::SetTimeZoneOffset(i32::MIN), &mut outbox)
        .is_err());
    assert_eq!(svc.tz_offset_secs(), 0);
    assert!(!storage.exists("thermostat", "tz_offset"));
}

#[test]
fn local_time_sets_the_offset() {
    let storage = MockStorage::new();
    let clock = FakeClock::at(at(0, 10, 0));
    let mut svc = service(&storage, &clock);
    let mut outbox = Outbox::new();

    svc.handle_command(ThermostatCommand::SyncLocalTime(at(0, 10, 0) - 3600), &mut outbox)
        .unwrap();
    assert_eq!(svc.tz_offset_secs(), -3600);
    assert_eq!(storage.read_i32("thermostat", "tz_offset"), Ok(-3600));
}

#[test]
fn override_survives_restart() {
    let storage = MockStorage::new();
    let clock = FakeClock::at(at(3, 17, 45));
    let mut outbox = Outbox::new();
    {
        let mut svc = service(&storage, &clock);
        svc.handle_command(ThermostatCommand::SetOverride(2350), &mut outbox)
            .unwrap();
    }

    clock.advance(3600);
    let svc = service(&storage, &clock);
    let manual = svc.manual_override().unwrap();
    assert_eq!(manual.set_point, 2350);
    assert_eq!(manual.captured_at, at(3, 17, 45));

    let r = svc.resolve_at(at(3, 18, 45)).unwrap();
    assert!(r.from_override);
    assert!(r.override_today);
    assert_eq!(r.entry.day, DayOfWeek::Thursday);
    assert_eq!(r.entry.minute_of_day, 17 * 60 + 45);
}

#[test]
fn non_positive_override_is_no_override() {
    let storage = MockStorage::new();
    let clock = FakeClock::at(at(0, 9, 0));
    let mut svc = service(&storage, &clock);
    let mut outbox = Outbox::new();

    svc.handle_command(
        ThermostatCommand::SetWeeklyPattern {
            days: DayMask::from_bits(0b0111_1111),
            transitions: vec![Transition::at(6, 0, 1900)],
        },
        &mut outbox,
    )
    .unwrap();
    svc.handle_command(ThermostatCommand::SetOverride(0), &mut outbox)
        .unwrap();
    let r = svc.resolve_at(at(0, 9, 30)).unwrap();
    assert!(!r.from_override);
    assert_eq!(r.entry.set_point, 1900);
}

#[test]
fn unknown_mode_keeps_the_raw_byte() {
    let storage = MockStorage::new();
    let clock = FakeClock::at(at(0, 9, 0));
    let mut outbox = Outbox::new();
    {
        let mut svc = service(&storage, &clock);
        svc.handle_command(ThermostatCommand::SetMode(Mode::Heat.raw()), &mut outbox)
            .unwrap();
        assert_eq!(svc.mode(), Mode::Heat);
        svc.handle_command(ThermostatCommand::SetMode(0x07), &mut outbox)
            .unwrap();
        assert_eq!(svc.mode(), Mode::Off);
    }
    assert_eq!(storage.read_u8("thermostat", "mode"), Ok(0x07));
    assert_eq!(service(&storage, &clock).mode(), Mode::Off);
}

#[test]
fn mode_survives_restart() {
    let storage = MockStorage::new();
    let clock = FakeClock::at(at(0, 9, 0));
    let mut outbox = Outbox::new();
    service(&storage, &clock)
        .handle_command(ThermostatCommand::SetMode(Mode::Auto.raw()), &mut outbox)
        .unwrap();
    assert_eq!(service(&storage, &clock).mode(), Mode::Auto);
}

#[test]
fn set_runtime_persists_and_publishes() {
    let storage = MockStorage::new();
    let clock = FakeClock::at(at(0, 9, 0));
    let mut svc = service(&storage, &clock);
    let mut outbox = Outbox::new();

    svc.handle_command(ThermostatCommand::SetRuntime(0), &mut outbox)
        .unwrap();
    assert_eq!(drained(&mut outbox), vec![Publication::RuntimeSeconds(0)]);
    assert_eq!(svc.runtime_secs(), 0);

    svc.handle_command(ThermostatCommand::SetRuntime(86_400), &mut outbox)
        .unwrap();
    assert_eq!(storage.read_u32("thermostat", "runtime"), Ok(86_400));
    assert_eq!(service(&storage, &clock).runtime_secs(), 86_400);
}

#[test]
fn remote_reading_survives_restart() {
    let storage = MockStorage::new();
    let clock = FakeClock::at(at(5, 12, 0));
    let mut outbox = Outbox::new();
    service(&storage, &clock)
        .handle_command(ThermostatCommand::SetRemoteTemperature(2045), &mut outbox)
        .unwrap();

    let svc = service(&storage, &clock);
    let reading = svc.remote_reading().unwrap();
    assert_eq!(reading.value, 2045);
    assert_eq!(reading.received_at, at(5, 12, 0));
}

#[test]
fn local_temperature_is_published_not_persisted() {
    let storage = MockStorage::new();
    let clock = FakeClock::at(at(0, 9, 0));
    let mut svc = service(&storage, &clock);
    let mut outbox = Outbox::new();

    let writes = storage.writes();
    svc.handle_command(ThermostatCommand::SetLocalTemperature(1987), &mut outbox)
        .unwrap();
    assert_eq!(drained(&mut outbox), vec![Publication::LocalTemperature(1987)]);
    assert_eq!(storage.writes(), writes);
}

#[test]
fn utc_sync_sets_the_clock() {
    let storage = MockStorage::new();
    let clock = FakeClock::at(0);
    let mut svc = service(&storage, &clock);
    let mut outbox = Outbox::new();

    assert!(!svc.clock_valid());
    svc.handle_command(ThermostatCommand::SyncUtcTime(at(0, 9, 0)), &mut outbox)
        .unwrap();
    assert!(svc.clock_valid());
    assert_eq!(svc.clock().sync_requests(), 0);
}

#[test]
fn commands_before_clock_sync_defer_evaluation() {
    let storage = MockStorage::new();
    let clock = FakeClock::at(0);
    let mut svc = service(&storage, &clock);
    let mut outbox = Outbox::new();

    svc.handle_command(
        ThermostatCommand::SetWeeklyPattern {
            days: DayMask::from_bits(0b0111_1111),
            transitions: vec![Transition::at(0, 0, 2500)],
        },
        &mut outbox,
    )
    .unwrap();
    svc.handle_command(ThermostatCommand::SetMode(Mode::Heat.raw()), &mut outbox)
        .unwrap();
    svc.handle_command(ThermostatCommand::SetRemoteTemperature(1500), &mut outbox)
        .unwrap();
    assert!(outbox.is_empty());
    assert!(!svc.relay().energised());
}
