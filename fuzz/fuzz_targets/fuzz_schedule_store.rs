//! Fuzz target: decoded schedules applied to the store
//!
//! Whatever a custom payload decodes to, applying it must either be
//! rejected as a whole or leave every day sorted, unique and bounded.
//!
//! cargo fuzz run fuzz_schedule_store

#![no_main]

use libfuzzer_sys::fuzz_target;
use thermostat::adapters::nvs::NvsAdapter;
use thermostat::schedule::DayOfWeek;
use thermostat::schedule::codec::decode_custom_schedule;
use thermostat::schedule::store::{MAX_TRANSITIONS_PER_DAY, ScheduleStore};

fuzz_target!(|data: &[u8]| {
    let Ok(slots) = decode_custom_schedule(data) else {
        return;
    };

    let mut nvs = NvsAdapter::default();
    let mut store = ScheduleStore::new();
    let before = store.clone();
    if store.replace_slots(&slots, &mut nvs).is_err() {
        assert_eq!(store, before, "rejected update must not change any day");
        return;
    }

    for day in DayOfWeek::ALL {
        let list = store.day_schedule(day);
        assert!(list.len() <= MAX_TRANSITIONS_PER_DAY);
        assert!(list.windows(2).all(|w| w[0].minute_of_day < w[1].minute_of_day));
    }
});
