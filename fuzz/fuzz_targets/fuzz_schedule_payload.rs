//! Fuzz target: weekly-schedule command payloads
//!
//! Feeds arbitrary bytes to both schedule layouts and asserts that a
//! successful decode never reports more transitions than the header
//! declared.
//!
//! cargo fuzz run fuzz_schedule_payload

#![no_main]

use libfuzzer_sys::fuzz_target;
use thermostat::adapters::zcl;
use thermostat::schedule::codec::{decode_custom_schedule, decode_weekly_schedule};

fuzz_target!(|data: &[u8]| {
    if let Ok(pattern) = decode_weekly_schedule(data) {
        assert_eq!(pattern.transitions.len(), data[0] as usize);
    }

    if let Ok(slots) = decode_custom_schedule(data) {
        let declared = data[0] as usize;
        // Each entry lands in every slot its mask flags, at most eight.
        let total: usize = slots.iter().map(|(_, list)| list.len()).sum();
        assert!(total <= declared * 8, "more transitions than entries allow");
        assert!(slots.len() <= 8);
    }

    for command in [0x01u8, 0x03, 0xFF] {
        let _ = zcl::decode_command(zcl::cluster::THERMOSTAT, command, data);
    }
});
