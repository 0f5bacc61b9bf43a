//! Weekly-schedule command payload decoding.
//!
//! Two layouts arrive on the thermostat cluster (little-endian, packed):
//!
//! ```text
//! set weekly schedule (0x01)
//!   ┌────────┬──────────┬──────┐ ┌─────────┬────────────┐
//!   │ count  │ day mask │ mode │ │ minute  │ set-point  │ × count
//!   │  u8    │   u8     │  u8  │ │  u16    │   i16      │
//!   └────────┴──────────┴──────┘ └─────────┴────────────┘
//!
//! custom weekly schedule (0xFF)
//!   ┌────────┬──────┐ ┌──────────┬─────────┬────────────┐
//!   │ count  │ mode │ │ day mask │ minute  │ set-point  │ × count
//!   │  u8    │  u8  │ │   u8     │  u16    │   i16      │
//!   └────────┴──────┘ └──────────┴─────────┴────────────┘
//! ```
//!
//! Decoding only checks framing. Minute ranges and per-day caps are the
//! store's job, so a decoded payload still goes through
//! [`normalize`](super::store::normalize) before it touches any day.

use log::debug;

use crate::error::PayloadError;

use super::store::ScheduleSlot;
use super::{DayMask, DayOfWeek, Transition};

const WEEKLY_HEADER_LEN: usize = 3;
const WEEKLY_ENTRY_LEN: usize = 4;
const CUSTOM_HEADER_LEN: usize = 2;
const CUSTOM_ENTRY_LEN: usize = 5;

/// Mode-for-sequence bit meaning "heating set-points present".
const MODE_HEAT: u8 = 0x01;

/// One transition list applied to every flagged day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeeklyPattern {
    pub days: DayMask,
    pub transitions: Vec<Transition>,
}

/// Decode a standard weekly-schedule payload.
pub fn decode_weekly_schedule(payload: &[u8]) -> Result<WeeklyPattern, PayloadError> {
    let (count, days, mode) = match payload {
        [count, days, mode, ..] => (*count as usize, DayMask::from_bits(*days), *mode),
        _ => {
            return Err(PayloadError::HeaderTooShort {
                len: payload.len(),
                needed: WEEKLY_HEADER_LEN,
            });
        }
    };
    note_mode(mode);

    let body = entries(payload, WEEKLY_HEADER_LEN, count, WEEKLY_ENTRY_LEN)?;
    let transitions = body
        .chunks_exact(WEEKLY_ENTRY_LEN)
        .map(|e| Transition::new(u16::from_le_bytes([e[0], e[1]]), i16::from_le_bytes([e[2], e[3]])))
        .collect();

    Ok(WeeklyPattern { days, transitions })
}

/// Decode a custom weekly-schedule payload into per-slot lists. Only slots
/// that at least one entry flags are returned, Sunday first and the away
/// slot last.
pub fn decode_custom_schedule(
    payload: &[u8],
) -> Result<Vec<(ScheduleSlot, Vec<Transition>)>, PayloadError> {
    let (count, mode) = match payload {
        [count, mode, ..] => (*count as usize, *mode),
        _ => {
            return Err(PayloadError::HeaderTooShort {
                len: payload.len(),
                needed: CUSTOM_HEADER_LEN,
            });
        }
    };
    note_mode(mode);

    let body = entries(payload, CUSTOM_HEADER_LEN, count, CUSTOM_ENTRY_LEN)?;

    let mut days: [Option<Vec<Transition>>; 7] = Default::default();
    let mut away: Option<Vec<Transition>> = None;
    for e in body.chunks_exact(CUSTOM_ENTRY_LEN) {
        let mask = DayMask::from_bits(e[0]);
        let t = Transition::new(u16::from_le_bytes([e[1], e[2]]), i16::from_le_bytes([e[3], e[4]]));
        for day in mask.days() {
            days[day.index() as usize].get_or_insert_with(Vec::new).push(t);
        }
        if mask.away() {
            away.get_or_insert_with(Vec::new).push(t);
        }
    }

    let slots = DayOfWeek::ALL
        .into_iter()
        .zip(days)
        .filter_map(|(day, list)| list.map(|l| (ScheduleSlot::Day(day), l)))
        .chain(away.map(|l| (ScheduleSlot::Away, l)))
        .collect();
    Ok(slots)
}

/// The `count × entry_len` bytes following the header.
fn entries(
    payload: &[u8],
    header_len: usize,
    count: usize,
    entry_len: usize,
) -> Result<&[u8], PayloadError> {
    let needed = header_len + count * entry_len;
    if payload.len() < needed {
        return Err(PayloadError::Truncated {
            declared: count,
            needed,
            available: payload.len(),
        });
    }
    if payload.len() > needed {
        debug!(
            "Codec: ignoring {} trailing bytes",
            payload.len() - needed
        );
    }
    Ok(&payload[header_len..needed])
}

fn note_mode(mode: u8) {
    if mode & MODE_HEAT == 0 {
        debug!("Codec: mode 0x{:02x} carries no heat flag, applying anyway", mode);
    }
}
