//! Schedule store — per-day transition lists.
//!
//! Each calendar day (and the away slot) owns an ordered list of
//! [`Transition`]s, unique by minute. Mutations replace whole days: the
//! input is validated first, so a rejected call leaves every day untouched.
//! Each replaced day is persisted as its own postcard blob.

use core::fmt;

use log::{debug, info, warn};

use crate::app::keys;
use crate::app::ports::{StorageError, StoragePort};
use crate::error::ScheduleError;

use super::{DayMask, DayOfWeek, MINUTES_PER_DAY, ScheduleEntry, Transition};

/// Upper bound on transitions per day.
pub const MAX_TRANSITIONS_PER_DAY: usize = 32;

/// Read buffer for one day's blob; a full day encodes well below this.
const BLOB_BUF_SIZE: usize = 512;

/// A storable program slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleSlot {
    Day(DayOfWeek),
    Away,
}

impl ScheduleSlot {
    fn key(self) -> &'static str {
        match self {
            Self::Day(day) => keys::day_schedule(day),
            Self::Away => keys::AWAY_SCHEDULE,
        }
    }

    fn all() -> impl Iterator<Item = Self> {
        DayOfWeek::ALL
            .into_iter()
            .map(Self::Day)
            .chain(core::iter::once(Self::Away))
    }
}

impl fmt::Display for ScheduleSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Day(day) => write!(f, "{day}"),
            Self::Away => f.write_str("away"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScheduleStore {
    days: [Vec<Transition>; 7],
    away: Vec<Transition>,
}

impl ScheduleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every slot from storage. Missing or corrupt blobs leave the slot
    /// empty.
    pub fn load(storage: &impl StoragePort) -> Self {
        let mut store = Self::new();
        for slot in ScheduleSlot::all() {
            match read_slot(storage, slot) {
                Ok(list) => *store.slot_mut(slot) = list,
                Err(StorageError::NotFound) => {}
                Err(e) => warn!("Schedule: {} blob unreadable ({}), starting empty", slot, e),
            }
        }
        info!(
            "Schedule: loaded {} transitions ({} away)",
            store.len(),
            store.away.len()
        );
        store
    }

    /// Replace one day's list.
    pub fn set_day_schedule(
        &mut self,
        day: DayOfWeek,
        transitions: &[Transition],
        storage: &mut impl StoragePort,
    ) -> Result<(), ScheduleError> {
        let list = normalize(transitions)?;
        self.commit(ScheduleSlot::Day(day), list, storage);
        Ok(())
    }

    /// Replace the away/vacation program.
    pub fn set_away_schedule(
        &mut self,
        transitions: &[Transition],
        storage: &mut impl StoragePort,
    ) -> Result<(), ScheduleError> {
        let list = normalize(transitions)?;
        self.commit(ScheduleSlot::Away, list, storage);
        Ok(())
    }

    /// Apply one transition list to every day flagged in `mask`.
    pub fn set_weekly_pattern(
        &mut self,
        mask: DayMask,
        transitions: &[Transition],
        storage: &mut impl StoragePort,
    ) -> Result<(), ScheduleError> {
        let list = normalize(transitions)?;
        if mask.is_empty() {
            debug!("Schedule: weekly pattern with empty day mask ignored");
        }
        for day in mask.days() {
            self.commit(ScheduleSlot::Day(day), list.clone(), storage);
        }
        if mask.away() {
            self.commit(ScheduleSlot::Away, list, storage);
        }
        Ok(())
    }

    /// Replace several slots in one call. Every list is validated before any
    /// slot changes.
    pub fn replace_slots(
        &mut self,
        slots: &[(ScheduleSlot, Vec<Transition>)],
        storage: &mut impl StoragePort,
    ) -> Result<(), ScheduleError> {
        let normalized = slots
            .iter()
            .map(|(slot, list)| normalize(list).map(|n| (*slot, n)))
            .collect::<Result<Vec<_>, _>>()?;
        for (slot, list) in normalized {
            self.commit(slot, list, storage);
        }
        Ok(())
    }

    pub fn day_schedule(&self, day: DayOfWeek) -> &[Transition] {
        &self.days[day.index() as usize]
    }

    pub fn away_schedule(&self) -> &[Transition] {
        &self.away
    }

    /// Every calendar-day entry, Sunday first and ascending within a day.
    pub fn entries(&self) -> impl Iterator<Item = ScheduleEntry> + '_ {
        DayOfWeek::ALL.into_iter().flat_map(move |day| {
            self.day_schedule(day)
                .iter()
                .map(move |t| ScheduleEntry::new(day, t.minute_of_day, t.set_point))
        })
    }

    /// Number of calendar-day transitions (the away slot is not counted).
    pub fn len(&self) -> usize {
        self.days.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn slot_mut(&mut self, slot: ScheduleSlot) -> &mut Vec<Transition> {
        match slot {
            ScheduleSlot::Day(day) => &mut self.days[day.index() as usize],
            ScheduleSlot::Away => &mut self.away,
        }
    }

    /// Store an already-normalized list in memory and persist it. The
    /// in-memory copy stays authoritative when the write fails.
    fn commit(&mut self, slot: ScheduleSlot, list: Vec<Transition>, storage: &mut impl StoragePort) {
        match postcard::to_allocvec(&list) {
            Ok(bytes) => {
                if let Err(e) = storage.write(keys::NAMESPACE, slot.key(), &bytes) {
                    warn!("Schedule: persisting {} failed: {}", slot, e);
                }
            }
            Err(e) => warn!("Schedule: encoding {} failed: {}", slot, e),
        }
        info!("Schedule: {} set to {} transitions", slot, list.len());
        *self.slot_mut(slot) = list;
    }
}

/// Validate and canonicalise a transition list: every minute must be in
/// range, the result is sorted by minute, and duplicate minutes keep the
/// last occurrence.
pub fn normalize(transitions: &[Transition]) -> Result<Vec<Transition>, ScheduleError> {
    if let Some(bad) = transitions
        .iter()
        .find(|t| t.minute_of_day >= MINUTES_PER_DAY)
    {
        return Err(ScheduleError::InvalidArgument {
            minute_of_day: bad.minute_of_day,
        });
    }

    let mut sorted = transitions.to_vec();
    // Stable sort: duplicates stay in input order so the last one wins below.
    sorted.sort_by_key(|t| t.minute_of_day);

    let mut out: Vec<Transition> = Vec::with_capacity(sorted.len());
    for t in sorted {
        match out.last_mut() {
            Some(last) if last.minute_of_day == t.minute_of_day => *last = t,
            _ => out.push(t),
        }
    }

    if out.len() > MAX_TRANSITIONS_PER_DAY {
        return Err(ScheduleError::TooManyTransitions { count: out.len() });
    }
    Ok(out)
}

fn read_slot(storage: &impl StoragePort, slot: ScheduleSlot) -> Result<Vec<Transition>, StorageError> {
    let mut buf = [0u8; BLOB_BUF_SIZE];
    let n = storage.read(keys::NAMESPACE, slot.key(), &mut buf)?;
    let list: Vec<Transition> =
        postcard::from_bytes(&buf[..n]).map_err(|_| StorageError::Corrupted)?;
    normalize(&list).map_err(|_| StorageError::Corrupted)
}
