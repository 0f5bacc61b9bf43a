//! Weekly heating program.
//!
//! ```text
//!   payload ──▶ codec ──▶ ScheduleStore ──▶ resolver ──▶ active set-point
//!                              │                ▲
//!                              ▼                │
//!                          StoragePort    ManualOverride
//! ```
//!
//! Days are the seven calendar days only. The away/vacation program is a
//! separate slot and never shares the weekday ordinal space.

pub mod codec;
pub mod resolver;
pub mod store;

use core::fmt;

use serde::{Deserialize, Serialize};

/// Number of minutes in a day; valid minutes are `0..MINUTES_PER_DAY`.
pub const MINUTES_PER_DAY: u16 = 1440;

// ── DayOfWeek ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum DayOfWeek {
    Sunday = 0,
    Monday = 1,
    Tuesday = 2,
    Wednesday = 3,
    Thursday = 4,
    Friday = 5,
    Saturday = 6,
}

impl DayOfWeek {
    pub const ALL: [DayOfWeek; 7] = [
        Self::Sunday,
        Self::Monday,
        Self::Tuesday,
        Self::Wednesday,
        Self::Thursday,
        Self::Friday,
        Self::Saturday,
    ];

    /// `0 = Sunday … 6 = Saturday`; anything else is `None`.
    pub fn from_index(index: u8) -> Option<Self> {
        Self::ALL.get(index as usize).copied()
    }

    pub const fn index(self) -> u8 {
        self as u8
    }

    /// Following day, wrapping Saturday → Sunday.
    pub fn next(self) -> Self {
        Self::ALL[(self.index() as usize + 1) % 7]
    }

    /// Preceding day, wrapping Sunday → Saturday.
    pub fn prev(self) -> Self {
        Self::ALL[(self.index() as usize + 6) % 7]
    }

    pub(crate) fn from_chrono(day: chrono::Weekday) -> Self {
        Self::ALL[day.num_days_from_sunday() as usize]
    }
}

impl fmt::Display for DayOfWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Sunday => "Sun",
            Self::Monday => "Mon",
            Self::Tuesday => "Tue",
            Self::Wednesday => "Wed",
            Self::Thursday => "Thu",
            Self::Friday => "Fri",
            Self::Saturday => "Sat",
        };
        f.write_str(name)
    }
}

// ── DayMask ───────────────────────────────────────────────────

/// Wire day bitmask: bit0 = Sunday … bit6 = Saturday, bit7 = away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DayMask(u8);

impl DayMask {
    pub const AWAY_BIT: u8 = 1 << 7;

    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub fn with_day(self, day: DayOfWeek) -> Self {
        Self(self.0 | 1 << day.index())
    }

    pub fn contains(self, day: DayOfWeek) -> bool {
        self.0 & (1 << day.index()) != 0
    }

    pub fn away(self) -> bool {
        self.0 & Self::AWAY_BIT != 0
    }

    /// Calendar days flagged in the mask, Sunday first.
    pub fn days(self) -> impl Iterator<Item = DayOfWeek> {
        DayOfWeek::ALL.into_iter().filter(move |d| self.contains(*d))
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

// ── Transitions and entries ───────────────────────────────────

/// One program step: from `minute_of_day` onward the target is `set_point`
/// (hundredths of a degree).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub minute_of_day: u16,
    pub set_point: i16,
}

impl Transition {
    pub const fn new(minute_of_day: u16, set_point: i16) -> Self {
        Self {
            minute_of_day,
            set_point,
        }
    }

    /// Convenience constructor from wall-clock hours and minutes.
    pub const fn at(hour: u16, minute: u16, set_point: i16) -> Self {
        Self::new(hour * 60 + minute, set_point)
    }
}

/// A transition anchored to a calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleEntry {
    pub day: DayOfWeek,
    pub minute_of_day: u16,
    pub set_point: i16,
}

impl ScheduleEntry {
    pub const fn new(day: DayOfWeek, minute_of_day: u16, set_point: i16) -> Self {
        Self {
            day,
            minute_of_day,
            set_point,
        }
    }

    /// Position in the week, used to order candidates chronologically.
    pub fn week_position(&self) -> (u8, u16) {
        (self.day.index(), self.minute_of_day)
    }
}

impl fmt::Display for ScheduleEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {:02}:{:02} -> {}.{:02}",
            self.day,
            self.minute_of_day / 60,
            self.minute_of_day % 60,
            self.set_point / 100,
            (self.set_point % 100).abs()
        )
    }
}
