//! Timeline resolver — which set-point is active right now.
//!
//! The weekly program and a live manual override are merged into one
//! candidate timeline. The active candidate is the latest one at or before
//! the query point; when the query falls before the week's first candidate,
//! the timeline wraps to the last candidate of the previous week.
//!
//! ```text
//!   Sun ──── Mon ──── Tue ────────────── Sat
//!    │ 06:00  │ 07:00  │ 13:00 ▲ 14:00*   │ 22:00
//!                              │          (* = override)
//!                           query
//! ```

use log::debug;

use crate::error::NoScheduleError;

use super::{DayOfWeek, MINUTES_PER_DAY, ScheduleEntry};

/// A manual set-point change and the moment it was received.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManualOverride {
    /// Hundredths of a degree; non-positive values mean "no override".
    pub set_point: i16,
    /// Epoch seconds (UTC) at capture.
    pub captured_at: i64,
}

impl ManualOverride {
    pub const fn new(set_point: i16, captured_at: i64) -> Self {
        Self {
            set_point,
            captured_at,
        }
    }

    /// Whether the override still participates in resolution at `now`.
    pub fn is_live(&self, now: i64, lifetime_secs: i64) -> bool {
        self.set_point > 0
            && now
                .checked_sub(self.captured_at)
                .is_some_and(|age| age < lifetime_secs)
    }

    /// Pin the override onto the weekly timeline at its local capture time.
    /// `None` once it has expired.
    pub fn snapshot(&self, now: i64, tz_offset_secs: i32, lifetime_secs: i64) -> Option<ScheduleEntry> {
        if !self.is_live(now, lifetime_secs) {
            return None;
        }
        let local = crate::app::ports::WallClock::from_epoch(
            self.captured_at.saturating_add(i64::from(tz_offset_secs)),
        );
        Some(ScheduleEntry::new(
            local.weekday,
            local.minute_of_day,
            self.set_point,
        ))
    }
}

/// Outcome of one resolution pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub entry: ScheduleEntry,
    /// The chosen candidate is the override.
    pub from_override: bool,
    /// A live override exists and was captured on the query weekday.
    pub override_today: bool,
}

/// Shift a UTC wall-clock position into local time, rolling the weekday when
/// the offset crosses midnight. `tz_offset_secs` is bounded to ±24 h, so a
/// single roll suffices.
pub fn local_query_point(weekday: DayOfWeek, utc_minute: u16, tz_offset_secs: i32) -> (DayOfWeek, u16) {
    let day_minutes = i32::from(MINUTES_PER_DAY);
    let minutes = i32::from(utc_minute) + tz_offset_secs / 60;
    if minutes < 0 {
        (weekday.prev(), (minutes + day_minutes) as u16)
    } else if minutes >= day_minutes {
        (weekday.next(), (minutes - day_minutes) as u16)
    } else {
        (weekday, minutes as u16)
    }
}

/// Select the active set-point at `(weekday, minute_of_day)`.
///
/// Candidates are ordered chronologically through the week. An exact
/// `(day, minute)` tie between the override and a schedule entry resolves
/// to the schedule entry.
pub fn resolve_active(
    weekday: DayOfWeek,
    minute_of_day: u16,
    schedule: impl IntoIterator<Item = ScheduleEntry>,
    manual: Option<ScheduleEntry>,
) -> Result<Resolution, NoScheduleError> {
    let query = (weekday.index(), minute_of_day);

    // Key: (day, minute, is_schedule) so the schedule entry sorts after an
    // override at the same position.
    let candidates = schedule
        .into_iter()
        .map(|e| (e, false))
        .chain(manual.map(|e| (e, true)));

    let mut latest_before: Option<(ScheduleEntry, bool)> = None;
    let mut week_last: Option<(ScheduleEntry, bool)> = None;
    let key = |(e, is_override): &(ScheduleEntry, bool)| {
        let (day, minute) = e.week_position();
        (day, minute, !*is_override)
    };

    for candidate in candidates {
        let k = key(&candidate);
        if (k.0, k.1) <= query && latest_before.as_ref().is_none_or(|best| k > key(best)) {
            latest_before = Some(candidate);
        }
        if week_last.as_ref().is_none_or(|best| k > key(best)) {
            week_last = Some(candidate);
        }
    }

    let (entry, from_override) = latest_before.or(week_last).ok_or(NoScheduleError)?;
    debug!(
        "Resolve: {} {:02}:{:02} -> {}{}",
        weekday,
        minute_of_day / 60,
        minute_of_day % 60,
        entry,
        if from_override { " (override)" } else { "" }
    );
    Ok(Resolution {
        entry,
        from_override,
        override_today: manual.is_some_and(|m| m.day == weekday),
    })
}
