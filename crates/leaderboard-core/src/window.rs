//! Monday–Sunday reporting windows.
//!
//! Windows are computed on the local wall clock. `weeks_ago = 0` is the
//! complete week before the current one; each further offset steps back
//! seven days.

use chrono::{
    DateTime, Datelike, Duration, Local, LocalResult, NaiveDate, NaiveDateTime, NaiveTime,
    TimeZone,
};
use serde::{Deserialize, Serialize};

use crate::error::{LeaderboardError, Result};

/// A closed Monday 00:00:00 – Sunday 23:59:59 interval in local time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    start: NaiveDateTime,
    end: NaiveDateTime,
}

impl TimeWindow {
    /// The window starting on `monday`. Returns `None` for any other weekday.
    pub fn starting(monday: NaiveDate) -> Option<Self> {
        if monday.weekday() != chrono::Weekday::Mon {
            return None;
        }
        Some(Self::from_monday(monday))
    }

    fn from_monday(monday: NaiveDate) -> Self {
        let start = monday.and_time(NaiveTime::MIN);
        let end = start + Duration::days(6) + Duration::hours(23) + Duration::minutes(59)
            + Duration::seconds(59);
        Self { start, end }
    }

    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    pub fn end(&self) -> NaiveDateTime {
        self.end
    }

    /// Deterministic label, e.g. `Jun 02 - Jun 08, 2025`.
    pub fn label(&self) -> String {
        format!(
            "{} - {}",
            self.start.format("%b %d"),
            self.end.format("%b %d, %Y")
        )
    }

    /// Inclusive bounds as Unix seconds, interpreting the wall-clock times in `tz`.
    pub fn epoch_bounds_in<Tz: TimeZone>(&self, tz: &Tz) -> Result<(f64, f64)> {
        let oldest = resolve_local(tz, &self.start)?;
        let latest = resolve_local(tz, &self.end)?;
        Ok((oldest as f64, latest as f64))
    }

    /// Inclusive bounds as Unix seconds in the process's local time zone.
    pub fn epoch_bounds(&self) -> Result<(f64, f64)> {
        self.epoch_bounds_in(&Local)
    }
}

impl std::fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.label())
    }
}

fn resolve_local<Tz: TimeZone>(tz: &Tz, naive: &NaiveDateTime) -> Result<i64> {
    match tz.from_local_datetime(naive) {
        LocalResult::Single(dt) => Ok(dt.timestamp()),
        LocalResult::Ambiguous(earliest, _) => Ok(earliest.timestamp()),
        // Skipped by a DST jump; the wall-clock hour after it exists.
        LocalResult::None => match tz.from_local_datetime(&(*naive + Duration::hours(1))) {
            LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => Ok(dt.timestamp()),
            LocalResult::None => Err(LeaderboardError::Config(format!(
                "local time {naive} does not exist in the configured time zone"
            ))),
        },
    }
}

/// Window for `weeks_ago` relative to `now`.
pub fn compute_window_at<Tz: TimeZone>(now: &DateTime<Tz>, weeks_ago: u32) -> TimeWindow {
    let today = now.date_naive();
    let mut days_since_monday = i64::from(today.weekday().num_days_from_monday());
    if days_since_monday == 0 {
        days_since_monday = 7;
    }
    let back = days_since_monday + 7 + 7 * i64::from(weeks_ago);
    TimeWindow::from_monday(today - Duration::days(back))
}

/// Window for `weeks_ago` relative to the current local time.
pub fn compute_window(weeks_ago: u32) -> TimeWindow {
    compute_window_at(&Local::now(), weeks_ago)
}

/// Offsets for a `weeks`-long backfill, oldest first: `weeks - 1, …, 0`.
pub fn backfill_offsets(weeks: u32) -> Vec<u32> {
    (0..weeks).rev().collect()
}
