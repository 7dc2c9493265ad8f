//! Clock abstraction so store dates and timestamps are deterministic in tests.

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime};

/// Source of the current local time.
pub trait Clock: Send + Sync {
    /// Returns the current local date and time.
    fn now(&self) -> NaiveDateTime;

    /// Returns the current local calendar date, the store's identity key.
    fn today(&self) -> NaiveDate {
        self.now().date()
    }
}

/// Production clock backed by the system's local time zone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        let now: DateTime<Local> = Local::now();
        now.naive_local()
    }
}

/// A clock that always returns a fixed point in time.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDateTime);

impl FixedClock {
    /// Fixed clock at `hour:min:sec` on the given day.
    ///
    /// Out-of-range components fall back to midnight.
    pub fn at(date: NaiveDate, hour: u32, min: u32, sec: u32) -> Self {
        let time = date
            .and_hms_opt(hour, min, sec)
            .unwrap_or_else(|| date.and_time(chrono::NaiveTime::MIN));
        Self(time)
    }
}

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}
