//! Wall-clock access and the timestamp text formats stored in SQLite.
//!
//! All session times are local wall-clock values truncated to whole seconds,
//! stored as `YYYY-MM-DD HH:MM:SS`. Dates use `YYYY-MM-DD`.

use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use chrono::{Duration, Local, NaiveDate, NaiveDateTime, Timelike};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub const DATE_FORMAT: &str = "%Y-%m-%d";

pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;

    fn today(&self) -> NaiveDate {
        self.now().date()
    }
}

/// Local system time, truncated to whole seconds so stored values round-trip.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        let now = Local::now().naive_local();
        now.with_nanosecond(0).unwrap_or(now)
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Clone)]
pub struct ManualClock {
    current: Arc<Mutex<NaiveDateTime>>,
}

impl ManualClock {
    pub fn new(start: NaiveDateTime) -> Self {
        Self {
            current: Arc::new(Mutex::new(start)),
        }
    }

    pub fn set(&self, at: NaiveDateTime) {
        let mut guard = match self.current.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = at;
    }

    pub fn advance_minutes(&self, minutes: i64) {
        self.advance(Duration::minutes(minutes));
    }

    pub fn advance(&self, by: Duration) {
        let mut guard = match self.current.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> NaiveDateTime {
        match self.current.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

pub fn format_timestamp(value: &NaiveDateTime) -> String {
    value.format(TIMESTAMP_FORMAT).to_string()
}

pub fn parse_timestamp(value: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT)
        .with_context(|| format!("invalid timestamp '{value}'"))
}

pub fn format_date(value: &NaiveDate) -> String {
    value.format(DATE_FORMAT).to_string()
}

pub fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .with_context(|| format!("invalid date '{value}'"))
}

/// Whole minutes between two instants, floored. Negative when `end < start`.
pub fn raw_elapsed_minutes(start: &NaiveDateTime, end: &NaiveDateTime) -> i64 {
    (*end - *start).num_seconds().div_euclid(60)
}

/// Whole minutes between two instants; clock skew collapses to zero.
pub fn elapsed_minutes(start: &NaiveDateTime, end: &NaiveDateTime) -> i64 {
    raw_elapsed_minutes(start, end).max(0)
}

/// `H:MM`, the format used in day reports.
pub fn format_minutes(minutes: i64) -> String {
    let minutes = minutes.max(0);
    format!("{}:{:02}", minutes / 60, minutes % 60)
}
