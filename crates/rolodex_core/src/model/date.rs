//! Calendar date value shared by every entity.
//!
//! # Responsibility
//! - Represent an instant with second precision.
//! - Parse and format the store (`yyyy-mm-dd`) and compact (`dd/mm/yyyy`)
//!   representations.
//!
//! # Invariants
//! - The urgent sentinel is the zero instant (1970-01-01 00:00:00); every
//!   sentinel value compares equal to every other one.
//! - Ordering is total and follows the underlying instant.
//! - Sub-second precision is always truncated.

use chrono::{DateTime, Datelike, Local, NaiveDate, NaiveDateTime, SubsecRound, Timelike, Utc};
use std::error::Error;
use std::fmt::{Display, Formatter};

const STORE_FORMAT: &str = "%Y-%m-%d";
const COMPACT_FORMAT: &str = "%d/%m/%Y";

/// Instant with second precision, ordered chronologically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Date(NaiveDateTime);

/// Raised when a date string does not match the expected layout or names an
/// impossible calendar day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateParseError {
    pub input: String,
    pub expected: &'static str,
}

impl Display for DateParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid date `{}`; expected layout {}",
            self.input, self.expected
        )
    }
}

impl Error for DateParseError {}

impl Date {
    /// Returns the "no concrete date" sentinel used for urgent entries.
    pub fn urgent() -> Self {
        Self(DateTime::<Utc>::UNIX_EPOCH.naive_utc())
    }

    /// Current local wall-clock time, truncated to whole seconds.
    pub fn now() -> Self {
        Self(Local::now().naive_local().trunc_subsecs(0))
    }

    /// Builds a date at midnight. Returns `None` for impossible days.
    pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        Self::from_ymd_hms(year, month, day, 0, 0, 0)
    }

    pub fn from_ymd_hms(
        year: i32,
        month: u32,
        day: u32,
        hour: u32,
        minute: u32,
        second: u32,
    ) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day)
            .and_then(|date| date.and_hms_opt(hour, minute, second))
            .map(Self)
    }

    /// Parses the persisted `yyyy-mm-dd` form.
    pub fn parse_store(value: &str) -> Result<Self, DateParseError> {
        parse_day(value, STORE_FORMAT, "yyyy-mm-dd")
    }

    /// Parses the human `dd/mm/yyyy` form.
    pub fn parse_compact(value: &str) -> Result<Self, DateParseError> {
        parse_day(value, COMPACT_FORMAT, "dd/mm/yyyy")
    }

    pub fn is_urgent(&self) -> bool {
        *self == Self::urgent()
    }

    /// Formats as `yyyy-mm-dd`; time of day is dropped.
    pub fn to_store_string(&self) -> String {
        self.0.format(STORE_FORMAT).to_string()
    }

    /// Formats as `dd/mm/yyyy`.
    pub fn to_compact_string(&self) -> String {
        self.0.format(COMPACT_FORMAT).to_string()
    }

    pub fn year(&self) -> i32 {
        self.0.year()
    }

    /// Month number, 1-based.
    pub fn month(&self) -> u32 {
        self.0.month()
    }

    pub fn day(&self) -> u32 {
        self.0.day()
    }

    pub fn hour(&self) -> u32 {
        self.0.hour()
    }

    pub fn minute(&self) -> u32 {
        self.0.minute()
    }

    /// Seconds since the zero instant, reading the wall-clock value as UTC.
    pub fn total_seconds(&self) -> i64 {
        self.0.and_utc().timestamp()
    }
}

impl Display for Date {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Date({})", self.to_compact_string())
    }
}

fn parse_day(value: &str, format: &str, expected: &'static str) -> Result<Date, DateParseError> {
    NaiveDate::parse_from_str(value.trim(), format)
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(Date)
        .ok_or_else(|| DateParseError {
            input: value.to_string(),
            expected,
        })
}
