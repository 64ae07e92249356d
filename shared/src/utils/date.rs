//! Strict `YYYY-MM-DD` calendar date parsing
//!
//! Errors name the offending component (`month out of range`,
//! `day out of range`) so callers can report them verbatim.

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use std::fmt;
use thiserror::Error;

/// Why a date string was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateParseReason {
    /// Not of the shape `DDDD-DD-DD`.
    Malformed,
    MonthOutOfRange,
    /// Day is zero or past the end of the given month.
    DayOutOfRange,
}

impl fmt::Display for DateParseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed => write!(f, "cannot parse as YYYY-MM-DD"),
            Self::MonthOutOfRange => write!(f, "month out of range"),
            Self::DayOutOfRange => write!(f, "day out of range"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("parsing time \"{input}\": {reason}")]
pub struct DateParseError {
    pub input: String,
    pub reason: DateParseReason,
}

impl DateParseError {
    fn new(input: &str, reason: DateParseReason) -> Self {
        Self {
            input: input.to_string(),
            reason,
        }
    }
}

/// Parse a calendar date in strict `YYYY-MM-DD` form.
///
/// The day is validated against the real length of the month, leap years
/// included, so `2016-02-30` and `2016-01-32` are both rejected.
pub fn parse_calendar_date(input: &str) -> Result<NaiveDate, DateParseError> {
    let malformed = || DateParseError::new(input, DateParseReason::Malformed);

    let bytes = input.as_bytes();
    if bytes.len() != 10 || bytes[4] != b'-' || bytes[7] != b'-' {
        return Err(malformed());
    }
    let digits = |range: std::ops::Range<usize>| -> Option<u32> {
        let part = &bytes[range];
        if !part.iter().all(u8::is_ascii_digit) {
            return None;
        }
        part.iter()
            .try_fold(0u32, |acc, b| Some(acc * 10 + u32::from(b - b'0')))
    };

    let year = digits(0..4).ok_or_else(malformed)?;
    let month = digits(5..7).ok_or_else(malformed)?;
    let day = digits(8..10).ok_or_else(malformed)?;

    if !(1..=12).contains(&month) {
        return Err(DateParseError::new(input, DateParseReason::MonthOutOfRange));
    }
    let year = year as i32;
    if day == 0 || day > days_in_month(year, month) {
        return Err(DateParseError::new(input, DateParseReason::DayOutOfRange));
    }

    NaiveDate::from_ymd_opt(year, month, day).ok_or_else(malformed)
}

/// Midnight UTC at the start of `date`.
pub fn start_of_day_utc(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::default()))
}

fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        4 | 6 | 9 | 11 => 30,
        2 if is_leap_year(year) => 29,
        2 => 28,
        _ => 31,
    }
}

fn is_leap_year(year: i32) -> bool {
    year % 4 == 0 && (year % 100 != 0 || year % 400 == 0)
}
