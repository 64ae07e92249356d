//! Utility functions and helpers

pub mod date;

pub use date::{parse_calendar_date, start_of_day_utc, DateParseError, DateParseReason};
