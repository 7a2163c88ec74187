//! Centralized date and datetime handling
//!
//! - Timestamps are stored as RFC3339 text and parsed back leniently (RFC3339
//!   or SQLite `YYYY-MM-DD HH:MM:SS`)
//! - API dates arrive as full timestamps (`2022-10-18T23:30:00.000Z`) or plain
//!   dates; only the calendar date is kept
//! - Ages are computed in whole years against an explicit "today"

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Utc};

use crate::errors::{EtlError, EtlResult};

/// Parse a stored timestamp.
///
/// Supports:
/// - RFC3339 with timezone: "2023-01-01T12:00:00Z"
/// - RFC3339 with offset: "2023-01-01T12:00:00+02:00"
/// - SQLite format (assumes UTC): "2023-01-01 12:00:00"
pub fn parse_timestamp(input: &str) -> EtlResult<DateTime<Utc>> {
    let trimmed = input.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(naive.and_utc());
        }
    }

    Err(EtlError::store(format!("invalid timestamp '{input}'")))
}

/// Calendar date from an API value such as "2022-10-18T23:30:00.000Z" or
/// "1998-03-24". Returns `None` when the leading ten characters are not a
/// `YYYY-MM-DD` date.
pub fn parse_api_date(input: &str) -> Option<NaiveDate> {
    let trimmed = input.trim();
    let head = trimmed.get(..10)?;
    NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()
}

/// Age in whole years on `today`
pub fn calculate_age(birth_date: NaiveDate, today: NaiveDate) -> i64 {
    let mut age = i64::from(today.year() - birth_date.year());
    if (today.month(), today.day()) < (birth_date.month(), birth_date.day()) {
        age -= 1;
    }
    age.max(0)
}
