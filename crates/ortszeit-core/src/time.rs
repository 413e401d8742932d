//! Hour arithmetic and interval logic for the timeline index.
//!
//! The store keys every `Hour` node by its floored timestamp in the
//! canonical string form below, so all chain math happens on
//! zone-naive datetimes truncated to the hour.

use chrono::{Duration, NaiveDateTime, Timelike};

use crate::error::DomainError;

/// Canonical store form of a timestamp: `2014-01-01T12:00:00`.
pub const DT_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

pub fn fmt_dt(dt: NaiveDateTime) -> String {
    dt.format(DT_FORMAT).to_string()
}

pub fn parse_dt(s: &str) -> Result<NaiveDateTime, chrono::ParseError> {
    NaiveDateTime::parse_from_str(s, DT_FORMAT)
}

/// Truncate minutes, seconds, and subseconds.
pub fn floor_hour(dt: NaiveDateTime) -> NaiveDateTime {
    dt.date()
        .and_hms_opt(dt.hour(), 0, 0)
        .unwrap_or(dt)
}

/// The inclusive sequence of floored hours from `first` to `last`,
/// stepping exactly one hour. Empty when `last` floors below `first`.
pub fn hour_range(first: NaiveDateTime, last: NaiveDateTime) -> Vec<NaiveDateTime> {
    let last = floor_hour(last);
    let mut cursor = floor_hour(first);
    let mut hours = Vec::new();
    while cursor <= last {
        hours.push(cursor);
        cursor += Duration::hours(1);
    }
    hours
}

/// `len` consecutive floored hours starting at `first`.
pub fn hours_from(first: NaiveDateTime, len: usize) -> Vec<NaiveDateTime> {
    let start = floor_hour(first);
    (0..len)
        .map(|i| start + Duration::hours(i as i64))
        .collect()
}

/// Whether two half-open intervals overlap.
///
/// Each interval must begin before it ends.
pub fn timespans_overlap(
    a: (NaiveDateTime, NaiveDateTime),
    b: (NaiveDateTime, NaiveDateTime),
) -> Result<bool, DomainError> {
    for (start, stop) in [a, b] {
        if start >= stop {
            return Err(DomainError::InvalidRange { start, stop });
        }
    }
    let ((s1, e1), (s2, e2)) = (a, b);
    Ok(s1 < e2 && s2 < e1)
}
