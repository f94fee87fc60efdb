//! Lenient time parsing.

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};

use crate::error::{Error, Result};

/// Wire format of times in requests and records.
pub const TIMEFORMAT: &str = "%Y%m%d%H%M%S";

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y%m%dT%H%M%S%.f",
    "%Y/%m/%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y/%m/%d %H:%M",
    "%Y-%m-%d %H:%M",
    "%Y-%b-%d %H:%M:%S",
    "%Y-%b-%d %H:%M",
    "%Y%m%d_%H%M%S",
    TIMEFORMAT,
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%Y-%b-%d", "%Y%m%d"];

fn epoch() -> Option<NaiveDateTime> { NaiveDate::from_ymd_opt(1979, 1, 1)?.and_hms_opt(0, 0, 0) }

/// Seconds since 1979-01-01T00:00:00.
pub fn from_epoch_seconds(seconds: f64) -> Option<NaiveDateTime> {
    if !seconds.is_finite() {
        return None;
    }
    epoch()?.checked_add_signed(TimeDelta::microseconds((seconds * 1e6).round() as i64))
}

/// Parse a time in any of the accepted layouts: ISO 8601 with `T` or a
/// space, compact `YYYYMMDDTHHMMSS`, slashes, abbreviated month names,
/// `YYYYMMDD_HHMMSS`, bare dates, or a float of seconds since 1979-01-01.
pub fn parse_time(input: &str) -> Result<NaiveDateTime> {
    let text = input.trim();
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
        .or_else(|| text.parse::<f64>().ok().and_then(from_epoch_seconds))
        .ok_or_else(|| Error::InvalidTime(input.to_string()))
}

pub fn format_time(time: &NaiveDateTime) -> String { time.format(TIMEFORMAT).to_string() }
