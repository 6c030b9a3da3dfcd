//! Raw DWD timestamp parsing
//!
//! Product files carry `MESS_DATUM` as a fixed-width, zero-padded digit string
//! (`YYYYMMDDHH` for hourly products, `YYYYMMDD` for daily ones and for the
//! station metadata dates). Fixed width is what makes sorting the raw strings
//! equivalent to sorting the parsed timestamps.

use crate::app::models::Timestamp;
use crate::constants::{DAILY_TIMESTAMP_FORMAT, HOURLY_TIMESTAMP_FORMAT};
use crate::{Error, Result};
use chrono::{NaiveDate, NaiveDateTime};

/// Parse a raw `YYYYMMDDHH` or `YYYYMMDD` timestamp
pub fn parse_raw_timestamp(raw: &str) -> Result<Timestamp> {
    let raw = raw.trim();
    match raw.len() {
        10 => NaiveDateTime::parse_from_str(&format!("{}00", raw), "%Y%m%d%H%M")
            .map_err(|e| {
                Error::datetime_parsing(
                    format!("Invalid hourly timestamp '{}' ({})", raw, HOURLY_TIMESTAMP_FORMAT),
                    e,
                )
            }),
        8 => NaiveDate::parse_from_str(raw, DAILY_TIMESTAMP_FORMAT)
            .map(|date| date.and_time(chrono::NaiveTime::MIN))
            .map_err(|e| {
                Error::datetime_parsing(
                    format!("Invalid daily timestamp '{}' ({})", raw, DAILY_TIMESTAMP_FORMAT),
                    e,
                )
            }),
        _ => Err(Error::value_parse("MESS_DATUM", raw)),
    }
}

/// Parse an optional metadata date; an empty field means open-ended
pub fn parse_optional_day(raw: &str) -> Result<Option<Timestamp>> {
    if raw.trim().is_empty() {
        Ok(None)
    } else {
        parse_raw_timestamp(raw).map(Some)
    }
}
