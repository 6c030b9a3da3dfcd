//! Tests for record normalization


/// Build owned rows from string literals
pub fn rows(lines: &[&str]) -> Vec<String> {
    lines.iter().map(|l| l.to_string()).collect()
}

pub const HOURLY_HEADER: &str = "STATIONS_ID;MESS_DATUM;QN_9;TT_TU;RF_TU;eor";
