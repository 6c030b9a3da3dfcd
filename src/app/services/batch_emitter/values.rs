//! Conversion of raw column text into API number values

use crate::app::models::{Measurand, ValueConversion};
use crate::constants::{CLOUDINESS_EIGHTHS, MISSING_VALUE};
use crate::{Error, Result};

/// Convert one raw value for `measurand`
///
/// Returns `Ok(None)` for the missing-value sentinel and out-of-range codes,
/// and an [`Error::ValueParse`] when the text is not a number at all.
pub fn convert_value(raw: &str, measurand: Measurand) -> Result<Option<f64>> {
    let raw = raw.trim();
    match measurand.conversion() {
        ValueConversion::Float => {
            let value: f64 = raw
                .parse()
                .map_err(|_| Error::value_parse(measurand.name(), raw))?;
            if value == MISSING_VALUE || !value.is_finite() {
                Ok(None)
            } else {
                Ok(Some(value))
            }
        }
        ValueConversion::Eighths => {
            let eighths: i64 = raw
                .parse()
                .map_err(|_| Error::value_parse(measurand.name(), raw))?;
            if 0 < eighths && eighths < CLOUDINESS_EIGHTHS {
                Ok(Some(eighths as f64 / CLOUDINESS_EIGHTHS as f64))
            } else {
                Ok(None)
            }
        }
    }
}
