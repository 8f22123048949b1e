use std::fmt;

use chrono::NaiveDateTime;

/// Fixed layout of date-time fields in the source extracts, e.g.
/// `31DEC2023:00:00:00.0000000`. The fractional part is validated separately.
pub const SOURCE_DATETIME_FORMAT: &str = "%d%b%Y:%H:%M:%S";
pub const CANONICAL_DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

const MAX_FRACTION_DIGITS: usize = 9;

/// A coerced cell ready for the destination table. Nulls are `None`.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Integer(i64),
    Real(f64),
    Text(String),
}

impl Value {
    pub fn as_display(&self) -> String {
        match self {
            Value::Integer(i) => i.to_string(),
            Value::Real(f) => f.to_string(),
            Value::Text(s) => s.clone(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

/// Parses a number written with `decimal_separator`. Non-finite results count
/// as unparseable.
pub fn parse_number(value: &str, decimal_separator: char) -> Option<f64> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    let parsed = if decimal_separator == '.' {
        trimmed.parse::<f64>()
    } else {
        trimmed.replace(decimal_separator, ".").parse::<f64>()
    };
    parsed.ok().filter(|number| number.is_finite())
}

pub fn parse_whole_number(value: &str) -> Option<i64> {
    value.trim().parse::<i64>().ok()
}

/// Whole-valued floats inside the `i64` range narrow to integers.
pub fn narrow_to_integer(number: f64) -> Option<i64> {
    if number.fract() == 0.0 && number >= i64::MIN as f64 && number < i64::MAX as f64 {
        Some(number as i64)
    } else {
        None
    }
}

pub fn parse_source_datetime(value: &str) -> Option<NaiveDateTime> {
    let (stamp, fraction) = value.trim().split_once('.')?;
    if fraction.is_empty()
        || fraction.len() > MAX_FRACTION_DIGITS
        || !fraction.bytes().all(|b| b.is_ascii_digit())
    {
        return None;
    }
    NaiveDateTime::parse_from_str(stamp, SOURCE_DATETIME_FORMAT).ok()
}

/// Rewrites a source date-time as ISO-8601 local time without fractional seconds.
pub fn canonical_datetime(value: &str) -> Option<String> {
    parse_source_datetime(value).map(|parsed| parsed.format(CANONICAL_DATETIME_FORMAT).to_string())
}
