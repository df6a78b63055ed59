//! Lap-time values as published by timing sheets.
//!
//! Timing exports mix numeric seconds with clock strings such as `2:10.345`,
//! `01:32.678` or `1:02:03.5`, sometimes with a decimal comma. Everything the
//! core computes works in seconds, so conversion happens here once.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TimeParseError;

/// A time as it appears in an input table: plain seconds or a clock string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TimeValue {
    /// Seconds.
    Seconds(f64),
    /// Clock notation (`m:ss.fff`, `h:mm:ss.fff`) or a numeric string.
    Text(String),
}

impl TimeValue {
    /// Converts the value to seconds.
    pub fn seconds(&self) -> Result<f64, TimeParseError> {
        match self {
            Self::Seconds(s) => validate(*s, &s.to_string()),
            Self::Text(raw) => parse_lap_time(raw),
        }
    }
}

impl From<f64> for TimeValue {
    fn from(seconds: f64) -> Self {
        Self::Seconds(seconds)
    }
}

impl From<&str> for TimeValue {
    fn from(raw: &str) -> Self {
        Self::Text(raw.to_string())
    }
}

impl fmt::Display for TimeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Seconds(s) => write!(f, "{s}"),
            Self::Text(raw) => f.write_str(raw),
        }
    }
}

fn error(raw: &str, reason: impl Into<String>) -> TimeParseError {
    TimeParseError {
        raw: raw.to_string(),
        reason: reason.into(),
    }
}

fn validate(seconds: f64, raw: &str) -> Result<f64, TimeParseError> {
    if !seconds.is_finite() {
        return Err(error(raw, "not a finite number"));
    }
    if seconds < 0.0 {
        return Err(error(raw, "negative time"));
    }
    Ok(seconds)
}

fn parse_component(part: &str, raw: &str) -> Result<u32, TimeParseError> {
    part.trim()
        .parse::<u32>()
        .map_err(|_| error(raw, format!("invalid clock component '{part}'")))
}

/// Parses a lap time into seconds.
///
/// Accepts `ss.fff`, `m:ss.fff` and `h:mm:ss.fff`, with either `.` or `,` as
/// the decimal separator.
///
/// # Examples
///
/// ```
/// use racefacts::time::parse_lap_time;
///
/// assert_eq!(parse_lap_time("2:10.5").unwrap(), 130.5);
/// assert_eq!(parse_lap_time("92,25").unwrap(), 92.25);
/// ```
pub fn parse_lap_time(raw: &str) -> Result<f64, TimeParseError> {
    let normalized = raw.trim().replace(',', ".");
    if normalized.is_empty() {
        return Err(error(raw, "empty"));
    }

    let parts: Vec<&str> = normalized.split(':').collect();
    let (whole, seconds_part) = match parts.as_slice() {
        [s] => (0u32, *s),
        [m, s] => (parse_component(m, raw)? * 60, *s),
        [h, m, s] => {
            let hours = parse_component(h, raw)?;
            let minutes = parse_component(m, raw)?;
            (hours * 3600 + minutes * 60, *s)
        }
        _ => return Err(error(raw, "too many ':' separators")),
    };

    let seconds: f64 = seconds_part
        .trim()
        .parse()
        .map_err(|_| error(raw, format!("invalid seconds '{seconds_part}'")))?;
    if parts.len() > 1 && seconds >= 60.0 {
        return Err(error(raw, "seconds component must be below 60"));
    }

    validate(f64::from(whole) + seconds, raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minutes_and_seconds() {
        assert!((parse_lap_time("2:10.345").unwrap() - 130.345).abs() < 1e-9);
        assert!((parse_lap_time("01:32.678").unwrap() - 92.678).abs() < 1e-9);
    }

    #[test]
    fn parses_hours() {
        assert!((parse_lap_time("1:02:03.5").unwrap() - 3723.5).abs() < 1e-9);
    }

    #[test]
    fn parses_plain_seconds_with_decimal_comma() {
        assert!((parse_lap_time(" 98,125 ").unwrap() - 98.125).abs() < 1e-9);
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_lap_time("").is_err());
        assert!(parse_lap_time("abc").is_err());
        assert!(parse_lap_time("1:2:3:4").is_err());
        assert!(parse_lap_time("1:75.0").is_err());
        assert!(parse_lap_time("-3.0").is_err());
    }

    #[test]
    fn time_value_deserializes_numbers_and_strings() {
        let v: Vec<TimeValue> = serde_json::from_str(r#"[98.5, "1:38.500"]"#).unwrap();
        assert_eq!(v[0].seconds().unwrap(), 98.5);
        assert_eq!(v[1].seconds().unwrap(), 98.5);
    }

    #[test]
    fn time_value_rejects_non_finite_seconds() {
        assert!(TimeValue::Seconds(f64::NAN).seconds().is_err());
    }
}
