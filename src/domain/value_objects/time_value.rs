//! TimeValue value object
//!
//! Time strings of the form `<float>[s|m]` used by the `time` and
//! `duration` transformation parameters. Values normalize to `Ns` when
//! under a minute and `Mm` otherwise, which keeps encoded upstream URLs
//! stable for equivalent inputs.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::shared::error::ValidationError;

/// A duration expressed in seconds, constructed from a time string
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeValue {
    seconds: f64,
}

impl TimeValue {
    /// Constructs from raw seconds. Negative values are rejected.
    pub fn from_seconds(seconds: f64) -> Result<Self, ValidationError> {
        if !seconds.is_finite() || seconds < 0.0 {
            return Err(ValidationError::InvalidTimeValue {
                field: "time".to_string(),
                value: seconds.to_string(),
            });
        }
        Ok(Self { seconds })
    }

    pub fn as_seconds(&self) -> f64 {
        self.seconds
    }

    /// Parses `<float>[s|m]`; a bare float is taken as seconds.
    pub fn parse(field: &str, raw: &str) -> Result<Self, ValidationError> {
        let raw = raw.trim();
        let invalid = || ValidationError::InvalidTimeValue {
            field: field.to_string(),
            value: raw.to_string(),
        };

        let (number, multiplier) = if let Some(n) = raw.strip_suffix('s') {
            (n, 1.0)
        } else if let Some(n) = raw.strip_suffix('m') {
            (n, 60.0)
        } else {
            (raw, 1.0)
        };

        let value: f64 = number.parse().map_err(|_| invalid())?;
        if !value.is_finite() || value < 0.0 {
            return Err(invalid());
        }
        Ok(Self {
            seconds: value * multiplier,
        })
    }

    /// Canonical encoding: `Ns` for values under a minute, `Mm` otherwise.
    pub fn encode(&self) -> String {
        if self.seconds < 60.0 {
            format!("{}s", format_number(self.seconds))
        } else {
            format!("{}m", format_number(self.seconds / 60.0))
        }
    }
}

/// Trims redundant fractional digits so 5.0 renders as "5"
fn format_number(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

impl fmt::Display for TimeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.encode())
    }
}

impl FromStr for TimeValue {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TimeValue::parse("time", s)
    }
}

impl TryFrom<String> for TimeValue {
    type Error = ValidationError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<TimeValue> for String {
    fn from(t: TimeValue) -> Self {
        t.encode()
    }
}
