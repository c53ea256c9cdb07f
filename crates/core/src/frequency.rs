//! Resampling frequency.
//!
//! Accepts pandas-style fixed offset aliases such as `"1H"`, `"30min"`,
//! `"15T"` or `"1.5h"`. Calendar offsets (weeks anchored to a weekday,
//! month/quarter/year ends, business days) have no fixed width and are
//! rejected.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

const MS_PER_SECOND: i64 = 1_000;
const MS_PER_MINUTE: i64 = 60 * MS_PER_SECOND;
const MS_PER_HOUR: i64 = 60 * MS_PER_MINUTE;
const MS_PER_DAY: i64 = 24 * MS_PER_HOUR;

/// Canonical units, largest first, used for display.
const UNITS: [(i64, &str); 5] = [
    (MS_PER_DAY, "D"),
    (MS_PER_HOUR, "h"),
    (MS_PER_MINUTE, "min"),
    (MS_PER_SECOND, "s"),
    (1, "ms"),
];

/// Fixed bucket width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Frequency {
    width_ms: i64,
}

impl Frequency {
    pub const HOUR: Frequency = Frequency { width_ms: MS_PER_HOUR };
    pub const DAY: Frequency = Frequency { width_ms: MS_PER_DAY };

    /// Create a frequency from a width in milliseconds.
    pub fn from_millis(width_ms: i64) -> Result<Self> {
        if width_ms <= 0 {
            return Err(Error::frequency(format!(
                "width must be positive, got {width_ms}ms"
            )));
        }
        Ok(Self { width_ms })
    }

    /// Bucket width in milliseconds.
    #[inline]
    pub fn width_ms(&self) -> i64 {
        self.width_ms
    }
}

impl Default for Frequency {
    fn default() -> Self {
        Self::HOUR
    }
}

fn unit_ms(unit: &str) -> Option<i64> {
    match unit {
        "ms" | "L" => Some(1),
        "s" | "S" => Some(MS_PER_SECOND),
        "min" | "T" => Some(MS_PER_MINUTE),
        "h" | "H" => Some(MS_PER_HOUR),
        "d" | "D" => Some(MS_PER_DAY),
        _ => None,
    }
}

fn is_calendar_unit(unit: &str) -> bool {
    let base = unit.split('-').next().unwrap_or(unit);
    matches!(
        base,
        "W" | "M" | "ME" | "MS" | "SM" | "SMS" | "Q" | "QE" | "QS" | "Y" | "YE" | "YS" | "A"
            | "AS" | "B" | "BM" | "BMS" | "BQ" | "BY" | "BH" | "C"
    )
}

impl FromStr for Frequency {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let split = s
            .find(|c: char| c.is_ascii_alphabetic())
            .ok_or_else(|| Error::frequency(format!("'{s}' has no unit")))?;
        let (number, unit) = s.split_at(split);

        let multiplier: f64 = if number.is_empty() {
            1.0
        } else {
            number
                .parse()
                .map_err(|_| Error::frequency(format!("invalid multiplier in '{s}'")))?
        };

        let Some(unit_width) = unit_ms(unit) else {
            if is_calendar_unit(unit) {
                return Err(Error::frequency(format!(
                    "calendar offset '{s}' has no fixed width"
                )));
            }
            return Err(Error::frequency(format!("unknown unit in '{s}'")));
        };

        let width = multiplier * unit_width as f64;
        if !width.is_finite() || width.fract() != 0.0 {
            return Err(Error::frequency(format!(
                "'{s}' is not a whole number of milliseconds"
            )));
        }
        Self::from_millis(width as i64)
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (unit_width, unit) = UNITS
            .iter()
            .copied()
            .find(|(w, _)| self.width_ms % w == 0)
            .unwrap_or((1, "ms"));
        write!(f, "{}{}", self.width_ms / unit_width, unit)
    }
}

impl TryFrom<String> for Frequency {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<Frequency> for String {
    fn from(freq: Frequency) -> Self {
        freq.to_string()
    }
}
