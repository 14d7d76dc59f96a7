use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Minutes in one calendar day.
pub const MINUTES_PER_DAY: u32 = 1440;

/// A clock string failed to parse as `HH:MM` (hours 0–23, minutes 0–59).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidTime(pub String);

impl fmt::Display for InvalidTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid time of day: {:?}", self.0)
    }
}

impl std::error::Error for InvalidTime {}

/// A time of day with minute precision.
///
/// Parses from and renders as a 24-hour `"HH:MM"` string, which is also the
/// serialized form, so stored records keep the clock-string data contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeOfDay(u16);

impl TimeOfDay {
    /// Parse `"HH:MM"`. Out-of-range or non-numeric input is rejected, not
    /// clamped.
    pub fn from_hhmm(s: &str) -> Result<Self, InvalidTime> {
        let Some((h, m)) = s.split_once(':') else {
            return Err(InvalidTime(s.to_string()));
        };
        let hours: u32 = h.parse().map_err(|_| InvalidTime(s.to_string()))?;
        let minutes: u32 = m.parse().map_err(|_| InvalidTime(s.to_string()))?;
        if hours > 23 || minutes > 59 {
            return Err(InvalidTime(s.to_string()));
        }
        Ok(Self((hours * 60 + minutes) as u16))
    }

    /// Minutes since midnight.
    pub fn minutes(self) -> u32 {
        u32::from(self.0)
    }

    /// Add a duration, wrapping past midnight. Returns the wrapped time and
    /// the number of whole days carried (0 while the window stays in-day).
    /// The wrap is silent; callers advance the end date by the carry.
    pub fn add_minutes(self, duration: u32) -> (Self, u32) {
        let total = u32::from(self.0) + duration;
        (
            Self((total % MINUTES_PER_DAY) as u16),
            total / MINUTES_PER_DAY,
        )
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.0 / 60, self.0 % 60)
    }
}

impl FromStr for TimeOfDay {
    type Err = InvalidTime;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hhmm(s)
    }
}

impl Serialize for TimeOfDay {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TimeOfDay {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hhmm(&s).map_err(serde::de::Error::custom)
    }
}

/// Number of calendar days covered by `[start, end]`, counting both
/// endpoints: the span of a same-day pair is 1.
pub fn inclusive_day_span(start: NaiveDate, end: NaiveDate) -> i64 {
    end.signed_duration_since(start).num_days().abs() + 1
}
