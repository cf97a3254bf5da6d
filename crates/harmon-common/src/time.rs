//! Time ranges, target frequencies, and resolution labels.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A closed time range for a harmonization request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// The lookback window ending at `end`.
    pub fn lookback(end: DateTime<Utc>, days: u32) -> Self {
        Self {
            start: end - Duration::days(days as i64),
            end,
        }
    }

    pub fn contains(&self, dt: &DateTime<Utc>) -> bool {
        dt >= &self.start && dt <= &self.end
    }

    /// Length of the range in whole days.
    pub fn num_days(&self) -> i64 {
        (self.end - self.start).num_days()
    }
}

/// Target sampling frequency of the unified time index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    #[default]
    Daily,
    Weekly,
    /// Fixed 30-day step; calendar months are not tracked.
    Monthly,
}

impl Frequency {
    /// Index step in days.
    pub fn step_days(&self) -> i64 {
        match self {
            Frequency::Daily => 1,
            Frequency::Weekly => 7,
            Frequency::Monthly => 30,
        }
    }

    pub fn step(&self) -> Duration {
        Duration::days(self.step_days())
    }
}

/// Target grid resolution label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Resolution {
    #[default]
    #[serde(rename = "1km")]
    Km1,
    #[serde(rename = "5km")]
    Km5,
    #[serde(rename = "10km")]
    Km10,
}

impl Resolution {
    /// Resolution in kilometers.
    pub fn km(&self) -> f64 {
        match self {
            Resolution::Km1 => 1.0,
            Resolution::Km5 => 5.0,
            Resolution::Km10 => 10.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Resolution::Km1 => "1km",
            Resolution::Km5 => "5km",
            Resolution::Km10 => "10km",
        }
    }

    /// Parse a resolution label ("1km" | "5km" | "10km").
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "1km" => Some(Resolution::Km1),
            "5km" => Some(Resolution::Km5),
            "10km" => Some(Resolution::Km10),
            _ => None,
        }
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
