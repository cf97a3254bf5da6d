//! Cache keys for harmonized results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use harmon_common::{BoundingBox, Resolution, TimeRange};

/// Key identifying one cached harmonization result.
///
/// Region bounds are quantized to 3 decimal places so floating-point noise
/// in request bounds does not fragment the cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    bounds_key: String,
    start: String,
    end: String,
    resolution: Resolution,
}

impl CacheKey {
    /// Build the key for a request.
    pub fn new(bounds: &BoundingBox, range: &TimeRange, resolution: Resolution) -> Self {
        Self {
            bounds_key: bounds.cache_key(),
            start: format_date(&range.start),
            end: format_date(&range.end),
            resolution,
        }
    }

    /// Filesystem-safe entry file name.
    pub fn filename(&self) -> String {
        format!(
            "{}_{}_{}_{}.json",
            self.bounds_key,
            self.start,
            self.end,
            self.resolution.as_str()
        )
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{}..{}/{}",
            self.bounds_key, self.start, self.end, self.resolution
        )
    }
}

fn format_date(dt: &DateTime<Utc>) -> String {
    dt.format("%Y%m%d").to_string()
}
