//! Bounding box types and operations.

use serde::{Deserialize, Serialize};

use crate::error::HarmonError;

/// Largest accepted region extent, in degrees per axis.
///
/// Requests above this produce unbounded grid sizes at 1 km resolution and
/// are rejected before any download is dispatched.
pub const MAX_REGION_EXTENT_DEG: f64 = 20.0;

/// A geographic bounding box in WGS84 degrees (west, south, east, north).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl BoundingBox {
    /// Create a new bounding box from corner coordinates.
    pub fn new(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self {
            west,
            south,
            east,
            north,
        }
    }

    /// Width of the bounding box in degrees.
    pub fn width(&self) -> f64 {
        self.east - self.west
    }

    /// Height of the bounding box in degrees.
    pub fn height(&self) -> f64 {
        self.north - self.south
    }

    /// Center point of the bounding box as (lon, lat).
    pub fn center(&self) -> (f64, f64) {
        ((self.west + self.east) / 2.0, (self.south + self.north) / 2.0)
    }

    /// Check if a point is contained within this bbox.
    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        lon >= self.west && lon <= self.east && lat >= self.south && lat <= self.north
    }

    /// Check if this bbox intersects another.
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.west < other.east
            && self.east > other.west
            && self.south < other.north
            && self.north > other.south
    }

    /// Compute the intersection of two bounding boxes.
    pub fn intersection(&self, other: &BoundingBox) -> Option<BoundingBox> {
        if !self.intersects(other) {
            return None;
        }

        Some(BoundingBox {
            west: self.west.max(other.west),
            south: self.south.max(other.south),
            east: self.east.min(other.east),
            north: self.north.min(other.north),
        })
    }

    /// Compute the union (minimal covering box) of two bounding boxes.
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            west: self.west.min(other.west),
            south: self.south.min(other.south),
            east: self.east.max(other.east),
            north: self.north.max(other.north),
        }
    }

    /// Validate region bounds for a harmonization request.
    ///
    /// Bounds must lie within [-180, 180] x [-90, 90], be non-degenerate
    /// (west < east, south < north), and span no more than
    /// [`MAX_REGION_EXTENT_DEG`] on either axis.
    pub fn validate(&self) -> Result<(), HarmonError> {
        if !self.west.is_finite()
            || !self.south.is_finite()
            || !self.east.is_finite()
            || !self.north.is_finite()
        {
            return Err(HarmonError::InvalidRegion(
                "bounds contain non-finite coordinates".to_string(),
            ));
        }
        if self.west < -180.0 || self.east > 180.0 || self.south < -90.0 || self.north > 90.0 {
            return Err(HarmonError::InvalidRegion(format!(
                "bounds ({:.3}, {:.3}, {:.3}, {:.3}) outside world extent",
                self.west, self.south, self.east, self.north
            )));
        }
        if self.west >= self.east || self.south >= self.north {
            return Err(HarmonError::InvalidRegion(format!(
                "degenerate bounds: west={:.3} east={:.3} south={:.3} north={:.3}",
                self.west, self.east, self.south, self.north
            )));
        }
        if self.width() > MAX_REGION_EXTENT_DEG || self.height() > MAX_REGION_EXTENT_DEG {
            return Err(HarmonError::InvalidRegion(format!(
                "region {:.1} x {:.1} deg exceeds the {} deg limit",
                self.width(),
                self.height(),
                MAX_REGION_EXTENT_DEG
            )));
        }
        Ok(())
    }

    /// Generate a cache key fragment for this bbox.
    ///
    /// Quantized to 3 decimal places so nearby floating-point bounds share
    /// an entry.
    pub fn cache_key(&self) -> String {
        format!(
            "{:.3}_{:.3}_{:.3}_{:.3}",
            self.west, self.south, self.east, self.north
        )
    }
}
