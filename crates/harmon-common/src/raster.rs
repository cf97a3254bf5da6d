//! Georeferenced raster blocks and grid geometry.
//!
//! A [`RasterBlock`] is the common working unit handed between pipeline
//! stages: a named `Vec<f32>` (row-major, north-up; time-major when a time
//! axis is present) with an affine transform, CRS identifier, and bounds.
//! NaN is the single missing-value sentinel throughout the pipeline.
//!
//! Blocks follow copy-on-transform discipline: each stage builds new blocks
//! from its inputs and never mutates a block it received.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::bbox::BoundingBox;
use crate::time::Resolution;

/// CRS identifier used for all harmonized grids.
pub const WGS84: &str = "EPSG:4326";

/// North-up affine georeferencing transform.
///
/// Maps pixel indices to geographic coordinates: the origin is the top-left
/// corner of the top-left pixel, `pixel_width` is positive (east) and
/// `pixel_height` negative (south), matching GDAL conventions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridTransform {
    pub origin_lon: f64,
    pub origin_lat: f64,
    pub pixel_width: f64,
    pub pixel_height: f64,
}

impl GridTransform {
    /// Derive the transform for a grid covering `bbox` with the given
    /// dimensions.
    pub fn from_bounds(bbox: &BoundingBox, width: usize, height: usize) -> Self {
        Self {
            origin_lon: bbox.west,
            origin_lat: bbox.north,
            pixel_width: bbox.width() / width as f64,
            pixel_height: -bbox.height() / height as f64,
        }
    }

    /// Geographic coordinates of the center of pixel (col, row).
    pub fn pixel_center(&self, col: usize, row: usize) -> (f64, f64) {
        (
            self.origin_lon + (col as f64 + 0.5) * self.pixel_width,
            self.origin_lat + (row as f64 + 0.5) * self.pixel_height,
        )
    }

    /// Fractional pixel coordinates of a geographic point.
    ///
    /// Returns (col, row) measured in pixel units from the grid origin;
    /// values refer to pixel centers, so (0.0, 0.0) is the center of the
    /// top-left pixel. May be out of range for points outside the grid.
    pub fn to_pixel(&self, lon: f64, lat: f64) -> (f64, f64) {
        (
            (lon - self.origin_lon) / self.pixel_width - 0.5,
            (lat - self.origin_lat) / self.pixel_height - 0.5,
        )
    }
}

/// A named, georeferenced numeric array.
///
/// 2-D spatial (`times == None`), or 3-D with a leading time axis
/// (`times == Some(..)`, data laid out time-major: step 0's full grid,
/// then step 1's, ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RasterBlock {
    /// Variable name, e.g. "temperature", "ndvi", "population".
    pub name: String,
    /// Values, row-major within each time step. NaN marks missing data.
    pub data: Vec<f32>,
    pub width: usize,
    pub height: usize,
    /// Timestamps for the leading time axis, if present. Monotonic.
    pub times: Option<Vec<DateTime<Utc>>>,
    pub transform: GridTransform,
    pub crs: String,
    pub bbox: BoundingBox,
}

impl RasterBlock {
    /// Create a 2-D (single time step) block.
    pub fn new_2d(
        name: impl Into<String>,
        data: Vec<f32>,
        width: usize,
        height: usize,
        bbox: BoundingBox,
    ) -> Self {
        Self {
            name: name.into(),
            data,
            width,
            height,
            times: None,
            transform: GridTransform::from_bounds(&bbox, width, height),
            crs: WGS84.to_string(),
            bbox,
        }
    }

    /// Create a 3-D block with a leading time axis.
    ///
    /// `data.len()` must equal `times.len() * width * height`.
    pub fn new_3d(
        name: impl Into<String>,
        data: Vec<f32>,
        width: usize,
        height: usize,
        times: Vec<DateTime<Utc>>,
        bbox: BoundingBox,
    ) -> Self {
        debug_assert_eq!(data.len(), times.len() * width * height);
        Self {
            name: name.into(),
            data,
            width,
            height,
            times: Some(times),
            transform: GridTransform::from_bounds(&bbox, width, height),
            crs: WGS84.to_string(),
            bbox,
        }
    }

    /// Number of time steps (1 for a 2-D block).
    pub fn num_steps(&self) -> usize {
        self.times.as_ref().map_or(1, Vec::len)
    }

    /// Number of pixels per time step.
    pub fn plane_len(&self) -> usize {
        self.width * self.height
    }

    /// The spatial slice for one time step.
    ///
    /// For 2-D blocks only step 0 exists.
    pub fn step(&self, t: usize) -> &[f32] {
        let plane = self.plane_len();
        &self.data[t * plane..(t + 1) * plane]
    }

    /// Value at (step, row, col), if in range.
    pub fn get(&self, t: usize, row: usize, col: usize) -> Option<f32> {
        if t >= self.num_steps() || row >= self.height || col >= self.width {
            return None;
        }
        self.data
            .get(t * self.plane_len() + row * self.width + col)
            .copied()
    }

    /// Per-pixel time series at (row, col).
    pub fn pixel_series(&self, row: usize, col: usize) -> Vec<f32> {
        let plane = self.plane_len();
        let offset = row * self.width + col;
        (0..self.num_steps())
            .map(|t| self.data[t * plane + offset])
            .collect()
    }

    /// Fraction of finite (non-NaN) values across the whole block.
    pub fn valid_ratio(&self) -> f64 {
        if self.data.is_empty() {
            return 0.0;
        }
        let valid = self.data.iter().filter(|v| v.is_finite()).count();
        valid as f64 / self.data.len() as f64
    }
}

/// The shared output grid for one harmonization request.
///
/// Computed once per request from the region bounds and resolution label;
/// every harmonized raster and feature array uses this geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetGrid {
    pub bbox: BoundingBox,
    pub width: usize,
    pub height: usize,
    pub transform: GridTransform,
    pub resolution: Resolution,
}

impl TargetGrid {
    /// Compute the target grid for a region at the requested resolution.
    ///
    /// Kilometers are converted to degrees with the equatorial
    /// approximation (km / 111.0); dimensions are rounded up so the grid
    /// always covers the full bounds.
    pub fn compute(bbox: BoundingBox, resolution: Resolution) -> Self {
        let res_deg = resolution.km() / 111.0;
        let width = (bbox.width() / res_deg).ceil().max(1.0) as usize;
        let height = (bbox.height() / res_deg).ceil().max(1.0) as usize;
        Self {
            bbox,
            width,
            height,
            transform: GridTransform::from_bounds(&bbox, width, height),
            resolution,
        }
    }

    /// Grid shape as (height, width).
    pub fn shape(&self) -> (usize, usize) {
        (self.height, self.width)
    }

    /// Number of pixels in the grid.
    pub fn len(&self) -> usize {
        self.width * self.height
    }

    /// True for a zero-sized grid (cannot happen via [`TargetGrid::compute`]).
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
