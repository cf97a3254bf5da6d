//! Spatial harmonization: every source onto one shared grid.
//!
//! The target grid is computed once per request from the region bounds and
//! resolution label. Each source is then reprojected independently with a
//! resampling method selected by its semantics: bilinear for continuous
//! surfaces, nearest-neighbor for categorical risk surfaces, and
//! mass-conservative sum aggregation for population counts.
//!
//! A single source's failure never aborts the request — the failure is
//! recorded and the source dropped from the result set.

use std::collections::HashMap;

use rayon::prelude::*;
use tracing::{debug, warn};

use harmon_common::{
    HarmonError, HarmonResult, RasterBlock, ResamplingMethod, SourceKind, TargetGrid,
};

/// Reprojects source blocks onto the shared target grid.
pub struct SpatialHarmonizer;

impl SpatialHarmonizer {
    pub fn new() -> Self {
        Self
    }

    /// Resample every source's blocks onto `grid`.
    ///
    /// Returns the successfully resampled sources and the per-source
    /// failures (graceful degradation: a failed source is simply absent
    /// from the result).
    pub fn resample_all(
        &self,
        sources: HashMap<SourceKind, Vec<RasterBlock>>,
        grid: &TargetGrid,
    ) -> (HashMap<SourceKind, Vec<RasterBlock>>, Vec<HarmonError>) {
        let mut resampled = HashMap::new();
        let mut failures = Vec::new();

        for (kind, blocks) in sources {
            let method = kind.resampling();
            let mut out_blocks = Vec::with_capacity(blocks.len());
            let mut failed = false;

            for block in &blocks {
                match self.resample_block(block, method, grid) {
                    Ok(out) => out_blocks.push(out),
                    Err(e) => {
                        warn!(source = %kind, variable = %block.name, error = %e,
                              "resampling failed, dropping source");
                        failures.push(HarmonError::resampling_failure(
                            kind.to_string(),
                            e.to_string(),
                        ));
                        failed = true;
                        break;
                    }
                }
            }

            if !failed {
                debug!(source = %kind, blocks = out_blocks.len(), method = ?method,
                       "source resampled onto target grid");
                resampled.insert(kind, out_blocks);
            }
        }

        (resampled, failures)
    }

    /// Resample one block onto the target grid, preserving its time axis.
    pub fn resample_block(
        &self,
        block: &RasterBlock,
        method: ResamplingMethod,
        grid: &TargetGrid,
    ) -> HarmonResult<RasterBlock> {
        if block.data.is_empty() || block.width == 0 || block.height == 0 {
            return Err(HarmonError::resampling_failure(
                block.name.clone(),
                "empty source block",
            ));
        }
        if !block.bbox.intersects(&grid.bbox) {
            return Err(HarmonError::resampling_failure(
                block.name.clone(),
                format!(
                    "source bounds {} do not intersect target bounds {}",
                    block.bbox.cache_key(),
                    grid.bbox.cache_key()
                ),
            ));
        }

        // Time steps are independent; resample them in parallel. This is
        // internal to the primitive and not part of the pipeline contract.
        let planes: Vec<Vec<f32>> = (0..block.num_steps())
            .into_par_iter()
            .map(|t| resample_plane(block, block.step(t), method, grid))
            .collect();

        let mut data = Vec::with_capacity(grid.len() * block.num_steps());
        for plane in planes {
            data.extend_from_slice(&plane);
        }

        let out = match &block.times {
            Some(times) => RasterBlock::new_3d(
                block.name.clone(),
                data,
                grid.width,
                grid.height,
                times.clone(),
                grid.bbox,
            ),
            None => RasterBlock::new_2d(block.name.clone(), data, grid.width, grid.height, grid.bbox),
        };
        Ok(out)
    }
}

impl Default for SpatialHarmonizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Resample a single spatial plane onto the target grid.
fn resample_plane(
    block: &RasterBlock,
    plane: &[f32],
    method: ResamplingMethod,
    grid: &TargetGrid,
) -> Vec<f32> {
    match method {
        ResamplingMethod::Bilinear => bilinear_plane(block, plane, grid),
        ResamplingMethod::Nearest => nearest_plane(block, plane, grid),
        ResamplingMethod::Sum => sum_plane(block, plane, grid),
    }
}

/// Bilinear interpolation at each output pixel center.
///
/// Output pixels whose center falls outside the source bounds stay NaN;
/// missing source values propagate through the weighted sum so
/// missingness is never averaged away.
fn bilinear_plane(block: &RasterBlock, plane: &[f32], grid: &TargetGrid) -> Vec<f32> {
    let mut out = vec![f32::NAN; grid.len()];

    for out_row in 0..grid.height {
        for out_col in 0..grid.width {
            let (lon, lat) = grid.transform.pixel_center(out_col, out_row);
            if !block.bbox.contains(lon, lat) {
                continue;
            }

            let (gx, gy) = block.transform.to_pixel(lon, lat);
            let x1 = gx.floor().max(0.0) as usize;
            let y1 = gy.floor().max(0.0) as usize;
            let x1 = x1.min(block.width - 1);
            let y1 = y1.min(block.height - 1);
            let x2 = (x1 + 1).min(block.width - 1);
            let y2 = (y1 + 1).min(block.height - 1);

            let dx = (gx - x1 as f64).clamp(0.0, 1.0) as f32;
            let dy = (gy - y1 as f64).clamp(0.0, 1.0) as f32;

            let v11 = plane[y1 * block.width + x1];
            let v21 = plane[y1 * block.width + x2];
            let v12 = plane[y2 * block.width + x1];
            let v22 = plane[y2 * block.width + x2];

            let top = v11 * (1.0 - dx) + v21 * dx;
            let bottom = v12 * (1.0 - dx) + v22 * dx;
            out[out_row * grid.width + out_col] = top * (1.0 - dy) + bottom * dy;
        }
    }
    out
}

/// Nearest-neighbor lookup at each output pixel center. Used for
/// categorical/risk surfaces so resampling never invents intermediate
/// categories.
fn nearest_plane(block: &RasterBlock, plane: &[f32], grid: &TargetGrid) -> Vec<f32> {
    let mut out = vec![f32::NAN; grid.len()];

    for out_row in 0..grid.height {
        for out_col in 0..grid.width {
            let (lon, lat) = grid.transform.pixel_center(out_col, out_row);
            if !block.bbox.contains(lon, lat) {
                continue;
            }

            let (gx, gy) = block.transform.to_pixel(lon, lat);
            let col = (gx.round().max(0.0) as usize).min(block.width - 1);
            let row = (gy.round().max(0.0) as usize).min(block.height - 1);
            out[out_row * grid.width + out_col] = plane[row * block.width + col];
        }
    }
    out
}

/// Mass-conservative aggregation: each source cell's value is assigned to
/// the output cell containing the source cell's center, so the grid total
/// is preserved under downsampling.
fn sum_plane(block: &RasterBlock, plane: &[f32], grid: &TargetGrid) -> Vec<f32> {
    let mut out = vec![f32::NAN; grid.len()];

    // Cells covered by the source start at zero; uncovered cells stay NaN.
    for out_row in 0..grid.height {
        for out_col in 0..grid.width {
            let (lon, lat) = grid.transform.pixel_center(out_col, out_row);
            if block.bbox.contains(lon, lat) {
                out[out_row * grid.width + out_col] = 0.0;
            }
        }
    }

    for src_row in 0..block.height {
        for src_col in 0..block.width {
            let value = plane[src_row * block.width + src_col];
            if !value.is_finite() {
                continue;
            }
            let (lon, lat) = block.transform.pixel_center(src_col, src_row);
            if !grid.bbox.contains(lon, lat) {
                continue;
            }

            let col = ((lon - grid.bbox.west) / (grid.bbox.width() / grid.width as f64))
                .floor()
                .max(0.0) as usize;
            let row = ((grid.bbox.north - lat) / (grid.bbox.height() / grid.height as f64))
                .floor()
                .max(0.0) as usize;
            let col = col.min(grid.width - 1);
            let row = row.min(grid.height - 1);

            let cell = &mut out[row * grid.width + col];
            if cell.is_finite() {
                *cell += value;
            } else {
                *cell = value;
            }
        }
    }
    out
}
