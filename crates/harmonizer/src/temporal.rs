//! Temporal harmonization: one unified time index across all sources.
//!
//! The unified index is the intersection of the per-source coverage —
//! `max(per-source start)` to `min(per-source end)` — so no source
//! contributes all-missing padding at the edges. Each source is brought
//! onto the index with an interpolation scheme matched to its native
//! cadence, then gap-filled with its per-kind policy. Annual/static
//! sources do not constrain the intersection; they are broadcast across
//! whatever index the time-varying sources produce.
//!
//! Interpolation never fabricates data across a real outage: composite
//! sources leave the value missing when the bracketing native samples are
//! further apart than the configured gap threshold.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use harmon_common::{
    Frequency, GapFillFlag, GapFillMethod, HarmonError, HarmonResult, RasterBlock, SeasonalConfig,
    SourceCadence, SourceKind, TemporalConfig, TimeRange,
};

use crate::seasonal::seasonal_factor_at;
use crate::sources::SourcePayload;

/// Output of temporal harmonization: every block of every source shares
/// the unified index.
#[derive(Debug, Clone)]
pub struct TemporalAlignment {
    pub index: Vec<DateTime<Utc>>,
    pub sources: HashMap<SourceKind, Vec<RasterBlock>>,
    /// Gap-fill fallbacks recorded for quality metadata.
    pub fallbacks: Vec<GapFillFlag>,
}

impl TemporalAlignment {
    /// The time range actually covered by the unified index.
    pub fn covered_range(&self) -> Option<TimeRange> {
        match (self.index.first(), self.index.last()) {
            (Some(first), Some(last)) => Some(TimeRange::new(*first, *last)),
            _ => None,
        }
    }
}

/// Aligns heterogeneous source sampling onto one monotonic time index.
pub struct TemporalHarmonizer {
    config: TemporalConfig,
    seasonal: SeasonalConfig,
}

impl TemporalHarmonizer {
    pub fn new(config: TemporalConfig, seasonal: SeasonalConfig) -> Self {
        Self { config, seasonal }
    }

    /// Align all sources onto a unified index at the target frequency.
    ///
    /// Fails only with [`HarmonError::InsufficientTemporalOverlap`] when
    /// the time-varying sources share no common window within the request
    /// range.
    pub fn align(
        &self,
        payloads: &HashMap<SourceKind, SourcePayload>,
        range: &TimeRange,
        frequency: Frequency,
    ) -> HarmonResult<TemporalAlignment> {
        let index = self.unified_index(payloads, range, frequency)?;
        debug!(
            steps = index.len(),
            start = %index.first().map(|t| t.to_rfc3339()).unwrap_or_default(),
            end = %index.last().map(|t| t.to_rfc3339()).unwrap_or_default(),
            "unified time index computed"
        );

        let mut sources = HashMap::new();
        let mut fallbacks = Vec::new();

        for (kind, payload) in payloads {
            let mut aligned_blocks = Vec::with_capacity(payload.blocks.len());
            for block in &payload.blocks {
                let (aligned, used_fallback) =
                    self.align_block(*kind, block, &index, frequency, range);
                if used_fallback {
                    warn!(
                        source = %kind,
                        variable = %block.name,
                        "gap fill fell back to zero-fill"
                    );
                    fallbacks.push(GapFillFlag {
                        source: kind.to_string(),
                        variable: block.name.clone(),
                        reason: format!("{:?} fill failed, zero-fill applied", kind.gap_fill()),
                    });
                }
                aligned_blocks.push(aligned);
            }
            sources.insert(*kind, aligned_blocks);
        }

        Ok(TemporalAlignment {
            index,
            sources,
            fallbacks,
        })
    }

    /// Intersection index: max of per-source starts to min of per-source
    /// ends, clipped to the request range, stepped at the target frequency.
    ///
    /// Annual/static sources are broadcast rather than intersected; a
    /// request with only static sources gets the full request range.
    fn unified_index(
        &self,
        payloads: &HashMap<SourceKind, SourcePayload>,
        range: &TimeRange,
        frequency: Frequency,
    ) -> HarmonResult<Vec<DateTime<Utc>>> {
        let mut start = range.start;
        let mut end = range.end;

        for (kind, payload) in payloads {
            if matches!(kind.cadence(), SourceCadence::Annual) {
                continue;
            }
            for block in &payload.blocks {
                if let Some(times) = &block.times {
                    if let (Some(first), Some(last)) = (times.first(), times.last()) {
                        start = start.max(*first);
                        end = end.min(*last);
                    }
                }
            }
        }

        if start > end {
            return Err(HarmonError::InsufficientTemporalOverlap(format!(
                "intersection start {} is after end {}",
                start.to_rfc3339(),
                end.to_rfc3339()
            )));
        }

        let step = frequency.step();
        let mut index = Vec::new();
        let mut t = start;
        while t <= end {
            index.push(t);
            t += step;
        }
        Ok(index)
    }

    /// Align one variable block onto the index, per-pixel.
    ///
    /// Returns the aligned block and whether any pixel's gap fill fell
    /// back to zero.
    fn align_block(
        &self,
        kind: SourceKind,
        block: &RasterBlock,
        index: &[DateTime<Utc>],
        frequency: Frequency,
        range: &TimeRange,
    ) -> (RasterBlock, bool) {
        let plane = block.plane_len();
        let steps = block.num_steps();

        // A 2-D static block is a single sample at the request start.
        let native_days: Vec<f64> = match &block.times {
            Some(times) => times.iter().map(days_since_epoch).collect(),
            None => vec![days_since_epoch(&range.start)],
        };
        let index_days: Vec<f64> = index.iter().map(days_since_epoch).collect();

        let mut out = vec![f32::NAN; index.len() * plane];
        let mut used_fallback = false;

        for p in 0..plane {
            // Valid native samples for this pixel.
            let mut xs = Vec::with_capacity(steps);
            let mut ys = Vec::with_capacity(steps);
            for t in 0..steps {
                let v = block.data[t * plane + p];
                if v.is_finite() {
                    xs.push(native_days[t]);
                    ys.push(v);
                }
            }

            let mut series = match kind.cadence() {
                SourceCadence::Daily => {
                    self.align_daily(&xs, &ys, &index_days, frequency.step_days())
                }
                SourceCadence::Composite { .. } => self.align_composite(&xs, &ys, &index_days),
                SourceCadence::Annual => broadcast_forward(&xs, &ys, &index_days),
            };

            if self.apply_gap_fill(kind.gap_fill(), &mut series, index) {
                used_fallback = true;
            }

            for (i, v) in series.into_iter().enumerate() {
                out[i * plane + p] = v;
            }
        }

        // Transmission-risk surfaces get the sinusoidal seasonal
        // modulation when broadcast over time.
        if kind.is_transmission_risk() {
            for (i, t) in index.iter().enumerate() {
                let factor = seasonal_factor_at(t, &self.seasonal);
                for v in &mut out[i * plane..(i + 1) * plane] {
                    *v *= factor;
                }
            }
        }

        let aligned = RasterBlock::new_3d(
            block.name.clone(),
            out,
            block.width,
            block.height,
            index.to_vec(),
            block.bbox,
        );
        (aligned, used_fallback)
    }

    /// Daily-cadence alignment: linear interpolation at daily targets,
    /// mean binning when the target frequency is coarser.
    fn align_daily(&self, xs: &[f64], ys: &[f32], index_days: &[f64], step_days: i64) -> Vec<f32> {
        if step_days <= 1 {
            return index_days
                .iter()
                .map(|&x| linear_interpolate(xs, ys, x))
                .collect();
        }

        index_days
            .iter()
            .map(|&x| {
                let mut sum = 0.0f64;
                let mut count = 0usize;
                for (i, &xt) in xs.iter().enumerate() {
                    if xt >= x && xt < x + step_days as f64 {
                        sum += ys[i] as f64;
                        count += 1;
                    }
                }
                if count > 0 {
                    (sum / count as f64) as f32
                } else {
                    linear_interpolate(xs, ys, x)
                }
            })
            .collect()
    }

    /// Composite-cadence alignment: cubic when >= 4 native samples exist,
    /// linear for 2-3, nearest for a single sample. Interpolation is
    /// suppressed across native gaps wider than the configured threshold.
    fn align_composite(&self, xs: &[f64], ys: &[f32], index_days: &[f64]) -> Vec<f32> {
        let max_gap = self.config.max_interpolation_gap_days as f64;
        match xs.len() {
            0 => vec![f32::NAN; index_days.len()],
            1 => index_days.iter().map(|_| ys[0]).collect(),
            2 | 3 => index_days
                .iter()
                .map(|&x| gap_checked(xs, x, max_gap, || linear_interpolate(xs, ys, x)))
                .collect(),
            _ => index_days
                .iter()
                .map(|&x| gap_checked(xs, x, max_gap, || catmull_rom_interpolate(xs, ys, x)))
                .collect(),
        }
    }

    /// Apply the per-kind gap-fill policy to an aligned pixel series.
    ///
    /// Returns true when the policy could not be applied and zero-fill was
    /// used instead (recorded as a quality flag by the caller, never an
    /// error).
    fn apply_gap_fill(
        &self,
        method: GapFillMethod,
        series: &mut [f32],
        index: &[DateTime<Utc>],
    ) -> bool {
        if series.iter().all(|v| v.is_finite()) {
            return false;
        }
        match method {
            GapFillMethod::Zero => {
                zero_fill(series);
                false
            }
            GapFillMethod::Linear => {
                if linear_fill(series) {
                    false
                } else {
                    zero_fill(series);
                    true
                }
            }
            GapFillMethod::Forward => {
                if forward_fill(series) {
                    false
                } else {
                    zero_fill(series);
                    true
                }
            }
            GapFillMethod::SeasonalClimatology => {
                // Gaps with no climatological candidates fall back to zero;
                // gaps that could be filled keep their climatology value.
                if climatology_fill(series, index, self.config.climatology_window_days) {
                    false
                } else {
                    zero_fill(series);
                    true
                }
            }
        }
    }
}

fn days_since_epoch(dt: &DateTime<Utc>) -> f64 {
    dt.timestamp() as f64 / 86_400.0
}

/// Suppress interpolation at `x` when its bracketing native samples are
/// further apart than `max_gap` days, or when `x` falls outside the native
/// range.
fn gap_checked(xs: &[f64], x: f64, max_gap: f64, interp: impl FnOnce() -> f32) -> f32 {
    match bracket(xs, x) {
        Some((lo, hi)) => {
            if xs[hi] - xs[lo] > max_gap {
                f32::NAN
            } else {
                interp()
            }
        }
        None => f32::NAN,
    }
}

/// Indices of the native samples bracketing `x`, if `x` is inside the
/// native range. An exact hit brackets itself.
fn bracket(xs: &[f64], x: f64) -> Option<(usize, usize)> {
    if xs.is_empty() || x < xs[0] || x > xs[xs.len() - 1] {
        return None;
    }
    match xs.binary_search_by(|v| v.partial_cmp(&x).expect("finite sample times")) {
        Ok(i) => Some((i, i)),
        Err(i) => Some((i - 1, i)),
    }
}

/// Piecewise-linear interpolation over valid samples; NaN outside the
/// sampled range.
fn linear_interpolate(xs: &[f64], ys: &[f32], x: f64) -> f32 {
    match bracket(xs, x) {
        None => f32::NAN,
        Some((lo, hi)) if lo == hi => ys[lo],
        Some((lo, hi)) => {
            let t = (x - xs[lo]) / (xs[hi] - xs[lo]);
            (ys[lo] as f64 + t * (ys[hi] as f64 - ys[lo] as f64)) as f32
        }
    }
}

/// Catmull-Rom cubic interpolation on non-uniformly spaced samples.
///
/// Finite-difference tangents with cubic Hermite evaluation per segment;
/// endpoint segments duplicate the boundary sample. Passes through every
/// native sample.
fn catmull_rom_interpolate(xs: &[f64], ys: &[f32], x: f64) -> f32 {
    let (lo, hi) = match bracket(xs, x) {
        None => return f32::NAN,
        Some((lo, hi)) if lo == hi => return ys[lo],
        Some(pair) => pair,
    };

    let x1 = xs[lo];
    let x2 = xs[hi];
    let p1 = ys[lo] as f64;
    let p2 = ys[hi] as f64;

    let (x0, p0) = if lo > 0 {
        (xs[lo - 1], ys[lo - 1] as f64)
    } else {
        (x1, p1)
    };
    let (x3, p3) = if hi + 1 < xs.len() {
        (xs[hi + 1], ys[hi + 1] as f64)
    } else {
        (x2, p2)
    };

    let h = x2 - x1;
    let m1 = if x2 > x0 { (p2 - p0) / (x2 - x0) } else { 0.0 };
    let m2 = if x3 > x1 { (p3 - p1) / (x3 - x1) } else { 0.0 };

    let t = (x - x1) / h;
    let t2 = t * t;
    let t3 = t2 * t;

    let h00 = 2.0 * t3 - 3.0 * t2 + 1.0;
    let h10 = t3 - 2.0 * t2 + t;
    let h01 = -2.0 * t3 + 3.0 * t2;
    let h11 = t3 - t2;

    (h00 * p1 + h10 * h * m1 + h01 * p2 + h11 * h * m2) as f32
}

/// Forward-fill broadcast for annual/static samples: the latest sample at
/// or before each index time, or the first sample before coverage starts.
fn broadcast_forward(xs: &[f64], ys: &[f32], index_days: &[f64]) -> Vec<f32> {
    if xs.is_empty() {
        return vec![f32::NAN; index_days.len()];
    }
    index_days
        .iter()
        .map(|&x| {
            match xs.partition_point(|&xt| xt <= x) {
                0 => ys[0],
                n => ys[n - 1],
            }
        })
        .collect()
}

fn zero_fill(series: &mut [f32]) {
    for v in series.iter_mut() {
        if !v.is_finite() {
            *v = 0.0;
        }
    }
}

/// Interior gaps linear, edge gaps nearest-valid. False when the series
/// has no valid sample at all.
fn linear_fill(series: &mut [f32]) -> bool {
    let valid: Vec<usize> = (0..series.len()).filter(|&i| series[i].is_finite()).collect();
    if valid.is_empty() {
        return false;
    }

    for i in 0..series.len() {
        if series[i].is_finite() {
            continue;
        }
        let next = valid.partition_point(|&j| j < i);
        let after = valid.get(next).copied();
        let before = if next > 0 { Some(valid[next - 1]) } else { None };
        series[i] = match (before, after) {
            (Some(b), Some(a)) => {
                let t = (i - b) as f64 / (a - b) as f64;
                (series[b] as f64 + t * (series[a] as f64 - series[b] as f64)) as f32
            }
            (Some(b), None) => series[b],
            (None, Some(a)) => series[a],
            (None, None) => unreachable!("valid is non-empty"),
        };
    }
    true
}

/// Carry the last valid value forward; leading gaps take the first valid
/// value. False when the series has no valid sample at all.
fn forward_fill(series: &mut [f32]) -> bool {
    let first_valid = match series.iter().position(|v| v.is_finite()) {
        Some(i) => i,
        None => return false,
    };
    let lead = series[first_valid];
    for v in series[..first_valid].iter_mut() {
        *v = lead;
    }
    let mut last = lead;
    for v in series[first_valid..].iter_mut() {
        if v.is_finite() {
            last = *v;
        } else {
            *v = last;
        }
    }
    true
}

/// Fill each gap with the mean of valid values at nearby days-of-year
/// (circular distance within `window_days`). Only native-valid values are
/// used as candidates. False when some gap had no candidates and was left
/// missing.
fn climatology_fill(series: &mut [f32], index: &[DateTime<Utc>], window_days: i64) -> bool {
    use chrono::Datelike;

    let original = series.to_vec();
    let doys: Vec<i64> = index.iter().map(|t| t.ordinal() as i64).collect();
    let mut complete = true;

    for i in 0..series.len() {
        if original[i].is_finite() {
            continue;
        }
        let mut sum = 0.0f64;
        let mut count = 0usize;
        for j in 0..original.len() {
            if j == i || !original[j].is_finite() {
                continue;
            }
            let raw = (doys[i] - doys[j]).abs();
            let circular = raw.min(365 - raw);
            if circular <= window_days {
                sum += original[j] as f64;
                count += 1;
            }
        }
        if count == 0 {
            complete = false;
            continue;
        }
        series[i] = (sum / count as f64) as f32;
    }
    complete
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use harmon_common::BoundingBox;

    fn day(n: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::days(n)
    }

    fn bbox() -> BoundingBox {
        BoundingBox::new(30.0, -2.0, 32.0, 0.0)
    }

    fn harmonizer() -> TemporalHarmonizer {
        TemporalHarmonizer::new(TemporalConfig::default(), SeasonalConfig::default())
    }

    /// 1x1 block with one value per native time.
    fn series_block(name: &str, values: &[f32], times: Vec<DateTime<Utc>>) -> RasterBlock {
        RasterBlock::new_3d(name, values.to_vec(), 1, 1, times, bbox())
    }

    fn payload(kind: SourceKind, block: RasterBlock) -> SourcePayload {
        SourcePayload::new(kind, vec![block], 1000.0)
    }

    #[test]
    fn test_unified_index_is_the_intersection() {
        let mut payloads = HashMap::new();
        payloads.insert(
            SourceKind::Climate,
            payload(
                SourceKind::Climate,
                series_block(
                    "temperature",
                    &[20.0; 11],
                    (0..11).map(day).collect(),
                ),
            ),
        );
        payloads.insert(
            SourceKind::Precipitation,
            payload(
                SourceKind::Precipitation,
                series_block(
                    "precipitation",
                    &[1.0; 11],
                    (5..16).map(day).collect(),
                ),
            ),
        );

        let range = TimeRange::new(day(0), day(20));
        let alignment = harmonizer()
            .align(&payloads, &range, Frequency::Daily)
            .unwrap();

        // Start is never earlier than the latest per-source start, end
        // never later than the earliest per-source end.
        assert_eq!(alignment.index.first(), Some(&day(5)));
        assert_eq!(alignment.index.last(), Some(&day(10)));
        for blocks in alignment.sources.values() {
            for block in blocks {
                assert_eq!(block.num_steps(), alignment.index.len());
            }
        }
    }

    #[test]
    fn test_disjoint_sources_fail() {
        let mut payloads = HashMap::new();
        payloads.insert(
            SourceKind::Climate,
            payload(
                SourceKind::Climate,
                series_block("temperature", &[20.0; 5], (0..5).map(day).collect()),
            ),
        );
        payloads.insert(
            SourceKind::Precipitation,
            payload(
                SourceKind::Precipitation,
                series_block("precipitation", &[1.0; 5], (10..15).map(day).collect()),
            ),
        );

        let range = TimeRange::new(day(0), day(20));
        let err = harmonizer()
            .align(&payloads, &range, Frequency::Daily)
            .unwrap_err();
        assert!(matches!(err, HarmonError::InsufficientTemporalOverlap(_)));
    }

    #[test]
    fn test_daily_linear_interpolation() {
        let xs = vec![0.0, 2.0, 4.0];
        let ys = vec![10.0, 20.0, 40.0];
        assert_eq!(linear_interpolate(&xs, &ys, 1.0), 15.0);
        assert_eq!(linear_interpolate(&xs, &ys, 3.0), 30.0);
        assert_eq!(linear_interpolate(&xs, &ys, 2.0), 20.0);
        assert!(linear_interpolate(&xs, &ys, 5.0).is_nan());
    }

    #[test]
    fn test_weekly_alignment_uses_bin_means() {
        let mut payloads = HashMap::new();
        // 14 daily samples: 0..13
        let values: Vec<f32> = (0..14).map(|v| v as f32).collect();
        payloads.insert(
            SourceKind::Climate,
            payload(
                SourceKind::Climate,
                series_block("temperature", &values, (0..14).map(day).collect()),
            ),
        );

        let range = TimeRange::new(day(0), day(13));
        let alignment = harmonizer()
            .align(&payloads, &range, Frequency::Weekly)
            .unwrap();

        let block = &alignment.sources[&SourceKind::Climate][0];
        assert_eq!(block.num_steps(), 2);
        // First week bin covers days 0..6 -> mean 3.0
        assert!((block.get(0, 0, 0).unwrap() - 3.0).abs() < 1e-5);
        // Second bin covers days 7..13 -> mean 10.0
        assert!((block.get(1, 0, 0).unwrap() - 10.0).abs() < 1e-5);
    }

    #[test]
    fn test_composite_cubic_passes_through_samples() {
        let xs = vec![0.0, 16.0, 32.0, 48.0, 64.0];
        let ys = vec![0.2, 0.4, 0.5, 0.45, 0.3];
        for (x, y) in xs.iter().zip(ys.iter()) {
            let v = catmull_rom_interpolate(&xs, &ys, *x);
            assert!((v - y).abs() < 1e-6, "at {}: {} != {}", x, v, y);
        }
        // Interior values stay within a sane band of the neighbors.
        let mid = catmull_rom_interpolate(&xs, &ys, 24.0);
        assert!(mid > 0.3 && mid < 0.6);
    }

    #[test]
    fn test_composite_gap_suppression() {
        let harmonizer = harmonizer();
        // Native composites at days 0, 16, then an outage until day 64.
        let xs = vec![0.0, 16.0, 64.0, 80.0];
        let ys = vec![0.3, 0.4, 0.5, 0.6];
        let index: Vec<f64> = (0..=80).map(|d| d as f64).collect();
        let aligned = harmonizer.align_composite(&xs, &ys, &index);

        // Inside the healthy 16-day spacing: interpolated.
        assert!(aligned[8].is_finite());
        // Across the 48-day outage: suppressed, not fabricated.
        assert!(aligned[40].is_nan());
        // Native samples themselves survive.
        assert!((aligned[16] - 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_composite_single_sample_is_nearest() {
        let harmonizer = harmonizer();
        let aligned =
            harmonizer.align_composite(&[10.0], &[0.42], &[0.0, 10.0, 50.0]);
        assert!(aligned.iter().all(|v| (*v - 0.42).abs() < 1e-6));
    }

    #[test]
    fn test_risk_surface_gets_seasonal_modulation() {
        let mut payloads = HashMap::new();
        // Static risk surface of 80%, plus a climate anchor defining the index.
        payloads.insert(
            SourceKind::RiskSurface,
            payload(
                SourceKind::RiskSurface,
                RasterBlock::new_2d("risk", vec![80.0], 1, 1, bbox()),
            ),
        );
        // Day-of-year 120 in 2024 is April 29.
        let phase_day = Utc.with_ymd_and_hms(2024, 4, 29, 0, 0, 0).unwrap();
        payloads.insert(
            SourceKind::Climate,
            payload(
                SourceKind::Climate,
                series_block(
                    "temperature",
                    &[25.0; 3],
                    vec![
                        phase_day - Duration::days(1),
                        phase_day,
                        phase_day + Duration::days(1),
                    ],
                ),
            ),
        );

        let range = TimeRange::new(phase_day - Duration::days(1), phase_day + Duration::days(1));
        let alignment = harmonizer()
            .align(&payloads, &range, Frequency::Daily)
            .unwrap();

        let risk = &alignment.sources[&SourceKind::RiskSurface][0];
        // At the phase day the multiplier is exactly 0.5.
        let modulated = risk.get(1, 0, 0).unwrap();
        assert!((modulated - 40.0).abs() < 1e-3);
    }

    #[test]
    fn test_precipitation_gaps_become_zero_without_flag() {
        let mut payloads = HashMap::new();
        let values = vec![2.0, f32::NAN, f32::NAN, 4.0, f32::NAN];
        payloads.insert(
            SourceKind::Precipitation,
            payload(
                SourceKind::Precipitation,
                series_block("precipitation", &values, (0..5).map(day).collect()),
            ),
        );

        let range = TimeRange::new(day(0), day(4));
        let alignment = harmonizer()
            .align(&payloads, &range, Frequency::Daily)
            .unwrap();

        assert!(alignment.fallbacks.is_empty());
        let block = &alignment.sources[&SourceKind::Precipitation][0];
        // Linear interpolation bridges interior gaps between valid daily
        // samples; the trailing gap (outside the valid range) is zero.
        assert!(block.get(4, 0, 0).unwrap().abs() < 1e-6);
    }

    #[test]
    fn test_all_missing_climate_pixel_flags_fallback() {
        let mut payloads = HashMap::new();
        payloads.insert(
            SourceKind::Climate,
            payload(
                SourceKind::Climate,
                series_block("temperature", &[f32::NAN; 5], (0..5).map(day).collect()),
            ),
        );

        let range = TimeRange::new(day(0), day(4));
        let alignment = harmonizer()
            .align(&payloads, &range, Frequency::Daily)
            .unwrap();

        assert_eq!(alignment.fallbacks.len(), 1);
        assert_eq!(alignment.fallbacks[0].source, "climate");
        let block = &alignment.sources[&SourceKind::Climate][0];
        assert!(block.data.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_forward_fill_for_annual_sources() {
        let mut series = vec![f32::NAN, 10.0, f32::NAN, f32::NAN, 12.0, f32::NAN];
        assert!(forward_fill(&mut series));
        assert_eq!(series, vec![10.0, 10.0, 10.0, 10.0, 12.0, 12.0]);
    }

    #[test]
    fn test_linear_fill_interior_and_edges() {
        let mut series = vec![f32::NAN, 2.0, f32::NAN, f32::NAN, 8.0, f32::NAN];
        assert!(linear_fill(&mut series));
        assert_eq!(series, vec![2.0, 2.0, 4.0, 6.0, 8.0, 8.0]);
    }

    #[test]
    fn test_climatology_fill_uses_nearby_days_of_year() {
        let index: Vec<DateTime<Utc>> = (0..10).map(day).collect();
        let mut series = vec![
            0.30, 0.32, f32::NAN, 0.34, 0.36, 0.38, 0.40, 0.42, 0.44, 0.46,
        ];
        assert!(climatology_fill(&mut series, &index, 8));
        // Mean of the valid neighbors within +-8 days of day index 2.
        let expected: f32 = (0.30 + 0.32 + 0.34 + 0.36 + 0.38 + 0.40 + 0.42 + 0.44 + 0.46) / 9.0;
        assert!((series[2] - expected).abs() < 1e-5);
    }
}
