//! Feature engineering: the ML-ready feature set.
//!
//! Basic statistics are extracted per source variable over the lookback
//! window, then cross-source interaction features are derived with
//! documented formulas. Every interaction output is clamped to [0, 1]
//! unless stated otherwise. A feature whose dependency array is missing is
//! silently omitted — callers check for key presence and never assume
//! completeness.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use harmon_common::{FeatureConfig, RasterBlock, SeasonalConfig, SourceKind, TargetGrid};

use crate::seasonal::seasonal_factor_at;

/// Derives the named feature set from harmonized source arrays.
pub struct FeatureEngineer {
    config: FeatureConfig,
    seasonal: SeasonalConfig,
}

/// The derived feature arrays plus their derivation order.
pub struct FeatureSet {
    pub features: BTreeMap<String, Vec<f32>>,
    pub names: Vec<String>,
}

impl FeatureEngineer {
    pub fn new(config: FeatureConfig, seasonal: SeasonalConfig) -> Self {
        Self { config, seasonal }
    }

    /// Derive all features available from the present sources.
    ///
    /// `sources` holds temporally-aligned, spatially-resampled blocks; all
    /// share the target grid geometry and the unified time index.
    pub fn derive(
        &self,
        sources: &HashMap<SourceKind, Vec<RasterBlock>>,
        target_date: DateTime<Utc>,
        lookback_days: u32,
        grid: &TargetGrid,
    ) -> FeatureSet {
        let mut out = FeatureBuilder::new(grid.len());

        // Variable name -> block, across all present sources.
        let vars: HashMap<&str, &RasterBlock> = sources
            .values()
            .flatten()
            .map(|b| (b.name.as_str(), b))
            .collect();

        // Basic window statistics for time-series variables.
        for kind in [
            SourceKind::Climate,
            SourceKind::Precipitation,
            SourceKind::Vegetation,
        ] {
            let Some(blocks) = sources.get(&kind) else {
                continue;
            };
            for block in blocks {
                let window = window_indices(block, target_date, lookback_days as i64);
                let stats = window_stats(block, &window);
                out.push(format!("{}_mean", block.name), stats.mean);
                out.push(format!("{}_min", block.name), stats.min);
                out.push(format!("{}_max", block.name), stats.max);
                out.push(format!("{}_range", block.name), stats.range);
            }
        }

        // Precipitation accumulations and dry spell.
        if let Some(precip) = vars.get("precipitation") {
            out.push(
                "precipitation_7d".to_string(),
                accumulate(precip, target_date, 7),
            );
            out.push(
                "precipitation_30d".to_string(),
                accumulate(precip, target_date, 30),
            );
            out.push(
                "dry_spell_days".to_string(),
                dry_spell(
                    precip,
                    target_date,
                    lookback_days as i64,
                    self.config.dry_day_threshold,
                ),
            );
        }

        // Vegetation trend and stress.
        if let Some(ndvi) = vars.get("ndvi") {
            out.push("ndvi_trend".to_string(), trend_slope(ndvi, target_date, 30));
            out.push(
                "ndvi_stress".to_string(),
                vegetation_stress(ndvi, target_date, self.config.vegetated_threshold),
            );
        }

        // Static surfaces: value at the target date.
        if let Some(risk) = vars.get("risk") {
            out.push("risk_surface".to_string(), value_at(risk, target_date));
        }
        if let Some(population) = vars.get("population") {
            out.push(
                "population_density".to_string(),
                value_at(population, target_date),
            );
        }

        self.derive_interactions(&mut out);

        // Meta features: constant grids.
        let seasonal = seasonal_factor_at(&target_date, &self.seasonal);
        out.push("seasonal_index".to_string(), vec![seasonal; grid.len()]);
        out.push(
            "source_count".to_string(),
            vec![sources.len() as f32; grid.len()],
        );
        out.push(
            "data_quality".to_string(),
            vec![self.config.placeholder_quality; grid.len()],
        );

        debug!(features = out.names.len(), "feature derivation complete");
        FeatureSet {
            features: out.features,
            names: out.names,
        }
    }

    /// Cross-source interaction features. Each is derived only when every
    /// dependency is present.
    fn derive_interactions(&self, out: &mut FeatureBuilder) {
        let config = &self.config;

        if let Some(temp) = out.get("temperature_mean") {
            let suitability: Vec<f32> = temp
                .iter()
                .map(|&t| temperature_suitability(t, &config.suitability_breakpoints))
                .collect();
            out.push("temperature_suitability".to_string(), suitability);
        }

        if let (Some(suit), Some(p7), Some(ndvi)) = (
            out.get("temperature_suitability"),
            out.get("precipitation_7d"),
            out.get("ndvi_mean"),
        ) {
            let [wt, wp, wv] = config.habitat_weights;
            let habitat: Vec<f32> = suit
                .iter()
                .zip(p7.iter())
                .zip(ndvi.iter())
                .map(|((&s, &p), &n)| {
                    let n = n.clamp(0.0, 1.0);
                    let value = wt * s
                        + wp * (p / config.habitat_precip_scale).tanh()
                        + wv * 4.0 * n * (1.0 - n);
                    value.clamp(0.0, 1.0)
                })
                .collect();
            out.push("breeding_habitat_index".to_string(), habitat);
        }

        // Risk surface is expressed as a percentage; unclamped count output.
        if let (Some(population), Some(risk)) =
            (out.get("population_density"), out.get("risk_surface"))
        {
            let at_risk: Vec<f32> = population
                .iter()
                .zip(risk.iter())
                .map(|(&p, &r)| p * r / 100.0)
                .collect();
            out.push("population_at_risk".to_string(), at_risk);
        }

        if let (Some(temp), Some(p30), Some(stress)) = (
            out.get("temperature_mean"),
            out.get("precipitation_30d"),
            out.get("ndvi_stress"),
        ) {
            let [wt, wp, wv] = config.stress_weights;
            let index: Vec<f32> = temp
                .iter()
                .zip(p30.iter())
                .zip(stress.iter())
                .map(|((&t, &p), &v)| {
                    let value = wt * (t - config.stress_optimal_temp).abs()
                        / config.stress_temp_scale
                        + wp * (-p / config.stress_precip_scale).exp()
                        + wv * v;
                    value.clamp(0.0, 1.0)
                })
                .collect();
            out.push("climate_stress_index".to_string(), index);
        }

        if let (Some(temp), Some(humidity)) =
            (out.get("temperature_mean"), out.get("humidity_mean"))
        {
            let potential: Vec<f32> = temp
                .iter()
                .zip(humidity.iter())
                .map(|(&t, &h)| {
                    let thermal =
                        (-(t - config.activity_optimal_temp).powi(2) / config.activity_temp_width)
                            .exp();
                    let humid = sigmoid((h - config.activity_humidity_mid)
                        / config.activity_humidity_scale);
                    (thermal * humid).clamp(0.0, 1.0)
                })
                .collect();
            out.push("vector_activity_potential".to_string(), potential);
        }
    }
}

/// Ordered feature accumulator.
struct FeatureBuilder {
    features: BTreeMap<String, Vec<f32>>,
    names: Vec<String>,
    len: usize,
}

impl FeatureBuilder {
    fn new(len: usize) -> Self {
        Self {
            features: BTreeMap::new(),
            names: Vec::new(),
            len,
        }
    }

    fn push(&mut self, name: String, values: Vec<f32>) {
        debug_assert_eq!(values.len(), self.len);
        if self.features.insert(name.clone(), values).is_none() {
            self.names.push(name);
        }
    }

    fn get(&self, name: &str) -> Option<&Vec<f32>> {
        self.features.get(name)
    }
}

/// Piecewise-linear temperature suitability in [0, 1]: zero outside the
/// outer breakpoints, ramping to a plateau between the inner ones.
fn temperature_suitability(t: f32, breakpoints: &[f32; 4]) -> f32 {
    if !t.is_finite() {
        return f32::NAN;
    }
    let [lo, plateau_lo, plateau_hi, hi] = *breakpoints;
    if t <= lo || t >= hi {
        0.0
    } else if t < plateau_lo {
        (t - lo) / (plateau_lo - lo)
    } else if t <= plateau_hi {
        1.0
    } else {
        (hi - t) / (hi - plateau_hi)
    }
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Index positions whose timestamps fall within the lookback window
/// `(target - days, target]`.
fn window_indices(block: &RasterBlock, target: DateTime<Utc>, days: i64) -> Vec<usize> {
    let start = target - Duration::days(days);
    match &block.times {
        Some(times) => times
            .iter()
            .enumerate()
            .filter(|(_, t)| **t > start && **t <= target)
            .map(|(i, _)| i)
            .collect(),
        None => vec![0],
    }
}

struct WindowStats {
    mean: Vec<f32>,
    min: Vec<f32>,
    max: Vec<f32>,
    range: Vec<f32>,
}

/// Per-pixel mean/min/max/range over the window steps, ignoring NaN.
/// Pixels with no valid sample stay NaN.
fn window_stats(block: &RasterBlock, window: &[usize]) -> WindowStats {
    let plane = block.plane_len();
    let mut mean = vec![f32::NAN; plane];
    let mut min = vec![f32::NAN; plane];
    let mut max = vec![f32::NAN; plane];
    let mut range = vec![f32::NAN; plane];

    for p in 0..plane {
        let mut sum = 0.0f64;
        let mut count = 0usize;
        let mut lo = f32::INFINITY;
        let mut hi = f32::NEG_INFINITY;
        for &t in window {
            let v = block.data[t * plane + p];
            if v.is_finite() {
                sum += v as f64;
                count += 1;
                lo = lo.min(v);
                hi = hi.max(v);
            }
        }
        if count > 0 {
            mean[p] = (sum / count as f64) as f32;
            min[p] = lo;
            max[p] = hi;
            range[p] = hi - lo;
        }
    }

    WindowStats {
        mean,
        min,
        max,
        range,
    }
}

/// Per-pixel accumulation over the trailing `days` window. NaN samples are
/// skipped; a pixel with no valid sample stays NaN.
fn accumulate(block: &RasterBlock, target: DateTime<Utc>, days: i64) -> Vec<f32> {
    let window = window_indices(block, target, days);
    let plane = block.plane_len();
    let mut out = vec![f32::NAN; plane];

    for p in 0..plane {
        let mut sum = 0.0f64;
        let mut any = false;
        for &t in &window {
            let v = block.data[t * plane + p];
            if v.is_finite() {
                sum += v as f64;
                any = true;
            }
        }
        if any {
            out[p] = sum as f32;
        }
    }
    out
}

/// Longest run of consecutive dry steps (value below `threshold`) within
/// the lookback window. NaN steps break a run without counting.
fn dry_spell(block: &RasterBlock, target: DateTime<Utc>, days: i64, threshold: f32) -> Vec<f32> {
    let window = window_indices(block, target, days);
    let plane = block.plane_len();
    let mut out = vec![f32::NAN; plane];

    for p in 0..plane {
        let mut longest = 0u32;
        let mut run = 0u32;
        let mut any = false;
        for &t in &window {
            let v = block.data[t * plane + p];
            if v.is_finite() {
                any = true;
                if v < threshold {
                    run += 1;
                    longest = longest.max(run);
                } else {
                    run = 0;
                }
            } else {
                run = 0;
            }
        }
        if any {
            out[p] = longest as f32;
        }
    }
    out
}

/// Ordinary-least-squares slope (per day) over valid samples in the
/// trailing window; 0 where fewer than 3 valid points exist.
fn trend_slope(block: &RasterBlock, target: DateTime<Utc>, days: i64) -> Vec<f32> {
    let plane = block.plane_len();
    let mut out = vec![0.0f32; plane];
    // A static block has no trend to fit.
    let Some(times) = block.times.as_deref() else {
        return out;
    };
    let window = window_indices(block, target, days);

    for p in 0..plane {
        let mut xs = Vec::with_capacity(window.len());
        let mut ys = Vec::with_capacity(window.len());
        for &t in &window {
            let v = block.data[t * plane + p];
            if v.is_finite() {
                let x = (times[t] - target).num_seconds() as f64 / 86_400.0;
                xs.push(x);
                ys.push(v as f64);
            }
        }
        if xs.len() < 3 {
            continue;
        }

        let n = xs.len() as f64;
        let mean_x = xs.iter().sum::<f64>() / n;
        let mean_y = ys.iter().sum::<f64>() / n;
        let mut cov = 0.0;
        let mut var = 0.0;
        for (x, y) in xs.iter().zip(ys.iter()) {
            cov += (x - mean_x) * (y - mean_y);
            var += (x - mean_x) * (x - mean_x);
        }
        if var > 0.0 {
            out[p] = (cov / var) as f32;
        }
    }
    out
}

/// Vegetation stress `1 - current/historical_max`, computed only where the
/// historical maximum exceeds the vegetated threshold; 0 elsewhere.
fn vegetation_stress(block: &RasterBlock, target: DateTime<Utc>, threshold: f32) -> Vec<f32> {
    let current = value_at(block, target);
    let plane = block.plane_len();
    let mut out = vec![0.0f32; plane];

    for p in 0..plane {
        let mut hist_max = f32::NEG_INFINITY;
        for t in 0..block.num_steps() {
            let v = block.data[t * plane + p];
            if v.is_finite() {
                hist_max = hist_max.max(v);
            }
        }
        if hist_max > threshold && current[p].is_finite() {
            out[p] = (1.0 - current[p] / hist_max).clamp(0.0, 1.0);
        }
    }
    out
}

/// Per-pixel value at the latest step at or before the target date (the
/// first step when the target precedes coverage).
fn value_at(block: &RasterBlock, target: DateTime<Utc>) -> Vec<f32> {
    let step = match &block.times {
        Some(times) => match times.partition_point(|t| *t <= target) {
            0 => 0,
            n => n - 1,
        },
        None => 0,
    };
    block.step(step).to_vec()
}
