//! Pipeline configuration.
//!
//! One explicit configuration struct is passed into each component's
//! constructor; there is no process-wide settings object. The seasonal
//! modulation parameters and interaction-feature coefficients are plain
//! fields with spec defaults — they are uncalibrated modeling choices, not
//! physical constants, and callers may override any of them.

use serde::{Deserialize, Serialize};
use std::env;

use crate::time::Frequency;

/// Sinusoidal seasonal modulation parameters.
///
/// The factor is `offset + amplitude * sin(2*pi * (doy - phase_day) / period_days)`,
/// which stays within [0, 1] for the default half/half split. The default
/// phase puts the transmission peak ~3 months after day 120, mimicking a
/// post-rainy-season peak.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeasonalConfig {
    pub period_days: f64,
    pub phase_day: f64,
    pub amplitude: f64,
    pub offset: f64,
}

impl Default for SeasonalConfig {
    fn default() -> Self {
        Self {
            period_days: 365.0,
            phase_day: 120.0,
            amplitude: 0.5,
            offset: 0.5,
        }
    }
}

/// Coefficients for derived interaction features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureConfig {
    /// Temperature suitability breakpoints in degC: ramp start, plateau
    /// start, plateau end, ramp end.
    pub suitability_breakpoints: [f32; 4],
    /// Breeding habitat index weights: temperature, precipitation, ndvi.
    pub habitat_weights: [f32; 3],
    /// 7-day precipitation scale (mm) inside the tanh term.
    pub habitat_precip_scale: f32,
    /// Climate stress weights: temperature, precipitation, vegetation.
    pub stress_weights: [f32; 3],
    /// Optimal temperature (degC) and deviation scale for climate stress.
    pub stress_optimal_temp: f32,
    pub stress_temp_scale: f32,
    /// 30-day precipitation e-folding scale (mm) for drought stress.
    pub stress_precip_scale: f32,
    /// Vector activity temperature optimum (degC) and Gaussian width.
    pub activity_optimal_temp: f32,
    pub activity_temp_width: f32,
    /// Humidity sigmoid midpoint (%) and steepness divisor.
    pub activity_humidity_mid: f32,
    pub activity_humidity_scale: f32,
    /// Daily precipitation below this is a dry day (mm).
    pub dry_day_threshold: f32,
    /// NDVI above this counts as vegetated for the stress indicator.
    pub vegetated_threshold: f32,
    /// Placeholder overall-quality meta-feature value; the real score is
    /// computed by the quality manager.
    pub placeholder_quality: f32,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            suitability_breakpoints: [15.0, 25.0, 30.0, 40.0],
            habitat_weights: [0.4, 0.4, 0.2],
            habitat_precip_scale: 50.0,
            stress_weights: [0.4, 0.4, 0.2],
            stress_optimal_temp: 27.5,
            stress_temp_scale: 15.0,
            stress_precip_scale: 25.0,
            activity_optimal_temp: 27.0,
            activity_temp_width: 50.0,
            activity_humidity_mid: 60.0,
            activity_humidity_scale: 10.0,
            dry_day_threshold: 1.0,
            vegetated_threshold: 0.1,
            placeholder_quality: 0.8,
        }
    }
}

/// Result cache configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Directory for persisted entries.
    pub dir: std::path::PathBuf,
    /// Freshness window for ranges ending within `recent_window_days`.
    pub max_age_recent_secs: u64,
    /// Freshness window for historical ranges.
    pub max_age_historical_secs: u64,
    /// A range ending within this many days of now counts as near-real-time.
    pub recent_window_days: i64,
    /// Capacity of the in-memory LRU front.
    pub memory_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: std::path::PathBuf::from("/tmp/harmonizer-cache"),
            max_age_recent_secs: 6 * 3600,
            max_age_historical_secs: 24 * 3600,
            recent_window_days: 7,
            memory_entries: 32,
        }
    }
}

/// Top-level pipeline configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarmonizerConfig {
    pub seasonal: SeasonalConfig,
    pub features: FeatureConfig,
    pub cache: CacheConfig,
    pub temporal: TemporalConfig,
    /// Target frequency of the unified time index.
    pub frequency: Frequency,
    /// Maximum source downloads in flight at once.
    pub max_concurrent_downloads: usize,
}

/// Temporal harmonization tunables.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TemporalConfig {
    /// Native gaps longer than this (days) suppress composite
    /// interpolation instead of fabricating data across an outage.
    pub max_interpolation_gap_days: i64,
    /// Half-width (days) of the same-day-of-year climatology window.
    pub climatology_window_days: i64,
}

impl Default for TemporalConfig {
    fn default() -> Self {
        Self {
            max_interpolation_gap_days: 16,
            climatology_window_days: 8,
        }
    }
}

impl HarmonizerConfig {
    /// Configuration with environment-variable overrides.
    ///
    /// `HARMONIZER_CACHE_DIR` and `HARMONIZER_MAX_DOWNLOADS` are read when
    /// present; everything else keeps its default.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(dir) = env::var("HARMONIZER_CACHE_DIR") {
            config.cache.dir = std::path::PathBuf::from(dir);
        }
        if let Ok(n) = env::var("HARMONIZER_MAX_DOWNLOADS") {
            if let Ok(n) = n.parse() {
                config.max_concurrent_downloads = n;
            }
        }
        config
    }
}

impl Default for HarmonizerConfig {
    fn default() -> Self {
        Self {
            seasonal: SeasonalConfig::default(),
            features: FeatureConfig::default(),
            cache: CacheConfig::default(),
            temporal: TemporalConfig::default(),
            frequency: Frequency::default(),
            max_concurrent_downloads: 5,
        }
    }
}
