//! Source kinds and their per-kind harmonization strategies.
//!
//! Every behavioral difference between the five upstream sources is resolved
//! through this table once per request: acquisition cadence, gap-fill
//! policy, spatial resampling method, and physical validity range. Pipeline
//! stages match on [`SourceKind`] instead of re-inspecting source names.

use serde::{Deserialize, Serialize};

/// The five upstream data sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Climate reanalysis (temperature, humidity). Daily, ~31 km native.
    Climate,
    /// Satellite precipitation estimates. Daily, ~10 km native.
    Precipitation,
    /// Vegetation index composites. 16-day windows, ~250 m native.
    Vegetation,
    /// Malaria risk surfaces. Annual, ~5 km native.
    RiskSurface,
    /// Population density rasters. Annual, ~100 m native.
    Population,
}

/// Native acquisition cadence of a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceCadence {
    /// One observation per day.
    Daily,
    /// Fixed multi-day composite windows.
    Composite { days: u32 },
    /// One observation per year, treated as static over a request window.
    Annual,
}

/// Gap-filling policy applied after temporal interpolation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapFillMethod {
    /// Linear interpolation between the nearest valid neighbors.
    Linear,
    /// Missing means zero (no rain observed, not unknown).
    Zero,
    /// Mean of historical same-day-of-year values.
    SeasonalClimatology,
    /// Carry the last valid observation forward.
    Forward,
}

/// Spatial resampling method, selected by source semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResamplingMethod {
    /// Smooth interpolation for continuous surfaces.
    Bilinear,
    /// Preserves exact values; no invented intermediate categories.
    Nearest,
    /// Mass-conservative aggregation for count data.
    Sum,
}

impl SourceKind {
    /// All source kinds, in canonical order.
    pub fn all() -> &'static [SourceKind] {
        &[
            SourceKind::Climate,
            SourceKind::Precipitation,
            SourceKind::Vegetation,
            SourceKind::RiskSurface,
            SourceKind::Population,
        ]
    }

    /// Stable lowercase identifier (cache keys, metadata, logs).
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Climate => "climate",
            SourceKind::Precipitation => "precipitation",
            SourceKind::Vegetation => "vegetation",
            SourceKind::RiskSurface => "risk_surface",
            SourceKind::Population => "population",
        }
    }

    /// Native acquisition cadence.
    pub fn cadence(&self) -> SourceCadence {
        match self {
            SourceKind::Climate | SourceKind::Precipitation => SourceCadence::Daily,
            SourceKind::Vegetation => SourceCadence::Composite { days: 16 },
            SourceKind::RiskSurface | SourceKind::Population => SourceCadence::Annual,
        }
    }

    /// Gap-filling policy applied after interpolation onto the unified index.
    pub fn gap_fill(&self) -> GapFillMethod {
        match self {
            SourceKind::Climate => GapFillMethod::Linear,
            SourceKind::Precipitation => GapFillMethod::Zero,
            SourceKind::Vegetation => GapFillMethod::SeasonalClimatology,
            SourceKind::RiskSurface | SourceKind::Population => GapFillMethod::Forward,
        }
    }

    /// Spatial resampling method for this source's surfaces.
    pub fn resampling(&self) -> ResamplingMethod {
        match self {
            SourceKind::Climate | SourceKind::Precipitation | SourceKind::Vegetation => {
                ResamplingMethod::Bilinear
            }
            SourceKind::RiskSurface => ResamplingMethod::Nearest,
            SourceKind::Population => ResamplingMethod::Sum,
        }
    }

    /// Physical validity range (inclusive) for the primary variable.
    ///
    /// Values outside this range count as range violations in quality
    /// scoring. Units: degC, mm/day, index, percent, persons per cell.
    pub fn valid_range(&self) -> (f32, f32) {
        match self {
            SourceKind::Climate => (-50.0, 60.0),
            SourceKind::Precipitation => (0.0, 500.0),
            SourceKind::Vegetation => (-0.2, 1.0),
            SourceKind::RiskSurface => (0.0, 100.0),
            SourceKind::Population => (0.0, 1.0e7),
        }
    }

    /// Name of the primary variable block this source contributes.
    pub fn primary_variable(&self) -> &'static str {
        match self {
            SourceKind::Climate => "temperature",
            SourceKind::Precipitation => "precipitation",
            SourceKind::Vegetation => "ndvi",
            SourceKind::RiskSurface => "risk",
            SourceKind::Population => "population",
        }
    }

    /// Whether this source represents transmission risk and receives the
    /// sinusoidal seasonal modulation when broadcast over time.
    pub fn is_transmission_risk(&self) -> bool {
        matches!(self, SourceKind::RiskSurface)
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_table() {
        assert_eq!(SourceKind::Climate.gap_fill(), GapFillMethod::Linear);
        assert_eq!(SourceKind::Precipitation.gap_fill(), GapFillMethod::Zero);
        assert_eq!(
            SourceKind::Vegetation.gap_fill(),
            GapFillMethod::SeasonalClimatology
        );
        assert_eq!(SourceKind::Population.gap_fill(), GapFillMethod::Forward);

        assert_eq!(SourceKind::Climate.resampling(), ResamplingMethod::Bilinear);
        assert_eq!(
            SourceKind::RiskSurface.resampling(),
            ResamplingMethod::Nearest
        );
        assert_eq!(SourceKind::Population.resampling(), ResamplingMethod::Sum);
    }

    #[test]
    fn test_cadence() {
        assert_eq!(SourceKind::Precipitation.cadence(), SourceCadence::Daily);
        assert_eq!(
            SourceKind::Vegetation.cadence(),
            SourceCadence::Composite { days: 16 }
        );
        assert_eq!(SourceKind::RiskSurface.cadence(), SourceCadence::Annual);
    }

    #[test]
    fn test_only_risk_is_seasonally_modulated() {
        for kind in SourceKind::all() {
            assert_eq!(
                kind.is_transmission_risk(),
                *kind == SourceKind::RiskSurface
            );
        }
    }
}
