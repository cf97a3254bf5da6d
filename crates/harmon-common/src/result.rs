//! The harmonized result and quality report data model.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::bbox::BoundingBox;
use crate::time::{Resolution, TimeRange};

/// Quality category derived from the overall score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityCategory {
    High,
    Medium,
    Low,
}

impl QualityCategory {
    /// Categorize an overall score: high >= 0.8, medium >= 0.6, else low.
    pub fn from_score(score: f64) -> Self {
        if score >= 0.8 {
            QualityCategory::High
        } else if score >= 0.6 {
            QualityCategory::Medium
        } else {
            QualityCategory::Low
        }
    }
}

/// One cross-source consistency check record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsistencyCheck {
    /// Pair label, e.g. "climate_vegetation".
    pub name: String,
    /// Pearson correlation over NaN-stripped paired samples.
    pub correlation: f64,
    /// Expected correlation interval.
    pub expected: (f64, f64),
    /// Number of valid paired samples the check ran on.
    pub samples: usize,
    pub passed: bool,
}

/// A recorded gap-fill fallback.
///
/// Emitted when a source's configured gap-fill policy could not be applied
/// (e.g. insufficient history for climatology) and zero-fill was used
/// instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GapFillFlag {
    pub source: String,
    pub variable: String,
    pub reason: String,
}

/// Quality metrics for one harmonized result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    /// Product of per-source scores, consistency penalty, and completeness.
    pub overall: f64,
    pub category: QualityCategory,
    /// Per-source score in [0, 1].
    pub per_source: BTreeMap<String, f64>,
    pub consistency: Vec<ConsistencyCheck>,
    /// Minimum per-source valid-pixel ratio.
    pub completeness: f64,
    /// Sources requested but absent from the result.
    pub missing_sources: Vec<String>,
    /// Gap-fill fallbacks recorded during temporal harmonization.
    pub gap_fill_fallbacks: Vec<GapFillFlag>,
}

impl QualityReport {
    /// Report for a result with no usable sources.
    pub fn empty(missing: Vec<String>) -> Self {
        Self {
            overall: 0.0,
            category: QualityCategory::Low,
            per_source: BTreeMap::new(),
            consistency: Vec::new(),
            completeness: 0.0,
            missing_sources: missing,
            gap_fill_fallbacks: Vec::new(),
        }
    }
}

/// The pipeline's output: named feature arrays on one shared grid.
///
/// Invariant: every array in `features` has length `shape.0 * shape.1`.
/// Immutable after creation; optionally persisted to the cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarmonizedResult {
    /// Feature name -> flat row-major array on the target grid.
    ///
    /// JSON writes NaN as null; deserialization maps null back to NaN so
    /// missing pixels survive a cache round trip.
    #[serde(deserialize_with = "nullable_arrays")]
    pub features: BTreeMap<String, Vec<f32>>,
    /// Feature names in derivation order.
    pub feature_names: Vec<String>,
    /// Grid shape as (height, width).
    pub shape: (usize, usize),
    pub bounds: BoundingBox,
    /// Temporal range actually covered (the unified-index intersection).
    pub time_range: TimeRange,
    pub resolution: Resolution,
    pub quality: QualityReport,
    pub processed_at: DateTime<Utc>,
}

impl HarmonizedResult {
    /// Check the shape invariant across all feature arrays.
    pub fn shapes_consistent(&self) -> bool {
        let expected = self.shape.0 * self.shape.1;
        self.features.values().all(|a| a.len() == expected)
    }

    /// Look up a feature array by name.
    pub fn feature(&self, name: &str) -> Option<&[f32]> {
        self.features.get(name).map(Vec::as_slice)
    }
}

fn nullable_arrays<'de, D>(deserializer: D) -> Result<BTreeMap<String, Vec<f32>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw: BTreeMap<String, Vec<Option<f32>>> = serde::Deserialize::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|(name, values)| {
            let values = values
                .into_iter()
                .map(|v| v.unwrap_or(f32::NAN))
                .collect();
            (name, values)
        })
        .collect())
}
