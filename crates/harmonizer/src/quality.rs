//! Cross-source quality scoring.
//!
//! Each source is scored for physical-range violations and missingness;
//! cross-source agreement is checked with Pearson correlation on
//! NaN-stripped pairs; completeness is the minimum per-source valid ratio
//! (conservative: one poor source caps the report). The overall score is
//! the product of all three terms.

use std::collections::HashMap;

use tracing::debug;

use harmon_common::{
    GapFillFlag, QualityCategory, QualityReport, RasterBlock, SourceKind,
};

/// Correlation expected between source pairs that physically co-vary.
const CONSISTENCY_PAIRS: [(SourceKind, SourceKind, (f64, f64)); 3] = [
    (SourceKind::Climate, SourceKind::Vegetation, (0.2, 0.8)),
    (SourceKind::Precipitation, SourceKind::Vegetation, (0.1, 0.7)),
    (SourceKind::Population, SourceKind::RiskSurface, (-0.3, 0.5)),
];

/// Minimum valid paired samples for a consistency check to execute.
const MIN_PAIRED_SAMPLES: usize = 100;

/// Penalty multiplier applied when any executed consistency check fails.
const CONSISTENCY_PENALTY: f64 = 0.8;

/// Scores harmonized source arrays and the ensemble.
pub struct QualityManager;

impl QualityManager {
    pub fn new() -> Self {
        Self
    }

    /// Produce the quality report for a set of harmonized sources.
    ///
    /// `missing_sources` lists sources that were requested but dropped
    /// (download or resampling failure); `fallbacks` carries gap-fill
    /// flags from temporal harmonization.
    pub fn assess(
        &self,
        sources: &HashMap<SourceKind, Vec<RasterBlock>>,
        missing_sources: Vec<String>,
        fallbacks: Vec<GapFillFlag>,
    ) -> QualityReport {
        if sources.is_empty() {
            return QualityReport::empty(missing_sources);
        }

        let mut per_source = std::collections::BTreeMap::new();
        let mut completeness = f64::INFINITY;

        for (kind, blocks) in sources {
            let Some(primary) = blocks.iter().find(|b| b.name == kind.primary_variable())
            else {
                continue;
            };
            let score = source_score(*kind, primary);
            let valid = primary.valid_ratio();
            completeness = completeness.min(valid);
            per_source.insert(kind.to_string(), score);
        }
        if !completeness.is_finite() {
            completeness = 0.0;
        }

        let consistency = self.run_consistency_checks(sources);
        let any_failed = consistency.iter().any(|c| !c.passed);

        let mut overall: f64 = per_source.values().product();
        if any_failed {
            overall *= CONSISTENCY_PENALTY;
        }
        overall *= completeness;
        overall = overall.clamp(0.0, 1.0);

        let category = QualityCategory::from_score(overall);
        debug!(
            overall = overall,
            category = ?category,
            completeness = completeness,
            checks = consistency.len(),
            "quality assessment complete"
        );

        QualityReport {
            overall,
            category,
            per_source,
            consistency,
            completeness,
            missing_sources,
            gap_fill_fallbacks: fallbacks,
        }
    }

    /// Execute the pairwise consistency checks whose sources are present
    /// and have enough valid paired samples.
    fn run_consistency_checks(
        &self,
        sources: &HashMap<SourceKind, Vec<RasterBlock>>,
    ) -> Vec<harmon_common::ConsistencyCheck> {
        let mut checks = Vec::new();

        for (a, b, expected) in CONSISTENCY_PAIRS {
            let (Some(block_a), Some(block_b)) = (primary_of(sources, a), primary_of(sources, b))
            else {
                continue;
            };

            let n = block_a.data.len().min(block_b.data.len());
            let mut xs = Vec::new();
            let mut ys = Vec::new();
            for i in 0..n {
                let x = block_a.data[i];
                let y = block_b.data[i];
                if x.is_finite() && y.is_finite() {
                    xs.push(x as f64);
                    ys.push(y as f64);
                }
            }

            if xs.len() < MIN_PAIRED_SAMPLES {
                debug!(
                    pair = %format!("{}_{}", a, b),
                    samples = xs.len(),
                    "too few paired samples, consistency check skipped"
                );
                continue;
            }

            let Some(r) = pearson(&xs, &ys) else {
                continue;
            };

            checks.push(harmon_common::ConsistencyCheck {
                name: format!("{}_{}", a, b),
                correlation: r,
                expected,
                samples: xs.len(),
                passed: r >= expected.0 && r <= expected.1,
            });
        }
        checks
    }
}

impl Default for QualityManager {
    fn default() -> Self {
        Self::new()
    }
}

fn primary_of<'a>(
    sources: &'a HashMap<SourceKind, Vec<RasterBlock>>,
    kind: SourceKind,
) -> Option<&'a RasterBlock> {
    sources
        .get(&kind)?
        .iter()
        .find(|b| b.name == kind.primary_variable())
}

/// Per-source score: 1.0 multiplied down by the valid fraction and by the
/// fraction of in-range pixels.
fn source_score(kind: SourceKind, block: &RasterBlock) -> f64 {
    let (lo, hi) = kind.valid_range();

    let mut finite = 0usize;
    let mut violations = 0usize;
    for &v in &block.data {
        if v.is_finite() {
            finite += 1;
            if v < lo || v > hi {
                violations += 1;
            }
        }
    }

    if block.data.is_empty() {
        return 0.0;
    }

    let missing_frac = 1.0 - finite as f64 / block.data.len() as f64;
    let violation_frac = if finite > 0 {
        violations as f64 / finite as f64
    } else {
        // Entirely missing: the missing term already zeroes the score.
        0.0
    };

    (1.0 - violation_frac) * (1.0 - missing_frac)
}

/// Pearson correlation; None when either side has zero variance.
fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    let n = xs.len() as f64;
    let mean_x = xs.iter().sum::<f64>() / n;
    let mean_y = ys.iter().sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (x, y) in xs.iter().zip(ys.iter()) {
        cov += (x - mean_x) * (y - mean_y);
        var_x += (x - mean_x) * (x - mean_x);
        var_y += (y - mean_y) * (y - mean_y);
    }

    if var_x <= 0.0 || var_y <= 0.0 {
        return None;
    }
    Some(cov / (var_x.sqrt() * var_y.sqrt()))
}
