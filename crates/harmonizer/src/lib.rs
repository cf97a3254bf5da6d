//! Environmental data harmonization pipeline.
//!
//! Fuses five independent geospatial sources (climate reanalysis,
//! precipitation, vegetation composites, malaria risk surfaces, population
//! rasters) into one spatially- and temporally-aligned feature set for
//! downstream risk models.
//!
//! # Architecture
//!
//! ```text
//! get_harmonized_features(bounds, date, lookback, resolution)
//!      │
//!      ├─► validate region, check cache ──► hit: return cached result
//!      │
//!      ├─► download sources concurrently (failures shrink the set)
//!      │
//!      ├─► TemporalHarmonizer  — one unified time index (intersection)
//!      ├─► SpatialHarmonizer   — one shared grid, per-kind resampling
//!      ├─► FeatureEngineer     — stats, accumulations, derived indices
//!      ├─► QualityManager      — range/missing/consistency scoring
//!      │
//!      └─► store in cache, return HarmonizedResult
//! ```
//!
//! Array-math stages are synchronous, CPU-bound, and pure; only the
//! orchestrator and the cache are async.

pub mod features;
pub mod quality;
pub mod seasonal;
pub mod service;
pub mod sources;
pub mod spatial;
pub mod temporal;
pub mod testdata;

pub use features::FeatureEngineer;
pub use quality::QualityManager;
pub use service::UnifiedHarmonizer;
pub use sources::{SourceClient, SourcePayload};
pub use spatial::SpatialHarmonizer;
pub use temporal::{TemporalAlignment, TemporalHarmonizer};

// Re-export the shared data model for convenience.
pub use harmon_common::{
    BoundingBox, Frequency, HarmonError, HarmonResult, HarmonizedResult, HarmonizerConfig,
    QualityReport, RasterBlock, Resolution, SourceKind, TargetGrid, TimeRange,
};
