//! Shared types for the environmental data harmonization pipeline.
//!
//! This crate holds the leaf data model used across the workspace:
//! bounding boxes, georeferenced raster blocks, source kinds with their
//! per-kind harmonization strategies, time ranges, the error taxonomy,
//! pipeline configuration, and the harmonized result format.

pub mod bbox;
pub mod config;
pub mod error;
pub mod raster;
pub mod result;
pub mod source;
pub mod time;

pub use bbox::BoundingBox;
pub use config::{CacheConfig, FeatureConfig, HarmonizerConfig, SeasonalConfig, TemporalConfig};
pub use error::{HarmonError, HarmonResult};
pub use raster::{GridTransform, RasterBlock, TargetGrid};
pub use result::{ConsistencyCheck, GapFillFlag, HarmonizedResult, QualityCategory, QualityReport};
pub use source::{GapFillMethod, ResamplingMethod, SourceCadence, SourceKind};
pub use time::{Frequency, Resolution, TimeRange};
