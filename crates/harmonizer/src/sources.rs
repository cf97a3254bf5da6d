//! Source client boundary.
//!
//! The five download/validation clients are external collaborators; the
//! pipeline consumes them through [`SourceClient`]. A client returns either
//! a payload or an error — it never panics across this boundary, and the
//! orchestrator isolates per-source failures so one unavailable source
//! only shrinks the final source set.

use async_trait::async_trait;

use harmon_common::{BoundingBox, HarmonResult, RasterBlock, SourceKind, TimeRange};

/// One source's contribution to a harmonization request.
///
/// Created from a client's download output, consumed by the feature
/// engineer, and discarded — only the final result is cached.
#[derive(Debug, Clone)]
pub struct SourcePayload {
    pub kind: SourceKind,
    /// One or more variable blocks; e.g. climate contributes both
    /// `temperature` and `humidity`.
    pub blocks: Vec<RasterBlock>,
    /// Native resolution in meters, as reported by the source.
    pub native_resolution_m: f64,
}

impl SourcePayload {
    pub fn new(kind: SourceKind, blocks: Vec<RasterBlock>, native_resolution_m: f64) -> Self {
        Self {
            kind,
            blocks,
            native_resolution_m,
        }
    }

    /// The block carrying this source's primary variable, if present.
    pub fn primary_block(&self) -> Option<&RasterBlock> {
        let name = self.kind.primary_variable();
        self.blocks.iter().find(|b| b.name == name)
    }
}

/// Download client for one upstream source.
#[async_trait]
pub trait SourceClient: Send + Sync {
    /// Which source this client serves.
    fn kind(&self) -> SourceKind;

    /// Fetch this source's data for a time range and region.
    ///
    /// Implementations return `Err` for any failure (network, validation,
    /// no coverage); they must not panic. The payload's blocks carry their
    /// own bounds and transform, which need not match the request grid —
    /// spatial harmonization happens downstream.
    async fn download(
        &self,
        range: &TimeRange,
        bounds: &BoundingBox,
    ) -> HarmonResult<SourcePayload>;
}
