//! Unified harmonizer: the pipeline orchestrator.
//!
//! The sole entry point consumed by external callers. Per request:
//!
//! `CHECK_CACHE -> (HIT: DONE) | (MISS: DOWNLOAD -> TEMPORAL -> SPATIAL ->
//! FEATURE -> QUALITY -> STORE_CACHE -> DONE)`
//!
//! No state is re-entered. Source downloads run concurrently with
//! exception isolation: a failed source shrinks the source set and is
//! recorded in quality metadata. Failure before STORE_CACHE propagates
//! without a partial cache write.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use tracing::{info, instrument, warn};

use harmon_cache::{CacheKey, FeatureCache};
use harmon_common::{
    BoundingBox, HarmonResult, HarmonizedResult, HarmonizerConfig, Resolution, TargetGrid,
    TimeRange,
};

use crate::features::FeatureEngineer;
use crate::quality::QualityManager;
use crate::sources::{SourceClient, SourcePayload};
use crate::spatial::SpatialHarmonizer;
use crate::temporal::TemporalHarmonizer;

/// Drives the harmonization pipeline end to end.
pub struct UnifiedHarmonizer {
    config: HarmonizerConfig,
    clients: Vec<Arc<dyn SourceClient>>,
    temporal: TemporalHarmonizer,
    spatial: SpatialHarmonizer,
    features: FeatureEngineer,
    quality: QualityManager,
    cache: Option<FeatureCache>,
}

impl UnifiedHarmonizer {
    /// Create a harmonizer with a persistent result cache at
    /// `config.cache.dir`.
    pub async fn new(
        config: HarmonizerConfig,
        clients: Vec<Arc<dyn SourceClient>>,
    ) -> HarmonResult<Self> {
        let cache = FeatureCache::open(config.cache.clone()).await?;
        Ok(Self::build(config, clients, Some(cache)))
    }

    /// Create a harmonizer without a cache (every request recomputes).
    pub fn without_cache(config: HarmonizerConfig, clients: Vec<Arc<dyn SourceClient>>) -> Self {
        Self::build(config, clients, None)
    }

    fn build(
        config: HarmonizerConfig,
        clients: Vec<Arc<dyn SourceClient>>,
        cache: Option<FeatureCache>,
    ) -> Self {
        let temporal = TemporalHarmonizer::new(config.temporal, config.seasonal);
        let features = FeatureEngineer::new(config.features.clone(), config.seasonal);
        Self {
            config,
            clients,
            temporal,
            spatial: SpatialHarmonizer::new(),
            features,
            quality: QualityManager::new(),
            cache,
        }
    }

    /// Cache statistics, when a cache is attached.
    pub async fn cache_stats(&self) -> Option<harmon_cache::CacheStats> {
        match &self.cache {
            Some(cache) => Some(cache.stats().await),
            None => None,
        }
    }

    /// Harmonize all configured sources for a region and target date.
    ///
    /// `bounds` must be within world extent, non-degenerate, and no larger
    /// than 20x20 degrees. Returns the cached result when a fresh entry
    /// exists for (region, date range, resolution).
    #[instrument(skip(self), fields(resolution = %resolution))]
    pub async fn get_harmonized_features(
        &self,
        bounds: BoundingBox,
        target_date: DateTime<Utc>,
        lookback_days: u32,
        resolution: Resolution,
    ) -> HarmonResult<HarmonizedResult> {
        let started = Instant::now();
        bounds.validate()?;
        let range = TimeRange::lookback(target_date, lookback_days);
        let key = CacheKey::new(&bounds, &range, resolution);

        if let Some(cache) = &self.cache {
            if let Some(cached) = cache.get(&key).await {
                info!(key = %key, "returning cached harmonization result");
                return Ok((*cached).clone());
            }
        }

        // Stage 1: concurrent downloads with per-source isolation.
        let (payloads, mut missing) = self.download_all(&range, &bounds).await;
        info!(
            fetched = payloads.len(),
            missing = missing.len(),
            "source downloads complete"
        );

        // Stage 2: one unified time index.
        let alignment = self
            .temporal
            .align(&payloads, &range, self.config.frequency)?;
        let covered = alignment.covered_range().unwrap_or(range);

        // Stage 3: one shared grid.
        let grid = TargetGrid::compute(bounds, resolution);
        let (resampled, failures) = self.spatial.resample_all(alignment.sources, &grid);
        for failure in failures {
            if let harmon_common::HarmonError::ResamplingFailure { source_name: source, .. } = &failure {
                missing.push(source.clone());
            }
        }

        // Stages 4-5: features and quality.
        let feature_set =
            self.features
                .derive(&resampled, target_date, lookback_days, &grid);
        let quality = self
            .quality
            .assess(&resampled, missing, alignment.fallbacks);

        let result = HarmonizedResult {
            features: feature_set.features,
            feature_names: feature_set.names,
            shape: grid.shape(),
            bounds,
            time_range: covered,
            resolution,
            quality,
            processed_at: Utc::now(),
        };

        // Stage 6: all-or-nothing cache write.
        if let Some(cache) = &self.cache {
            if let Err(e) = cache.put(&key, &result).await {
                warn!(key = %key, error = %e, "failed to store cache entry");
            }
        }

        info!(
            grid = %format!("{}x{}", grid.width, grid.height),
            features = result.feature_names.len(),
            quality = ?result.quality.category,
            missing = result.quality.missing_sources.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "harmonization complete"
        );
        Ok(result)
    }

    /// Dispatch every client concurrently; failures are isolated and
    /// reported as missing sources.
    async fn download_all(
        &self,
        range: &TimeRange,
        bounds: &BoundingBox,
    ) -> (HashMap<harmon_common::SourceKind, SourcePayload>, Vec<String>) {
        let concurrency = self.config.max_concurrent_downloads.max(1);

        let results: Vec<_> = stream::iter(self.clients.iter().cloned())
            .map(|client| async move {
                let kind = client.kind();
                (kind, client.download(range, bounds).await)
            })
            .buffer_unordered(concurrency)
            .collect()
            .await;

        let mut payloads = HashMap::new();
        let mut missing = Vec::new();
        for (kind, outcome) in results {
            match outcome {
                Ok(payload) => {
                    payloads.insert(kind, payload);
                }
                Err(e) => {
                    warn!(source = %kind, error = %e, "source unavailable, continuing without it");
                    missing.push(kind.to_string());
                }
            }
        }
        missing.sort();
        (payloads, missing)
    }
}
