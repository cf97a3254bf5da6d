//! Disk-backed feature cache with an in-memory LRU front.

use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use lru::LruCache;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use harmon_common::{CacheConfig, HarmonError, HarmonResult, HarmonizedResult};

use crate::key::CacheKey;

/// On-disk entry envelope: the result plus its creation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    created: DateTime<Utc>,
    result: HarmonizedResult,
}

/// Cache statistics.
#[derive(Debug, Default, Clone)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub stores: u64,
    pub expirations: u64,
    pub corruptions: u64,
}

impl CacheStats {
    /// Hit rate in [0, 1].
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Persistent cache for harmonized results.
///
/// Writes are all-or-nothing: the entry is serialized to a temp file in the
/// cache directory and renamed into place, so concurrent readers see either
/// the previous entry or the complete new one. A deserialization failure at
/// read time is treated as a miss (the caller recomputes and the store
/// overwrites the corrupt file).
pub struct FeatureCache {
    dir: PathBuf,
    config: CacheConfig,
    memory: RwLock<LruCache<String, (DateTime<Utc>, Arc<HarmonizedResult>)>>,
    stats: RwLock<CacheStats>,
}

impl FeatureCache {
    /// Open (and create if needed) a cache rooted at `config.dir`.
    pub async fn open(config: CacheConfig) -> HarmonResult<Self> {
        fs::create_dir_all(&config.dir).await?;
        let capacity =
            NonZeroUsize::new(config.memory_entries.max(1)).expect("capacity is at least 1");
        Ok(Self {
            dir: config.dir.clone(),
            config,
            memory: RwLock::new(LruCache::new(capacity)),
            stats: RwLock::new(CacheStats::default()),
        })
    }

    /// Look up a fresh entry for `key`.
    ///
    /// Returns None on miss, staleness, or corruption; stale disk entries
    /// are removed at read time.
    pub async fn get(&self, key: &CacheKey) -> Option<Arc<HarmonizedResult>> {
        let filename = key.filename();

        if let Some(result) = self.get_memory(&filename).await {
            self.stats.write().await.hits += 1;
            debug!(key = %key, "cache hit (memory)");
            return Some(result);
        }

        match self.read_entry(key).await {
            Ok(Some(entry)) => {
                let result = Arc::new(entry.result);
                self.memory
                    .write()
                    .await
                    .put(filename, (entry.created, Arc::clone(&result)));
                self.stats.write().await.hits += 1;
                debug!(key = %key, "cache hit (disk)");
                Some(result)
            }
            Ok(None) => {
                self.stats.write().await.misses += 1;
                None
            }
            Err(HarmonError::CacheCorruption { key, message }) => {
                warn!(key = %key, error = %message, "corrupt cache entry, treating as miss");
                let mut stats = self.stats.write().await;
                stats.corruptions += 1;
                stats.misses += 1;
                None
            }
            Err(e) => {
                warn!(key = %key, error = %e, "cache read failed, treating as miss");
                self.stats.write().await.misses += 1;
                None
            }
        }
    }

    /// Store a completed result under `key`, overwriting any prior entry.
    pub async fn put(&self, key: &CacheKey, result: &HarmonizedResult) -> HarmonResult<()> {
        let created = Utc::now();
        let entry = CacheEntry {
            created,
            result: result.clone(),
        };
        let json = serde_json::to_vec(&entry)?;

        let filename = key.filename();
        let final_path = self.dir.join(&filename);
        let temp_path = self.dir.join(format!("{}.partial", filename));

        fs::write(&temp_path, &json).await?;
        if fs::rename(&temp_path, &final_path).await.is_err() {
            // rename failed (likely cross-device), fall back to copy+delete
            fs::copy(&temp_path, &final_path).await?;
            fs::remove_file(&temp_path).await?;
        }

        self.memory
            .write()
            .await
            .put(filename, (created, Arc::new(result.clone())));
        self.stats.write().await.stores += 1;
        debug!(key = %key, bytes = json.len(), "cache entry stored");
        Ok(())
    }

    /// Remove the entry for `key`, if present.
    pub async fn evict(&self, key: &CacheKey) -> HarmonResult<()> {
        let filename = key.filename();
        self.memory.write().await.pop(&filename);
        let path = self.dir.join(&filename);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Remove every entry.
    pub async fn clear(&self) -> HarmonResult<()> {
        self.memory.write().await.clear();
        let mut dir = fs::read_dir(&self.dir).await?;
        while let Some(item) = dir.next_entry().await? {
            let is_entry = item
                .path()
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e == "json")
                .unwrap_or(false);
            if is_entry {
                fs::remove_file(item.path()).await?;
            }
        }
        Ok(())
    }

    /// Current statistics snapshot.
    pub async fn stats(&self) -> CacheStats {
        self.stats.read().await.clone()
    }

    async fn get_memory(&self, filename: &str) -> Option<Arc<HarmonizedResult>> {
        let mut memory = self.memory.write().await;
        let (created, result) = memory.get(filename)?;
        if self.is_fresh(*created, result) {
            Some(Arc::clone(result))
        } else {
            memory.pop(filename);
            None
        }
    }

    async fn read_entry(&self, key: &CacheKey) -> HarmonResult<Option<CacheEntry>> {
        let path = self.dir.join(key.filename());
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let entry: CacheEntry =
            serde_json::from_slice(&bytes).map_err(|e| HarmonError::CacheCorruption {
                key: key.to_string(),
                message: e.to_string(),
            })?;

        if !self.is_fresh(entry.created, &entry.result) {
            debug!(key = %key, created = %entry.created, "cache entry expired");
            self.stats.write().await.expirations += 1;
            fs::remove_file(&path).await.ok();
            return Ok(None);
        }
        Ok(Some(entry))
    }

    /// Freshness rule: 6 h for ranges ending within the last 7 days
    /// (near-real-time upstream data), 24 h for historical ranges.
    fn is_fresh(&self, created: DateTime<Utc>, result: &HarmonizedResult) -> bool {
        let now = Utc::now();
        let near_real_time =
            now - result.time_range.end <= Duration::days(self.config.recent_window_days);
        let max_age_secs = if near_real_time {
            self.config.max_age_recent_secs
        } else {
            self.config.max_age_historical_secs
        };
        now - created < Duration::seconds(max_age_secs as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use harmon_common::{BoundingBox, QualityReport, Resolution, TimeRange};
    use std::collections::BTreeMap;

    fn sample_result(end: DateTime<Utc>) -> HarmonizedResult {
        let mut features = BTreeMap::new();
        features.insert("temperature_mean".to_string(), vec![24.0; 4]);
        HarmonizedResult {
            features,
            feature_names: vec!["temperature_mean".into()],
            shape: (2, 2),
            bounds: BoundingBox::new(30.0, -2.0, 32.0, 0.0),
            time_range: TimeRange::new(end - Duration::days(90), end),
            resolution: Resolution::Km10,
            quality: QualityReport::empty(vec![]),
            processed_at: end,
        }
    }

    fn key_for(result: &HarmonizedResult) -> CacheKey {
        CacheKey::new(&result.bounds, &result.time_range, result.resolution)
    }

    fn test_config(dir: &std::path::Path) -> CacheConfig {
        CacheConfig {
            dir: dir.to_path_buf(),
            ..CacheConfig::default()
        }
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = FeatureCache::open(test_config(tmp.path())).await.unwrap();

        let result = sample_result(Utc::now());
        let key = key_for(&result);

        assert!(cache.get(&key).await.is_none());
        cache.put(&key, &result).await.unwrap();

        let cached = cache.get(&key).await.expect("entry present");
        assert_eq!(*cached, result);

        let stats = cache.stats().await;
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.stores, 1);
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_a_miss() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = FeatureCache::open(test_config(tmp.path())).await.unwrap();

        let result = sample_result(Utc::now());
        let key = key_for(&result);

        std::fs::write(tmp.path().join(key.filename()), b"{ not json").unwrap();
        assert!(cache.get(&key).await.is_none());
        assert_eq!(cache.stats().await.corruptions, 1);

        // A store overwrites the corrupt file and the entry becomes readable.
        cache.put(&key, &result).await.unwrap();
        assert!(cache.get(&key).await.is_some());
    }

    #[tokio::test]
    async fn test_stale_entry_expires_at_read() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = test_config(tmp.path());
        config.max_age_recent_secs = 0;
        config.max_age_historical_secs = 0;
        let cache = FeatureCache::open(config).await.unwrap();

        let result = sample_result(Utc::now());
        let key = key_for(&result);
        cache.put(&key, &result).await.unwrap();

        assert!(cache.get(&key).await.is_none());
        assert_eq!(cache.stats().await.expirations, 1);
        // The stale file was removed at read time.
        assert!(!tmp.path().join(key.filename()).exists());
    }

    #[tokio::test]
    async fn test_historical_window_applies_to_old_ranges() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = test_config(tmp.path());
        // Near-real-time entries expire immediately; historical ones don't.
        config.max_age_recent_secs = 0;
        config.max_age_historical_secs = 24 * 3600;
        let cache = FeatureCache::open(config).await.unwrap();

        let historical_end = Utc.with_ymd_and_hms(2020, 6, 1, 0, 0, 0).unwrap();
        let result = sample_result(historical_end);
        let key = key_for(&result);
        cache.put(&key, &result).await.unwrap();
        assert!(cache.get(&key).await.is_some());

        let recent = sample_result(Utc::now());
        let recent_key = key_for(&recent);
        cache.put(&recent_key, &recent).await.unwrap();
        assert!(cache.get(&recent_key).await.is_none());
    }

    #[tokio::test]
    async fn test_evict_and_clear() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = FeatureCache::open(test_config(tmp.path())).await.unwrap();

        let result = sample_result(Utc::now());
        let key = key_for(&result);
        cache.put(&key, &result).await.unwrap();

        cache.evict(&key).await.unwrap();
        assert!(cache.get(&key).await.is_none());

        cache.put(&key, &result).await.unwrap();
        cache.clear().await.unwrap();
        assert!(cache.get(&key).await.is_none());
    }

    #[tokio::test]
    async fn test_no_partial_files_left_behind() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = FeatureCache::open(test_config(tmp.path())).await.unwrap();

        let result = sample_result(Utc::now());
        let key = key_for(&result);
        cache.put(&key, &result).await.unwrap();

        let partials: Vec<_> = std::fs::read_dir(tmp.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().to_string_lossy().ends_with(".partial"))
            .collect();
        assert!(partials.is_empty());
    }
}
