//! End-to-end pipeline tests against synthetic source clients.

use std::sync::Arc;

use chrono::{TimeZone, Utc};

use harmonizer::testdata::SyntheticClient;
use harmonizer::{
    BoundingBox, HarmonError, HarmonizerConfig, Resolution, SourceKind, UnifiedHarmonizer,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("harmonizer=debug,harmon_cache=debug")
        .with_test_writer()
        .try_init();
}

fn region() -> BoundingBox {
    BoundingBox::new(32.0, -3.0, 34.0, -1.0)
}

fn target_date() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
}

fn full_fleet() -> Vec<Arc<SyntheticClient>> {
    SourceKind::all()
        .iter()
        .map(|kind| Arc::new(SyntheticClient::new(*kind)))
        .collect()
}

fn as_dyn(clients: &[Arc<SyntheticClient>]) -> Vec<Arc<dyn harmonizer::SourceClient>> {
    clients
        .iter()
        .map(|c| Arc::clone(c) as Arc<dyn harmonizer::SourceClient>)
        .collect()
}

#[tokio::test]
async fn test_every_feature_array_matches_the_target_grid_shape() {
    init_tracing();
    let clients = full_fleet();
    let harmonizer = UnifiedHarmonizer::without_cache(HarmonizerConfig::default(), as_dyn(&clients));

    let result = harmonizer
        .get_harmonized_features(region(), target_date(), 90, Resolution::Km10)
        .await
        .unwrap();

    assert!(result.shapes_consistent());
    let expected = result.shape.0 * result.shape.1;
    assert!(expected > 0);
    for name in &result.feature_names {
        assert_eq!(result.feature(name).unwrap().len(), expected, "{}", name);
    }
}

#[tokio::test]
async fn test_full_fleet_produces_cross_source_features() {
    init_tracing();
    let clients = full_fleet();
    let harmonizer = UnifiedHarmonizer::without_cache(HarmonizerConfig::default(), as_dyn(&clients));

    let result = harmonizer
        .get_harmonized_features(region(), target_date(), 90, Resolution::Km10)
        .await
        .unwrap();

    for name in [
        "temperature_mean",
        "humidity_mean",
        "precipitation_7d",
        "precipitation_30d",
        "dry_spell_days",
        "ndvi_trend",
        "ndvi_stress",
        "risk_surface",
        "population_density",
        "temperature_suitability",
        "breeding_habitat_index",
        "population_at_risk",
        "climate_stress_index",
        "vector_activity_potential",
        "seasonal_index",
        "source_count",
        "data_quality",
    ] {
        assert!(
            result.features.contains_key(name),
            "feature {} missing from full-fleet result",
            name
        );
    }

    assert!(result.quality.missing_sources.is_empty());
    assert_eq!(result.features["source_count"][0], 5.0);

    // Derived index invariants hold across the whole grid.
    for name in [
        "temperature_suitability",
        "breeding_habitat_index",
        "climate_stress_index",
        "vector_activity_potential",
    ] {
        for v in result.feature(name).unwrap().iter().filter(|v| v.is_finite()) {
            assert!((0.0..=1.0).contains(v), "{} out of range: {}", name, v);
        }
    }
}

#[tokio::test]
async fn test_unified_index_never_exceeds_source_coverage() {
    init_tracing();
    let clients = full_fleet();
    let harmonizer = UnifiedHarmonizer::without_cache(HarmonizerConfig::default(), as_dyn(&clients));

    let result = harmonizer
        .get_harmonized_features(region(), target_date(), 90, Resolution::Km10)
        .await
        .unwrap();

    // Synthetic sources cover exactly the requested lookback window, so
    // the covered range must sit inside it.
    let requested_start = target_date() - chrono::Duration::days(90);
    assert!(result.time_range.start >= requested_start);
    assert!(result.time_range.end <= target_date());
}

#[tokio::test]
async fn test_four_of_five_sources_still_produce_a_result() {
    init_tracing();
    let clients = vec![
        Arc::new(SyntheticClient::new(SourceKind::Climate)),
        Arc::new(SyntheticClient::new(SourceKind::Precipitation)),
        Arc::new(SyntheticClient::failing(SourceKind::Vegetation)),
        Arc::new(SyntheticClient::new(SourceKind::RiskSurface)),
        Arc::new(SyntheticClient::new(SourceKind::Population)),
    ];
    let harmonizer =
        UnifiedHarmonizer::without_cache(HarmonizerConfig::default(), as_dyn(&clients));

    let result = harmonizer
        .get_harmonized_features(region(), target_date(), 90, Resolution::Km10)
        .await
        .expect("degraded request still succeeds");

    // The missing source is recorded in quality metadata.
    assert_eq!(
        result.quality.missing_sources,
        vec!["vegetation".to_string()]
    );

    // Features solely dependent on vegetation are omitted, not zero-filled.
    for name in [
        "ndvi_mean",
        "ndvi_trend",
        "ndvi_stress",
        "breeding_habitat_index",
        "climate_stress_index",
    ] {
        assert!(
            !result.features.contains_key(name),
            "{} should be absent without vegetation",
            name
        );
    }

    // Features from the surviving sources are present.
    assert!(result.features.contains_key("temperature_mean"));
    assert!(result.features.contains_key("population_at_risk"));
    assert_eq!(result.features["source_count"][0], 4.0);
}

#[tokio::test]
async fn test_cached_request_is_idempotent_and_skips_downloads() -> anyhow::Result<()> {
    init_tracing();
    let tmp = tempfile::tempdir()?;
    let mut config = HarmonizerConfig::default();
    config.cache.dir = tmp.path().to_path_buf();

    let clients = full_fleet();
    let harmonizer = UnifiedHarmonizer::new(config, as_dyn(&clients)).await?;

    let first = harmonizer
        .get_harmonized_features(region(), target_date(), 90, Resolution::Km10)
        .await?;
    let downloads_after_first: usize = clients.iter().map(|c| c.call_count()).sum();
    assert_eq!(downloads_after_first, 5);

    let second = harmonizer
        .get_harmonized_features(region(), target_date(), 90, Resolution::Km10)
        .await?;

    // Bit-identical result, no second download.
    assert_eq!(first, second);
    let downloads_after_second: usize = clients.iter().map(|c| c.call_count()).sum();
    assert_eq!(downloads_after_second, 5);

    let stats = harmonizer.cache_stats().await.expect("cache attached");
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 1);
    Ok(())
}

#[tokio::test]
async fn test_disjoint_coverage_is_a_hard_failure() {
    init_tracing();
    let clients: Vec<Arc<dyn harmonizer::SourceClient>> = vec![
        Arc::new(SyntheticClient::new(SourceKind::Precipitation)),
        // Climate data shifted well past the requested window.
        Arc::new(SyntheticClient::with_shift(SourceKind::Climate, 200)),
    ];
    let harmonizer = UnifiedHarmonizer::without_cache(HarmonizerConfig::default(), clients);

    let err = harmonizer
        .get_harmonized_features(region(), target_date(), 90, Resolution::Km10)
        .await
        .unwrap_err();
    assert!(matches!(err, HarmonError::InsufficientTemporalOverlap(_)));
}

#[tokio::test]
async fn test_invalid_region_is_rejected_before_any_download() {
    init_tracing();
    let clients = full_fleet();
    let harmonizer = UnifiedHarmonizer::without_cache(HarmonizerConfig::default(), as_dyn(&clients));

    // Oversized region.
    let err = harmonizer
        .get_harmonized_features(
            BoundingBox::new(0.0, 0.0, 25.0, 25.0),
            target_date(),
            90,
            Resolution::Km10,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, HarmonError::InvalidRegion(_)));

    // Degenerate region.
    let err = harmonizer
        .get_harmonized_features(
            BoundingBox::new(10.0, 10.0, 5.0, 20.0),
            target_date(),
            90,
            Resolution::Km10,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, HarmonError::InvalidRegion(_)));

    // No client was contacted.
    let downloads: usize = clients.iter().map(|c| c.call_count()).sum();
    assert_eq!(downloads, 0);
}

#[tokio::test]
async fn test_resolution_controls_grid_size() {
    init_tracing();
    let clients = full_fleet();
    let harmonizer = UnifiedHarmonizer::without_cache(HarmonizerConfig::default(), as_dyn(&clients));

    let coarse = harmonizer
        .get_harmonized_features(region(), target_date(), 90, Resolution::Km10)
        .await
        .unwrap();
    let fine = harmonizer
        .get_harmonized_features(region(), target_date(), 90, Resolution::Km5)
        .await
        .unwrap();

    assert!(fine.shape.0 > coarse.shape.0);
    assert!(fine.shape.1 > coarse.shape.1);
}
