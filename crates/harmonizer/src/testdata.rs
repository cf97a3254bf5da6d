//! Synthetic source data for unit and integration tests.
//!
//! Deterministic value patterns (smooth spatial gradients plus simple
//! temporal cycles) keep assertions stable while exercising every source
//! cadence. The synthetic client also counts its downloads so cache tests
//! can assert that a hit triggers no second fetch.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Duration, Utc};

use harmon_common::{BoundingBox, HarmonError, HarmonResult, RasterBlock, SourceKind, TimeRange};

use crate::sources::{SourceClient, SourcePayload};

/// Temperature-like field: warm at the center rows, cooler at the edges.
pub fn temperature_field(width: usize, height: usize, day_of_year: u32) -> Vec<f32> {
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        let lat_factor = 1.0 - (2.0 * row as f32 / height as f32 - 1.0).abs();
        let seasonal = 1.5 * (2.0 * std::f32::consts::PI * day_of_year as f32 / 365.0).sin();
        let temp = 20.0 + 8.0 * lat_factor + seasonal;
        for _col in 0..width {
            data.push(temp);
        }
    }
    data
}

/// Relative humidity field in percent, varying west to east.
pub fn humidity_field(width: usize, height: usize) -> Vec<f32> {
    let mut data = Vec::with_capacity(width * height);
    for _row in 0..height {
        for col in 0..width {
            data.push(55.0 + 20.0 * col as f32 / width.max(1) as f32);
        }
    }
    data
}

/// Daily precipitation in mm: two wet days out of every five.
pub fn precipitation_value(day_offset: i64) -> f32 {
    if day_offset.rem_euclid(5) < 2 {
        6.0
    } else {
        0.0
    }
}

/// NDVI with an annual cycle and a mild spatial gradient, within [0, 1].
pub fn ndvi_value(day_of_year: u32, row: usize, col: usize) -> f32 {
    let cycle = (2.0 * std::f32::consts::PI * day_of_year as f32 / 365.0).sin();
    (0.4 + 0.15 * cycle + 0.002 * (row + col) as f32).clamp(0.0, 1.0)
}

/// Daily timestamps covering the whole range.
pub fn daily_times(range: &TimeRange) -> Vec<DateTime<Utc>> {
    let mut times = Vec::new();
    let mut t = range.start;
    while t <= range.end {
        times.push(t);
        t += Duration::days(1);
    }
    times
}

/// Composite-window timestamps (every `step` days) covering the range.
pub fn composite_times(range: &TimeRange, step: i64) -> Vec<DateTime<Utc>> {
    let mut times = Vec::new();
    let mut t = range.start;
    while t <= range.end {
        times.push(t);
        t += Duration::days(step);
    }
    times
}

/// A synthetic download client for one source kind.
///
/// Generates plausible data covering the requested bounds and range on a
/// small native grid. `failing` clients simulate an upstream outage;
/// `shift_days` moves the covered window to provoke overlap failures.
pub struct SyntheticClient {
    kind: SourceKind,
    width: usize,
    height: usize,
    fail: bool,
    shift_days: i64,
    calls: AtomicUsize,
}

impl SyntheticClient {
    pub fn new(kind: SourceKind) -> Self {
        Self {
            kind,
            width: 16,
            height: 16,
            fail: false,
            shift_days: 0,
            calls: AtomicUsize::new(0),
        }
    }

    /// A client whose every download fails.
    pub fn failing(kind: SourceKind) -> Self {
        Self {
            fail: true,
            ..Self::new(kind)
        }
    }

    /// A client whose data coverage is shifted by `days` relative to the
    /// requested range.
    pub fn with_shift(kind: SourceKind, days: i64) -> Self {
        Self {
            shift_days: days,
            ..Self::new(kind)
        }
    }

    /// Number of downloads served (successful or failed).
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn time_block(
        &self,
        name: &str,
        times: Vec<DateTime<Utc>>,
        bounds: BoundingBox,
        value: impl Fn(&DateTime<Utc>, usize, usize) -> f32,
    ) -> RasterBlock {
        let plane = self.width * self.height;
        let mut data = Vec::with_capacity(times.len() * plane);
        for t in &times {
            for row in 0..self.height {
                for col in 0..self.width {
                    data.push(value(t, row, col));
                }
            }
        }
        RasterBlock::new_3d(name, data, self.width, self.height, times, bounds)
    }

    fn static_block(
        &self,
        name: &str,
        bounds: BoundingBox,
        value: impl Fn(usize, usize) -> f32,
    ) -> RasterBlock {
        let mut data = Vec::with_capacity(self.width * self.height);
        for row in 0..self.height {
            for col in 0..self.width {
                data.push(value(row, col));
            }
        }
        RasterBlock::new_2d(name, data, self.width, self.height, bounds)
    }
}

#[async_trait]
impl SourceClient for SyntheticClient {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    async fn download(
        &self,
        range: &TimeRange,
        bounds: &BoundingBox,
    ) -> HarmonResult<SourcePayload> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(HarmonError::source_unavailable(
                self.kind.to_string(),
                "synthetic outage",
            ));
        }

        let shifted = TimeRange::new(
            range.start + Duration::days(self.shift_days),
            range.end + Duration::days(self.shift_days),
        );
        let bounds = *bounds;

        let blocks = match self.kind {
            SourceKind::Climate => {
                let times = daily_times(&shifted);
                let width = self.width;
                let height = self.height;
                let temperature =
                    self.time_block("temperature", times.clone(), bounds, move |t, row, _col| {
                        let seasonal =
                            1.5 * (2.0 * std::f32::consts::PI * t.ordinal() as f32 / 365.0).sin();
                        let lat_factor = 1.0 - (2.0 * row as f32 / height as f32 - 1.0).abs();
                        20.0 + seasonal + 8.0 * lat_factor
                    });
                let humidity = self.time_block("humidity", times, bounds, move |_t, row, col| {
                    55.0 + 20.0 * col as f32 / width as f32 + 0.1 * row as f32
                });
                vec![temperature, humidity]
            }
            SourceKind::Precipitation => {
                let times = daily_times(&shifted);
                let start = shifted.start;
                vec![self.time_block("precipitation", times, bounds, move |t, _row, _col| {
                    precipitation_value((*t - start).num_days())
                })]
            }
            SourceKind::Vegetation => {
                let times = composite_times(&shifted, 16);
                vec![self.time_block("ndvi", times, bounds, |t, row, col| {
                    ndvi_value(t.ordinal(), row, col)
                })]
            }
            SourceKind::RiskSurface => {
                let width = self.width;
                vec![self.static_block("risk", bounds, move |_row, col| {
                    30.0 + 40.0 * col as f32 / (width - 1) as f32
                })]
            }
            SourceKind::Population => {
                vec![self.static_block("population", bounds, |row, col| {
                    50.0 + 10.0 * ((row + col) % 5) as f32
                })]
            }
        };

        Ok(SourcePayload::new(self.kind, blocks, 1000.0))
    }
}
