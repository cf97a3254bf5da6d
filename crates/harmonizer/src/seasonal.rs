//! Sinusoidal seasonal modulation.

use chrono::{DateTime, Datelike, Utc};

use harmon_common::SeasonalConfig;

/// Seasonal transmission factor for a day of year, in [0, 1] for the
/// default half/half amplitude/offset split.
///
/// `offset + amplitude * sin(2*pi * (doy - phase) / period)`: exactly the
/// offset (0.5) at the phase day, rising to offset + amplitude (1.0) a
/// quarter period later.
pub fn seasonal_factor(day_of_year: f64, config: &SeasonalConfig) -> f32 {
    let angle = 2.0 * std::f64::consts::PI * (day_of_year - config.phase_day) / config.period_days;
    let factor = config.offset + config.amplitude * angle.sin();
    factor.clamp(0.0, 1.0) as f32
}

/// Seasonal factor at a specific timestamp.
pub fn seasonal_factor_at(dt: &DateTime<Utc>, config: &SeasonalConfig) -> f32 {
    seasonal_factor(dt.ordinal() as f64, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_midpoint_at_phase_day() {
        let config = SeasonalConfig::default();
        let factor = seasonal_factor(120.0, &config);
        assert!((factor - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_peak_a_quarter_period_later() {
        let config = SeasonalConfig::default();
        let factor = seasonal_factor(120.0 + 365.0 / 4.0, &config);
        assert!((factor - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_trough_three_quarters_later() {
        let config = SeasonalConfig::default();
        let factor = seasonal_factor(120.0 + 3.0 * 365.0 / 4.0, &config);
        assert!(factor.abs() < 1e-6);
    }

    #[test]
    fn test_always_in_unit_interval() {
        let config = SeasonalConfig::default();
        for doy in 0..=366 {
            let factor = seasonal_factor(doy as f64, &config);
            assert!((0.0..=1.0).contains(&factor), "doy {} -> {}", doy, factor);
        }
    }

    #[test]
    fn test_factor_at_timestamp() {
        let config = SeasonalConfig::default();
        // April 29 is day-of-year 120 in a leap year.
        let dt = Utc.with_ymd_and_hms(2024, 4, 29, 12, 0, 0).unwrap();
        assert_eq!(dt.ordinal(), 120);
        assert!((seasonal_factor_at(&dt, &config) - 0.5).abs() < 1e-6);
    }
}
