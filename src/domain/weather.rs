//! Weather data model (spec §3): `WeatherForecast`, `ForecastCollection`,
//! the condition/wind-direction enums, and the timeline sampling used by
//! `FetchForecast`.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeatherCondition {
    Clear,
    Cloudy,
    ThinCloud,
    Rainy,
    HeavyRain,
    Thunder,
    Snow,
    Sleet,
    Fog,
    Storm,
    Other,
}

impl WeatherCondition {
    /// Thin cloud is cloudy everywhere in this system (spec §9 Open
    /// Question resolution) — never treated as clear.
    #[must_use]
    pub fn is_cloudy_family(self) -> bool {
        matches!(self, Self::Cloudy | Self::ThinCloud)
    }

    #[must_use]
    pub fn is_rain_family(self) -> bool {
        matches!(self, Self::Rainy | Self::HeavyRain | Self::Thunder | Self::Storm | Self::Sleet)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WindDirection {
    N,
    Nne,
    Ne,
    Ene,
    E,
    Ese,
    Se,
    Sse,
    S,
    Ssw,
    Sw,
    Wsw,
    W,
    Wnw,
    Nw,
    Nnw,
}

impl WindDirection {
    /// Derive one of the 16 compass points from a heading in degrees.
    #[must_use]
    pub fn from_degrees(degrees: f32) -> Self {
        const POINTS: [WindDirection; 16] = [
            WindDirection::N,
            WindDirection::Nne,
            WindDirection::Ne,
            WindDirection::Ene,
            WindDirection::E,
            WindDirection::Ese,
            WindDirection::Se,
            WindDirection::Sse,
            WindDirection::S,
            WindDirection::Ssw,
            WindDirection::Sw,
            WindDirection::Wsw,
            WindDirection::W,
            WindDirection::Wnw,
            WindDirection::Nw,
            WindDirection::Nnw,
        ];
        let normalized = degrees.rem_euclid(360.0);
        let idx = ((normalized / 22.5) + 0.5).floor() as usize % 16;
        POINTS[idx]
    }
}

/// Classifies precipitation into a condition, rounding up at the
/// threshold boundary (spec §8 boundary behavior: 10.0 mm/h is heavy
/// rain, not plain rain).
#[must_use]
pub fn classify_precipitation(precip_mm_per_h: f32, heavy_threshold: f32) -> Option<WeatherCondition> {
    if precip_mm_per_h >= heavy_threshold {
        Some(WeatherCondition::HeavyRain)
    } else if precip_mm_per_h > 0.0 {
        Some(WeatherCondition::Rainy)
    } else {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeatherForecast {
    pub location_id: String,
    pub datetime_utc: DateTime<Utc>,
    pub condition: WeatherCondition,
    pub precipitation_mm: f32,
    pub temperature_c: f32,
    pub feels_like_c: f32,
    pub humidity_pct: f32,
    pub pressure_hpa: f32,
    pub wind_speed_mps: f32,
    pub wind_direction: WindDirection,
    pub cloud_coverage_pct: f32,
    pub visibility_m: f32,
    pub uv_index: f32,
}

impl WeatherForecast {
    #[must_use]
    pub fn is_valid(&self) -> bool {
        (-50.0..=60.0).contains(&self.temperature_c)
            && (0.0..=100.0).contains(&self.humidity_pct)
            && self.precipitation_mm >= 0.0
            && (0.0..=200.0).contains(&self.wind_speed_mps)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationId(pub String);

/// Ordered sequence of forecasts sharing `location_id`, sorted by
/// `datetime_utc` ascending.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastCollection {
    pub location_id: String,
    pub samples: Vec<WeatherForecast>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    pub past_12h: Option<WeatherForecast>,
    pub at_target: Option<WeatherForecast>,
    pub plus_3h: Option<WeatherForecast>,
    pub plus_6h: Option<WeatherForecast>,
    pub plus_9h: Option<WeatherForecast>,
    pub plus_12h: Option<WeatherForecast>,
}

impl ForecastCollection {
    #[must_use]
    pub fn new(location_id: impl Into<String>, mut samples: Vec<WeatherForecast>) -> Self {
        samples.sort_by_key(|s| s.datetime_utc);
        Self {
            location_id: location_id.into(),
            samples,
        }
    }

    /// Closest sample to `target`, or `None` if the collection is empty.
    #[must_use]
    pub fn at(&self, target: DateTime<Utc>) -> Option<&WeatherForecast> {
        self.samples
            .iter()
            .min_by_key(|s| (s.datetime_utc - target).num_seconds().abs())
    }

    /// Closest sample within `target +/- window_hours`.
    #[must_use]
    pub fn around(&self, target: DateTime<Utc>, window_hours: i64) -> Option<&WeatherForecast> {
        let window_secs = Duration::hours(window_hours).num_seconds();
        self.samples
            .iter()
            .filter(|s| (s.datetime_utc - target).num_seconds().abs() <= window_secs)
            .min_by_key(|s| (s.datetime_utc - target).num_seconds().abs())
    }

    #[must_use]
    pub fn timeline(&self, target: DateTime<Utc>) -> Timeline {
        Timeline {
            past_12h: self.around(target - Duration::hours(12), 1).cloned(),
            at_target: self.at(target).cloned(),
            plus_3h: self.around(target + Duration::hours(3), 1).cloned(),
            plus_6h: self.around(target + Duration::hours(6), 1).cloned(),
            plus_9h: self.around(target + Duration::hours(9), 1).cloned(),
            plus_12h: self.around(target + Duration::hours(12), 1).cloned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(hour_offset: i64, temp: f32) -> WeatherForecast {
        WeatherForecast {
            location_id: "tokyo".to_string(),
            datetime_utc: Utc::now() + Duration::hours(hour_offset),
            condition: WeatherCondition::Clear,
            precipitation_mm: 0.0,
            temperature_c: temp,
            feels_like_c: temp,
            humidity_pct: 50.0,
            pressure_hpa: 1013.0,
            wind_speed_mps: 2.0,
            wind_direction: WindDirection::N,
            cloud_coverage_pct: 10.0,
            visibility_m: 10_000.0,
            uv_index: 3.0,
        }
    }

    #[test]
    fn at_returns_closest_sample() {
        let target = Utc::now();
        let collection = ForecastCollection::new(
            "tokyo",
            vec![sample(-1, 10.0), sample(0, 20.0), sample(1, 30.0)],
        );
        let closest = collection.at(target).unwrap();
        assert_eq!(closest.temperature_c, 20.0);
    }

    #[test]
    fn at_is_idempotent_without_extra_calls() {
        let target = Utc::now();
        let collection = ForecastCollection::new("tokyo", vec![sample(0, 20.0)]);
        let first = collection.at(target).cloned();
        let second = collection.at(target).cloned();
        assert_eq!(first, second);
    }

    #[test]
    fn timeline_samples_expected_offsets() {
        let target = Utc::now();
        let samples = vec![-12, 0, 3, 6, 9, 12]
            .into_iter()
            .map(|h| sample(h, 15.0))
            .collect();
        let collection = ForecastCollection::new("tokyo", samples);
        let timeline = collection.timeline(target);
        assert!(timeline.past_12h.is_some());
        assert!(timeline.at_target.is_some());
        assert!(timeline.plus_3h.is_some());
        assert!(timeline.plus_6h.is_some());
        assert!(timeline.plus_9h.is_some());
        assert!(timeline.plus_12h.is_some());
    }

    #[test]
    fn wind_direction_from_degrees_wraps_at_north() {
        assert_eq!(WindDirection::from_degrees(0.0), WindDirection::N);
        assert_eq!(WindDirection::from_degrees(359.0), WindDirection::N);
        assert_eq!(WindDirection::from_degrees(90.0), WindDirection::E);
        assert_eq!(WindDirection::from_degrees(180.0), WindDirection::S);
    }

    #[test]
    fn forecast_validity_rejects_out_of_range_fields() {
        let mut f = sample(0, 20.0);
        assert!(f.is_valid());
        f.temperature_c = 61.0;
        assert!(!f.is_valid());
        f.temperature_c = 20.0;
        f.humidity_pct = 101.0;
        assert!(!f.is_valid());
    }

    #[test]
    fn precipitation_classification_rounds_up_at_boundary() {
        assert_eq!(
            classify_precipitation(10.0, 10.0),
            Some(WeatherCondition::HeavyRain)
        );
        assert_eq!(
            classify_precipitation(9.9, 10.0),
            Some(WeatherCondition::Rainy)
        );
        assert_eq!(classify_precipitation(0.0, 10.0), None);
    }
}
