//! Weather forecast provider adapter (spec §6.2): translates provider
//! condition codes into [`WeatherCondition`], "thin_cloud" mapping to
//! `cloudy`, never `clear`, as the sole such translator in the system.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::weather::{ForecastCollection, WeatherCondition, WeatherForecast, WindDirection};
use crate::error::{WeatherFetchError, WeatherFetchErrorKind};

#[async_trait]
pub trait WeatherAdapter: Send + Sync {
    /// Fetch a forecast collection spanning at least 24h hourly (or the
    /// provider's native period) centered on `target`, for `(lat, lon)`.
    async fn fetch(
        &self,
        location_id: &str,
        lat: f64,
        lon: f64,
        target: DateTime<Utc>,
    ) -> Result<ForecastCollection, WeatherFetchError>;
}

/// Maps a provider-native weather code into the system's condition
/// enum. This is the sole translator: "thin cloud" maps to `Cloudy`,
/// never `Clear` (spec §6.2, §9 Open Question resolution).
#[must_use]
pub fn condition_from_provider_code(code: &str) -> WeatherCondition {
    match code {
        "clear" | "sunny" => WeatherCondition::Clear,
        "cloudy" | "overcast" => WeatherCondition::Cloudy,
        "thin_cloud" | "partly_cloudy" | "薄曇り" => WeatherCondition::ThinCloud,
        "rain" | "light_rain" | "drizzle" => WeatherCondition::Rainy,
        "heavy_rain" => WeatherCondition::HeavyRain,
        "thunder" | "thunderstorm" => WeatherCondition::Thunder,
        "snow" => WeatherCondition::Snow,
        "sleet" => WeatherCondition::Sleet,
        "fog" | "mist" => WeatherCondition::Fog,
        "storm" => WeatherCondition::Storm,
        _ => WeatherCondition::Other,
    }
}

/// HTTP-backed adapter for a WxTech-style forecast provider. The exact
/// wire format is out of scope (spec §1); this adapter only needs to
/// parse enough of a JSON payload to populate [`WeatherForecast`].
pub struct HttpWeatherAdapter {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpWeatherAdapter {
    #[must_use]
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            base_url: base_url.into(),
            api_key,
        }
    }
}

#[derive(Debug, serde::Deserialize)]
struct ProviderResponse {
    hourly: Vec<ProviderSample>,
}

#[derive(Debug, serde::Deserialize)]
struct ProviderSample {
    time_utc: DateTime<Utc>,
    condition: String,
    precipitation_mm: f32,
    temperature_c: f32,
    feels_like_c: f32,
    humidity_pct: f32,
    pressure_hpa: f32,
    wind_speed_mps: f32,
    wind_direction_deg: f32,
    cloud_coverage_pct: f32,
    visibility_m: f32,
    uv_index: f32,
}

#[async_trait]
impl WeatherAdapter for HttpWeatherAdapter {
    async fn fetch(
        &self,
        location_id: &str,
        lat: f64,
        lon: f64,
        target: DateTime<Utc>,
    ) -> Result<ForecastCollection, WeatherFetchError> {
        let mut request = self
            .client
            .get(format!("{}/forecast", self.base_url))
            .query(&[
                ("lat", lat.to_string()),
                ("lon", lon.to_string()),
                ("target", target.to_rfc3339()),
            ]);
        if let Some(key) = &self.api_key {
            request = request.query(&[("key", key.as_str())]);
        }

        let response = request.send().await.map_err(|err| map_transport_error(&err))?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(WeatherFetchError::new(
                WeatherFetchErrorKind::ApiKeyInvalid,
                "weather provider rejected API key",
            ));
        }
        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(WeatherFetchError::new(
                WeatherFetchErrorKind::RateLimited,
                "weather provider rate limited",
            ));
        }
        if !response.status().is_success() {
            return Err(WeatherFetchError::new(
                WeatherFetchErrorKind::Unknown,
                format!("weather provider returned {}", response.status()),
            ));
        }

        let payload: ProviderResponse = response
            .json()
            .await
            .map_err(|err| WeatherFetchError::new(WeatherFetchErrorKind::Unknown, err.to_string()))?;

        let samples = payload
            .hourly
            .into_iter()
            .map(|sample| WeatherForecast {
                location_id: location_id.to_string(),
                datetime_utc: sample.time_utc,
                condition: condition_from_provider_code(&sample.condition),
                precipitation_mm: sample.precipitation_mm,
                temperature_c: sample.temperature_c,
                feels_like_c: sample.feels_like_c,
                humidity_pct: sample.humidity_pct,
                pressure_hpa: sample.pressure_hpa,
                wind_speed_mps: sample.wind_speed_mps,
                wind_direction: WindDirection::from_degrees(sample.wind_direction_deg),
                cloud_coverage_pct: sample.cloud_coverage_pct,
                visibility_m: sample.visibility_m,
                uv_index: sample.uv_index,
            })
            .collect();

        Ok(ForecastCollection::new(location_id, samples))
    }
}

fn map_transport_error(err: &reqwest::Error) -> WeatherFetchError {
    if err.is_timeout() {
        WeatherFetchError::new(WeatherFetchErrorKind::Timeout, err.to_string())
    } else if err.is_connect() {
        WeatherFetchError::new(WeatherFetchErrorKind::Network, err.to_string())
    } else {
        WeatherFetchError::new(WeatherFetchErrorKind::Unknown, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thin_cloud_maps_to_cloudy_never_clear() {
        assert_eq!(condition_from_provider_code("thin_cloud"), WeatherCondition::ThinCloud);
        assert!(condition_from_provider_code("thin_cloud").is_cloudy_family());
        assert_eq!(condition_from_provider_code("薄曇り"), WeatherCondition::ThinCloud);
    }

    #[test]
    fn unknown_code_maps_to_other() {
        assert_eq!(condition_from_provider_code("bizarre"), WeatherCondition::Other);
    }
}
