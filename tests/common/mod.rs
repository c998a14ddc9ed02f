#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use comment_gen_engine::config::CacheConfig;
use comment_gen_engine::corpus::CorpusRepository;
use comment_gen_engine::dependencies::Dependencies;
use comment_gen_engine::domain::location::SpatialIndex;
use comment_gen_engine::domain::weather::{ForecastCollection, WeatherCondition, WeatherForecast, WindDirection};
use comment_gen_engine::error::{LlmError, WeatherFetchError, WeatherFetchErrorKind};
use comment_gen_engine::forecast::{ForecastService, WeatherAdapter};
use comment_gen_engine::history::HistoryStore;
use comment_gen_engine::llm::{LlmAdapter, LlmOptions};
use comment_gen_engine::locations;

/// A forecast template with placeholder location/time, filled in by
/// [`ScenarioWeatherAdapter::fetch`] for whichever location actually asks.
#[must_use]
pub fn template(
    condition: WeatherCondition,
    temperature_c: f32,
    humidity_pct: f32,
    precipitation_mm: f32,
    wind_speed_mps: f32,
) -> WeatherForecast {
    WeatherForecast {
        location_id: String::new(),
        datetime_utc: Utc::now(),
        condition,
        precipitation_mm,
        temperature_c,
        feels_like_c: temperature_c,
        humidity_pct,
        pressure_hpa: 1013.0,
        wind_speed_mps,
        wind_direction: WindDirection::N,
        cloud_coverage_pct: if condition.is_cloudy_family() { 80.0 } else { 10.0 },
        visibility_m: 10_000.0,
        uv_index: 3.0,
    }
}

/// A weather adapter scripted per scenario: per-location forecast
/// templates, an optional fallback for unlisted locations, and a clean
/// failure for everything else (mirrors the teacher's `wiremock` stubs,
/// one layer down at the adapter trait instead of the HTTP boundary).
#[derive(Default)]
pub struct ScenarioWeatherAdapter {
    forecasts: HashMap<String, WeatherForecast>,
    default_forecast: Option<WeatherForecast>,
}

impl ScenarioWeatherAdapter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_forecast(mut self, location_id: &str, forecast: WeatherForecast) -> Self {
        self.forecasts.insert(location_id.to_string(), forecast);
        self
    }

    #[must_use]
    pub fn with_default(mut self, forecast: WeatherForecast) -> Self {
        self.default_forecast = Some(forecast);
        self
    }
}

#[async_trait]
impl WeatherAdapter for ScenarioWeatherAdapter {
    async fn fetch(
        &self,
        location_id: &str,
        _lat: f64,
        _lon: f64,
        target: DateTime<Utc>,
    ) -> Result<ForecastCollection, WeatherFetchError> {
        let template = self
            .forecasts
            .get(location_id)
            .or(self.default_forecast.as_ref())
            .ok_or_else(|| {
                WeatherFetchError::new(WeatherFetchErrorKind::Unknown, format!("no scripted forecast for {location_id}"))
            })?;
        let mut forecast = *template;
        forecast.location_id = location_id.to_string();
        forecast.datetime_utc = target;
        Ok(ForecastCollection::new(location_id, vec![forecast]))
    }
}

/// An LLM stub that tells the selection prompt apart from the adaptation
/// prompt by the one phrase unique to each (`adaptation_prompt` is the
/// only prompt that asks to "Rephrase each line"), and always replies
/// with the same scripted pair — standing in for a model that keeps
/// proposing the same phrasing no matter how many times it is asked.
pub struct ScriptedLlm {
    selection_reply: String,
    adaptation_reply: String,
    pub selection_calls: AtomicU32,
    pub adaptation_calls: AtomicU32,
}

impl ScriptedLlm {
    #[must_use]
    pub fn new(selection_reply: impl Into<String>, adaptation_reply: impl Into<String>) -> Self {
        Self {
            selection_reply: selection_reply.into(),
            adaptation_reply: adaptation_reply.into(),
            selection_calls: AtomicU32::new(0),
            adaptation_calls: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl LlmAdapter for ScriptedLlm {
    async fn generate(&self, prompt: &str, _options: &LlmOptions) -> Result<String, LlmError> {
        if prompt.contains("Rephrase each line to at most") {
            self.adaptation_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.adaptation_reply.clone())
        } else {
            self.selection_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.selection_reply.clone())
        }
    }
}

pub fn write_csv(dir: &Path, name: &str, contents: &str) {
    std::fs::write(dir.join(name), contents).unwrap();
}

/// Wires up real collaborators (corpus repository, forecast service with
/// the full location gazetteer's spatial index, history store) around a
/// scripted adapter/LLM pair, the same shape `main.rs::build_dependencies`
/// assembles from real network clients.
pub fn build_dependencies(
    corpus_dir: &Path,
    cache_dir: &Path,
    adapter: Arc<dyn WeatherAdapter>,
    llm: Option<Arc<dyn LlmAdapter>>,
) -> Dependencies {
    let corpus = CorpusRepository::new(corpus_dir).unwrap();
    let spatial_index = SpatialIndex::from_locations(locations::all());
    let forecast = ForecastService::new(&CacheConfig::default(), cache_dir, spatial_index, adapter);
    Dependencies {
        forecast,
        corpus,
        llm,
        history: HistoryStore::new(cache_dir.join("history.jsonl")),
    }
}
