//! Typed configuration loaded from environment (C8).
//!
//! Mirrors the teacher's pattern of reading `TERMINAL_WEATHER_*` overrides
//! at construction time (`ForecastClient::new`, `GeocodeClient::new`):
//! every value is read once, bounds-checked, and packaged into a single
//! struct passed down from the entry point. Validator thresholds are
//! exposed only through [`Thresholds`] — literal numbers are forbidden in
//! validator code (spec §4.8).

use std::env;

use crate::error::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Staging,
    Production,
}

impl AppEnv {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "development" => Some(Self::Development),
            "staging" => Some(Self::Staging),
            "production" => Some(Self::Production),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProviderKind {
    Openai,
    Gemini,
    Anthropic,
}

impl LlmProviderKind {
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "openai" => Some(Self::Openai),
            "gemini" => Some(Self::Gemini),
            "anthropic" => Some(Self::Anthropic),
            _ => None,
        }
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Openai => "openai",
            Self::Gemini => "gemini",
            Self::Anthropic => "anthropic",
        }
    }
}

/// Temperature/humidity/precipitation thresholds consumed exclusively by
/// the validator pipeline (C3). No validator checker may hard-code a
/// literal threshold; every comparison reads one of these fields.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub temp_hot_c: f32,
    pub temp_cold_c: f32,
    /// Lower bound of the "moderate" band in which extreme-temperature
    /// phrasing ("extreme cold", "scorching") is forbidden outright.
    /// Distinct from `temp_cold_c`: the cold/hot mismatch rule and the
    /// moderate-band rule have different boundaries (spec §4.3 rule 2).
    pub temp_moderate_low_c: f32,
    pub temp_heat_stroke_advisory_c: f32,
    pub temp_heat_stroke_required_c: f32,
    pub humidity_high_pct: f32,
    pub humidity_low_pct: f32,
    pub precip_heavy_mm_per_h: f32,
    pub weather_change_threshold_c: f32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            temp_hot_c: 30.0,
            temp_cold_c: 12.0,
            temp_moderate_low_c: 10.0,
            temp_heat_stroke_advisory_c: 34.0,
            temp_heat_stroke_required_c: 35.0,
            humidity_high_pct: 80.0,
            humidity_low_pct: 30.0,
            precip_heavy_mm_per_h: 10.0,
            weather_change_threshold_c: 5.0,
        }
    }
}

/// Pattern tables consumed by the Validator Pipeline's
/// `LengthAndBannedWordChecker` (spec §4.3: "checkers are stateless
/// apart from a small set of precompiled pattern tables loaded from
/// configuration").
#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    pub max_line_chars: usize,
    pub ng_words: Vec<String>,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            max_line_chars: 15,
            ng_words: [
                "kill", "death", "die", "suicide", "murder", "worthless", "stupid idiot",
            ]
            .into_iter()
            .map(str::to_string)
            .collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SpatialCacheConfig {
    pub enabled: bool,
    pub radius_km: f64,
    pub k_nearest: usize,
}

impl Default for SpatialCacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            radius_km: 10.0,
            k_nearest: 5,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub memory_cache_size: usize,
    pub memory_cache_ttl_secs: u64,
    pub file_cache_ttl_secs: u64,
    pub spatial: SpatialCacheConfig,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            memory_cache_size: 500,
            memory_cache_ttl_secs: 300,
            file_cache_ttl_secs: 6 * 3600,
            spatial: SpatialCacheConfig::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub max_parallel_workers: usize,
    pub per_item_timeout_secs: u64,
    pub max_parallel_locations: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_parallel_workers: 4,
            per_item_timeout_secs: 30,
            max_parallel_locations: 20,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub app_env: AppEnv,
    pub wxtech_base_url: String,
    pub wxtech_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub gemini_api_key: Option<String>,
    pub default_llm_provider: LlmProviderKind,
    pub llm_performance_mode: bool,
    pub max_llm_workers: usize,
    pub max_evaluation_retries: u32,
    pub corpus_truncate_n: usize,
    pub cache: CacheConfig,
    pub batch: BatchConfig,
    pub thresholds: Thresholds,
    pub validator: ValidatorConfig,
    pub enable_spatial_cache: bool,
    /// Hours of hourly forecast to request around the target time (spec
    /// §4.5: the fetch window covers `[target-12h, target+12h]`, at
    /// least 24 hourly points).
    pub weather_forecast_hours_ahead: u32,
}

const MAX_EVALUATION_RETRIES_DEFAULT: u32 = 5;
const CORPUS_TRUNCATE_N_DEFAULT: usize = 100;
const MAX_LLM_WORKERS_DEFAULT: usize = 4;
const WXTECH_BASE_URL_DEFAULT: &str = "https://wxtech.weathernews.com/api/v1";
const WEATHER_FORECAST_HOURS_AHEAD_DEFAULT: u32 = 24;

impl Default for Config {
    fn default() -> Self {
        Self {
            app_env: AppEnv::Development,
            wxtech_base_url: WXTECH_BASE_URL_DEFAULT.to_string(),
            wxtech_api_key: None,
            openai_api_key: None,
            anthropic_api_key: None,
            gemini_api_key: None,
            default_llm_provider: LlmProviderKind::Openai,
            llm_performance_mode: false,
            max_llm_workers: MAX_LLM_WORKERS_DEFAULT,
            max_evaluation_retries: MAX_EVALUATION_RETRIES_DEFAULT,
            corpus_truncate_n: CORPUS_TRUNCATE_N_DEFAULT,
            cache: CacheConfig::default(),
            batch: BatchConfig::default(),
            thresholds: Thresholds::default(),
            validator: ValidatorConfig::default(),
            enable_spatial_cache: true,
            weather_forecast_hours_ahead: WEATHER_FORECAST_HOURS_AHEAD_DEFAULT,
        }
    }
}

impl Config {
    /// Load configuration from the process environment, applying the
    /// defaults above for anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut cfg = Self::default();

        if let Ok(value) = env::var("APP_ENV") {
            cfg.app_env = AppEnv::parse(&value)
                .ok_or_else(|| ConfigError::OutOfRange(format!("APP_ENV={value}")))?;
        }

        if let Ok(value) = env::var("WXTECH_BASE_URL") {
            cfg.wxtech_base_url = value;
        }
        cfg.wxtech_api_key = env::var("WXTECH_API_KEY").ok();
        cfg.openai_api_key = env::var("OPENAI_API_KEY").ok();
        cfg.anthropic_api_key = env::var("ANTHROPIC_API_KEY").ok();
        cfg.gemini_api_key = env::var("GEMINI_API_KEY").ok();

        if let Ok(value) = env::var("DEFAULT_LLM_PROVIDER") {
            cfg.default_llm_provider = LlmProviderKind::parse(&value)
                .ok_or_else(|| ConfigError::OutOfRange(format!("DEFAULT_LLM_PROVIDER={value}")))?;
        }

        cfg.llm_performance_mode = bool_env("LLM_PERFORMANCE_MODE").unwrap_or(false);

        if let Some(value) = usize_env("MAX_LLM_WORKERS")? {
            cfg.max_llm_workers = value.clamp(1, 64);
        }
        if let Some(value) = u32_env("MAX_EVALUATION_RETRIES")? {
            cfg.max_evaluation_retries = value.clamp(0, 20);
        }
        if let Some(value) = usize_env("MEMORY_CACHE_SIZE")? {
            cfg.cache.memory_cache_size = value.max(1);
        }
        if let Some(value) = u64_env("MEMORY_CACHE_TTL")? {
            cfg.cache.memory_cache_ttl_secs = value;
        }
        if let Some(value) = u64_env("WEATHER_CACHE_TTL")? {
            cfg.cache.file_cache_ttl_secs = value;
        }
        if let Some(value) = bool_env("ENABLE_SPATIAL_CACHE") {
            cfg.enable_spatial_cache = value;
            cfg.cache.spatial.enabled = value;
        }
        if let Some(value) = usize_env("MAX_PARALLEL_WORKERS")? {
            cfg.batch.max_parallel_workers = value.clamp(1, 64);
        }
        if let Some(value) = u64_env("COMMENT_TIMEOUT_SECONDS")? {
            cfg.batch.per_item_timeout_secs = value.clamp(1, 120);
        }
        if let Some(value) = usize_env("MAX_PARALLEL_LOCATIONS")? {
            cfg.batch.max_parallel_locations = value.max(1);
        }
        if let Some(value) = u32_env("WEATHER_FORECAST_HOURS_AHEAD")? {
            cfg.weather_forecast_hours_ahead = value.clamp(1, 168);
        }

        if let Some(value) = f32_env("TEMP_HOT_C")? {
            cfg.thresholds.temp_hot_c = value;
        }
        if let Some(value) = f32_env("TEMP_COLD_C")? {
            cfg.thresholds.temp_cold_c = value;
        }
        if let Some(value) = f32_env("TEMP_MODERATE_LOW_C")? {
            cfg.thresholds.temp_moderate_low_c = value;
        }
        if let Some(value) = f32_env("TEMP_HEAT_STROKE_ADVISORY_C")? {
            cfg.thresholds.temp_heat_stroke_advisory_c = value;
        }
        if let Some(value) = f32_env("TEMP_HEAT_STROKE_REQUIRED_C")? {
            cfg.thresholds.temp_heat_stroke_required_c = value;
        }
        if let Some(value) = f32_env("HUMIDITY_HIGH_PCT")? {
            cfg.thresholds.humidity_high_pct = value.clamp(0.0, 100.0);
        }
        if let Some(value) = f32_env("HUMIDITY_LOW_PCT")? {
            cfg.thresholds.humidity_low_pct = value.clamp(0.0, 100.0);
        }
        if let Some(value) = f32_env("PRECIP_HEAVY_MM_PER_H")? {
            cfg.thresholds.precip_heavy_mm_per_h = value.max(0.0);
        }
        if let Some(value) = f32_env("WEATHER_CHANGE_THRESHOLD")? {
            cfg.thresholds.weather_change_threshold_c = value.max(0.0);
        }

        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.app_env == AppEnv::Production {
            let has_llm_key = self.openai_api_key.is_some()
                || self.anthropic_api_key.is_some()
                || self.gemini_api_key.is_some();
            if !has_llm_key {
                return Err(ConfigError::Missing(
                    "at least one LLM provider API key".to_string(),
                ));
            }
            if self.wxtech_api_key.is_none() {
                return Err(ConfigError::Missing("WXTECH_API_KEY".to_string()));
            }
        }
        Ok(())
    }
}

fn bool_env(key: &str) -> Option<bool> {
    env::var(key)
        .ok()
        .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
}

fn usize_env(key: &str) -> Result<Option<usize>, ConfigError> {
    match env::var(key) {
        Ok(value) => value
            .parse::<usize>()
            .map(Some)
            .map_err(|_| ConfigError::OutOfRange(format!("{key}={value}"))),
        Err(_) => Ok(None),
    }
}

fn u32_env(key: &str) -> Result<Option<u32>, ConfigError> {
    match env::var(key) {
        Ok(value) => value
            .parse::<u32>()
            .map(Some)
            .map_err(|_| ConfigError::OutOfRange(format!("{key}={value}"))),
        Err(_) => Ok(None),
    }
}

fn u64_env(key: &str) -> Result<Option<u64>, ConfigError> {
    match env::var(key) {
        Ok(value) => value
            .parse::<u64>()
            .map(Some)
            .map_err(|_| ConfigError::OutOfRange(format!("{key}={value}"))),
        Err(_) => Ok(None),
    }
}

fn f32_env(key: &str) -> Result<Option<f32>, ConfigError> {
    match env::var(key) {
        Ok(value) => value
            .parse::<f32>()
            .map(Some)
            .map_err(|_| ConfigError::OutOfRange(format!("{key}={value}"))),
        Err(_) => Ok(None),
    }
}
