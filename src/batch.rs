//! Batch Orchestrator (C7): bounded-parallelism fan-out over many
//! locations with chunk-settle scheduling and progressive callback
//! delivery (spec §4.7).
//!
//! Chunk-settle rather than continuous fill gives a predictable
//! progressive-display cadence and bounds peak concurrency against the
//! LLM provider's per-second limit (spec §4.7 Rationale) — mirrors the
//! teacher's bounded-worker fetch loop generalized from a fixed location
//! list to an arbitrary input batch.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use crate::config::Config;
use crate::dependencies::Dependencies;
use crate::validator::EvaluationMode;
use crate::workflow::{run_generation, GenerationInput, GenerationOutput};

#[derive(Debug, Clone)]
pub struct BatchInput {
    pub location_name: String,
    pub llm_provider_name: Option<String>,
    pub use_unified_path: Option<bool>,
    pub evaluation_mode: Option<EvaluationMode>,
    pub exclude_previous: HashSet<String>,
}

impl BatchInput {
    #[must_use]
    pub fn new(location_name: impl Into<String>) -> Self {
        Self {
            location_name: location_name.into(),
            llm_provider_name: None,
            use_unified_path: None,
            evaluation_mode: None,
            exclude_previous: HashSet::new(),
        }
    }

    fn into_generation_input(self) -> GenerationInput {
        GenerationInput {
            location_name: self.location_name,
            target_datetime: None,
            llm_provider_name: self.llm_provider_name,
            use_unified_path: self.use_unified_path,
            use_indexed_corpus: None,
            exclude_previous: Some(!self.exclude_previous.is_empty()),
            evaluation_mode: self.evaluation_mode,
            seed_excluded_texts: self.exclude_previous,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BatchResult {
    pub index: usize,
    pub location_name: String,
    pub success: bool,
    pub loading: bool,
    pub timed_out: bool,
    pub output: Option<GenerationOutput>,
    pub error: Option<String>,
    pub latency: Duration,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BatchStats {
    pub processed: usize,
    pub succeeded: usize,
    pub timed_out: usize,
    pub errored: usize,
    pub mean_latency: Duration,
}

impl BatchStats {
    #[must_use]
    pub fn from_results(results: &[BatchResult]) -> Self {
        let processed = results.len();
        let succeeded = results.iter().filter(|r| r.success).count();
        let timed_out = results.iter().filter(|r| r.timed_out).count();
        let errored = processed - succeeded;
        let total: Duration = results.iter().map(|r| r.latency).sum();
        let mean_latency = if processed == 0 {
            Duration::ZERO
        } else {
            total / processed as u32
        };
        Self {
            processed,
            succeeded,
            timed_out,
            errored,
            mean_latency,
        }
    }
}

async fn run_one(
    index: usize,
    input: BatchInput,
    cfg: &Config,
    deps: &Dependencies,
) -> BatchResult {
    let location_name = input.location_name.clone();
    let start = Instant::now();
    let timeout = Duration::from_secs(cfg.batch.per_item_timeout_secs);
    let generation_input = input.into_generation_input();

    match tokio::time::timeout(timeout, run_generation(generation_input, cfg, deps)).await {
        Ok(output) => BatchResult {
            index,
            location_name,
            success: output.success,
            loading: false,
            timed_out: false,
            error: output.error.as_ref().map(|e| e.message.clone()),
            output: Some(output),
            latency: start.elapsed(),
        },
        Err(_) => BatchResult {
            index,
            location_name,
            success: false,
            loading: false,
            timed_out: true,
            error: Some(format!("item timed out after {}s", cfg.batch.per_item_timeout_secs)),
            output: None,
            latency: start.elapsed(),
        },
    }
}

/// Runs `inputs` through [`crate::workflow::run_generation`] in chunks of
/// `cfg.batch.max_parallel_workers`, settling each chunk before starting
/// the next (spec §4.7 Scheduling). `callback` fires as each item
/// completes, in completion order; the returned vector preserves input
/// order regardless of completion order (spec §4.7 Contract).
///
/// Batches above `cfg.batch.max_parallel_locations` run with a single
/// worker per chunk (spec §4.7 Parameters: "above this, downgrade to
/// serial").
pub async fn run_batch(
    inputs: Vec<BatchInput>,
    cfg: &Config,
    deps: &Dependencies,
    mut callback: impl FnMut(BatchResult),
) -> Vec<BatchResult> {
    let chunk_size = if inputs.len() > cfg.batch.max_parallel_locations {
        1
    } else {
        cfg.batch.max_parallel_workers.max(1)
    };

    let mut slots: Vec<Option<BatchResult>> = (0..inputs.len()).map(|_| None).collect();

    for chunk in inputs.into_iter().enumerate().collect::<Vec<_>>().chunks(chunk_size) {
        let chunk_futures = chunk
            .iter()
            .map(|(index, input)| run_one(*index, input.clone(), cfg, deps));
        let settled = futures::future::join_all(chunk_futures).await;
        for result in settled {
            callback(result.clone());
            slots[result.index] = Some(result);
        }
    }

    slots.into_iter().map(|slot| slot.expect("every index was populated by its chunk")).collect()
}

/// Re-runs a single previously produced item with its own comment text
/// excluded, preserving its index position in `results` (spec §4.7
/// "Retry of a single item").
pub async fn regenerate(
    results: &mut [BatchResult],
    index: usize,
    cfg: &Config,
    deps: &Dependencies,
) {
    let Some(slot) = results.get(index) else {
        return;
    };
    let location_name = slot.location_name.clone();
    let mut exclude_previous = HashSet::new();
    if let Some(output) = &slot.output {
        exclude_previous.insert(output.comment.clone());
        exclude_previous.insert(output.advice_comment.clone());
    }

    let input = BatchInput {
        location_name,
        llm_provider_name: None,
        use_unified_path: None,
        evaluation_mode: None,
        exclude_previous,
    };
    let result = run_one(index, input, cfg, deps).await;
    results[index] = result;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;
    use crate::corpus::CorpusRepository;
    use crate::domain::location::SpatialIndex;
    use crate::domain::weather::{ForecastCollection, WeatherCondition, WeatherForecast, WindDirection};
    use crate::error::WeatherFetchError;
    use crate::forecast::ForecastService;
    use crate::history::HistoryStore;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use std::sync::Arc;

    struct StubWeatherAdapter;
    #[async_trait]
    impl crate::forecast::WeatherAdapter for StubWeatherAdapter {
        async fn fetch(
            &self,
            location_id: &str,
            _lat: f64,
            _lon: f64,
            target: DateTime<Utc>,
        ) -> Result<ForecastCollection, WeatherFetchError> {
            Ok(ForecastCollection::new(
                location_id,
                vec![WeatherForecast {
                    location_id: location_id.to_string(),
                    datetime_utc: target,
                    condition: WeatherCondition::Clear,
                    precipitation_mm: 0.0,
                    temperature_c: 21.0,
                    feels_like_c: 21.0,
                    humidity_pct: 45.0,
                    pressure_hpa: 1012.0,
                    wind_speed_mps: 2.0,
                    wind_direction: WindDirection::N,
                    cloud_coverage_pct: 10.0,
                    visibility_m: 10_000.0,
                    uv_index: 4.0,
                }],
            ))
        }
    }

    fn write_csv(dir: &std::path::Path, name: &str, contents: &str) {
        std::fs::write(dir.join(name), contents).unwrap();
    }

    async fn test_deps(corpus_dir: &std::path::Path, cache_dir: &std::path::Path) -> Dependencies {
        let corpus = CorpusRepository::new(corpus_dir).unwrap();
        let forecast = ForecastService::new(
            &CacheConfig::default(),
            cache_dir,
            SpatialIndex::new(),
            Arc::new(StubWeatherAdapter),
        );
        Dependencies {
            forecast,
            corpus,
            llm: None,
            history: HistoryStore::new(cache_dir.join("history.jsonl")),
        }
    }

    #[tokio::test]
    async fn run_batch_preserves_index_order_despite_completion_order() {
        let corpus_dir = tempfile::tempdir().unwrap();
        let cache_dir = tempfile::tempdir().unwrap();
        write_csv(
            corpus_dir.path(),
            "summer_weather_comment_enhanced100.csv",
            "weather_comment,count\nclear and mild,10\n",
        );
        write_csv(
            corpus_dir.path(),
            "summer_advice_enhanced100.csv",
            "advice,count\ndress light,10\n",
        );
        let deps = test_deps(corpus_dir.path(), cache_dir.path()).await;
        let mut cfg = Config::default();
        cfg.batch.max_parallel_workers = 2;

        let inputs = vec![
            BatchInput::new("Tokyo"),
            BatchInput::new("Osaka"),
            BatchInput::new("Nagoya"),
        ];
        let mut seen_order = Vec::new();
        let results = run_batch(inputs, &cfg, &deps, |result| seen_order.push(result.index)).await;

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].location_name, "Tokyo");
        assert_eq!(results[1].location_name, "Osaka");
        assert_eq!(results[2].location_name, "Nagoya");
        assert!(results.iter().all(|r| r.success));
        let mut sorted_seen = seen_order.clone();
        sorted_seen.sort_unstable();
        assert_eq!(sorted_seen, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn unknown_location_is_isolated_as_a_failed_item() {
        let corpus_dir = tempfile::tempdir().unwrap();
        let cache_dir = tempfile::tempdir().unwrap();
        write_csv(
            corpus_dir.path(),
            "summer_weather_comment_enhanced100.csv",
            "weather_comment,count\nclear and mild,10\n",
        );
        write_csv(
            corpus_dir.path(),
            "summer_advice_enhanced100.csv",
            "advice,count\ndress light,10\n",
        );
        let deps = test_deps(corpus_dir.path(), cache_dir.path()).await;
        let cfg = Config::default();

        let inputs = vec![BatchInput::new("Tokyo"), BatchInput::new("Nowhereville")];
        let results = run_batch(inputs, &cfg, &deps, |_| {}).await;

        assert!(results[0].success);
        assert!(!results[1].success);
        let stats = BatchStats::from_results(&results);
        assert_eq!(stats.processed, 2);
        assert_eq!(stats.succeeded, 1);
        assert_eq!(stats.errored, 1);
    }

    #[tokio::test]
    async fn regenerate_reruns_a_single_index_in_place() {
        let corpus_dir = tempfile::tempdir().unwrap();
        let cache_dir = tempfile::tempdir().unwrap();
        write_csv(
            corpus_dir.path(),
            "summer_weather_comment_enhanced100.csv",
            "weather_comment,count\nclear and mild,10\n",
        );
        write_csv(
            corpus_dir.path(),
            "summer_advice_enhanced100.csv",
            "advice,count\ndress light,10\n",
        );
        let deps = test_deps(corpus_dir.path(), cache_dir.path()).await;
        let cfg = Config::default();

        let inputs = vec![BatchInput::new("Tokyo")];
        let mut results = run_batch(inputs, &cfg, &deps, |_| {}).await;
        assert!(results[0].success);

        regenerate(&mut results, 0, &cfg, &deps).await;
        assert_eq!(results.len(), 1);
        assert!(results[0].success);
        assert_eq!(results[0].index, 0);
    }
}
