//! Workflow Engine (C1): the typed state machine driving the eight
//! nodes in C2, with conditional edges and a bounded retry loop (spec
//! §4.1).
//!
//! Maps the source's conditional-edge graph onto a fixed eight-node
//! shape (spec §9 Design Note) rather than a general graph library: the
//! classic path is an explicit `loop` with an `if`-edge, and the unified
//! fast path is an orthogonal flag that short-circuits straight to
//! [`nodes::unified_select_generate_node`] with a one-shot fallback to
//! the classic path on failure.

pub mod nodes;

use std::collections::HashSet;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::Config;
use crate::dependencies::Dependencies;
use crate::domain::location::Location;
use crate::domain::season::default_target_datetime;
use crate::domain::state::GenerationState;
use crate::domain::weather::WeatherForecast;
use crate::error::WorkflowError;
use crate::history::HistoryRecord;
use crate::validator::EvaluationMode;

/// Request shape feeding the Input node (spec §4.2 Input, §6.1
/// `POST /api/generate` body).
#[derive(Debug, Clone, Default)]
pub struct GenerationInput {
    pub location_name: String,
    /// Defaults to next-day 09:00 JST when omitted, computed here rather
    /// than deep inside a node so [`GenerationState::target_datetime`]
    /// can stay a plain `DateTime<Utc>` (spec §4.2 Input).
    pub target_datetime: Option<DateTime<Utc>>,
    pub llm_provider_name: Option<String>,
    pub use_unified_path: Option<bool>,
    pub use_indexed_corpus: Option<bool>,
    pub exclude_previous: Option<bool>,
    pub evaluation_mode: Option<EvaluationMode>,
    /// Seeds the exclusion set for a `regenerate(index)` re-run (spec
    /// §4.7 "Retry of a single item").
    pub seed_excluded_texts: HashSet<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WeatherTimelineSummary {
    pub summary: String,
    pub past_forecasts: Vec<WeatherForecast>,
    pub future_forecasts: Vec<WeatherForecast>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherOutput {
    pub current: Option<WeatherForecast>,
    pub forecast: Vec<WeatherForecast>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerationMetadata {
    pub temperature: f32,
    pub weather_condition: String,
    pub wind_speed: f32,
    pub humidity: f32,
    pub weather_forecast_time: DateTime<Utc>,
    pub weather_timeline: WeatherTimelineSummary,
    pub selected_weather_comment: String,
    pub selected_advice_comment: String,
    pub node_execution_times: Vec<crate::domain::state::NodeTiming>,
    pub forced: bool,
    pub spatial_borrow: Option<String>,
    pub fallback: Option<String>,
    pub retry_count: u32,
    pub used_unified_path: bool,
    pub unified_fallback: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerationSettings {
    pub llm_provider: Option<String>,
    pub use_unified_path: bool,
    pub evaluation_mode: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
    pub details: Vec<String>,
}

/// `POST /api/generate` response shape (spec §6.1), expressed as a
/// plain serde struct so an eventual HTTP layer is a thin shim (SPEC_FULL
/// §6 "Library entry points").
#[derive(Debug, Clone, Serialize)]
pub struct GenerationOutput {
    pub id: String,
    pub success: bool,
    pub comment: String,
    pub advice_comment: String,
    pub weather: Option<WeatherOutput>,
    pub metadata: Option<GenerationMetadata>,
    pub timestamp: DateTime<Utc>,
    pub confidence: Option<f32>,
    pub location: Option<Location>,
    pub settings: GenerationSettings,
    pub error: Option<ErrorPayload>,
}

fn mode_label(mode: EvaluationMode) -> &'static str {
    match mode {
        EvaluationMode::Strict => "strict",
        EvaluationMode::Moderate => "moderate",
        EvaluationMode::Relaxed => "relaxed",
    }
}

/// Validator score normalized into the API's `confidence` field (spec §9
/// Open Question resolution: the validator's normalized score, `1.0`
/// when the pair passed cleanly and wasn't forced through).
fn confidence_for(state: &GenerationState) -> Option<f32> {
    if state.candidate.is_none() {
        return None;
    }
    let forced = state.metadata.get("forced").and_then(serde_json::Value::as_bool).unwrap_or(false);
    if !forced && state.validation.ok {
        Some(1.0)
    } else {
        Some(state.validation.score)
    }
}

fn build_output(
    state: &GenerationState,
    success: bool,
    error: Option<&WorkflowError>,
    use_unified_path_requested: bool,
    unified_fallback: bool,
    mode: EvaluationMode,
) -> GenerationOutput {
    let timestamp = Utc::now();
    let id = format!(
        "{}-{}",
        state.resolved_location.as_ref().map_or("unknown", |l| l.id.as_str()),
        timestamp.timestamp_millis()
    );

    let weather = state.forecast.as_ref().map(|collection| WeatherOutput {
        current: state.forecast_at_target.clone(),
        forecast: collection.samples.clone(),
    });

    let metadata = state.forecast_at_target.as_ref().map(|f| {
        let timeline = state
            .forecast
            .as_ref()
            .map(|c| c.timeline(state.target_datetime))
            .unwrap_or(crate::domain::weather::Timeline {
                past_12h: None,
                at_target: None,
                plus_3h: None,
                plus_6h: None,
                plus_9h: None,
                plus_12h: None,
            });
        GenerationMetadata {
            temperature: f.temperature_c,
            weather_condition: format!("{:?}", f.condition),
            wind_speed: f.wind_speed_mps,
            humidity: f.humidity_pct,
            weather_forecast_time: f.datetime_utc,
            weather_timeline: WeatherTimelineSummary {
                summary: format!("{:?} around {}", f.condition, state.target_datetime),
                past_forecasts: [timeline.past_12h].into_iter().flatten().collect(),
                future_forecasts: [timeline.plus_3h, timeline.plus_6h, timeline.plus_9h, timeline.plus_12h]
                    .into_iter()
                    .flatten()
                    .collect(),
            },
            selected_weather_comment: state.candidate.as_ref().map(|c| c.weather.text.clone()).unwrap_or_default(),
            selected_advice_comment: state.candidate.as_ref().map(|c| c.advice.text.clone()).unwrap_or_default(),
            node_execution_times: state.node_timings.clone(),
            forced: state.metadata.get("forced").and_then(serde_json::Value::as_bool).unwrap_or(false),
            spatial_borrow: state
                .metadata
                .get("spatial_borrow")
                .and_then(serde_json::Value::as_str)
                .map(str::to_string),
            fallback: state
                .metadata
                .get("fallback")
                .and_then(serde_json::Value::as_str)
                .map(str::to_string),
            retry_count: state.retry_count,
            used_unified_path: use_unified_path_requested && !unified_fallback,
            unified_fallback,
        }
    });

    GenerationOutput {
        id,
        success,
        comment: state.final_weather.clone(),
        advice_comment: state.final_advice.clone(),
        weather,
        metadata,
        timestamp,
        confidence: confidence_for(state),
        location: state.resolved_location.clone(),
        settings: GenerationSettings {
            llm_provider: state.llm_provider_name.clone(),
            use_unified_path: state.use_unified_path,
            evaluation_mode: mode_label(mode),
        },
        error: error.map(|err| ErrorPayload {
            code: err.code().to_string(),
            message: err.to_string(),
            details: state.errors.clone(),
        }),
    }
}

/// Runs `step`, recording its wall-clock time under `name` in
/// `state.node_timings` regardless of outcome (spec §4.1 Observability).
macro_rules! timed_step {
    ($state:expr, $name:expr, $step:expr) => {{
        let start = Instant::now();
        let result = $step;
        $state.record_node($name, start.elapsed());
        result
    }};
}

/// Executes the eight-node state machine for one location (spec §4.1
/// `run`). Never returns `Err`: unrecoverable node failures are folded
/// into a `success=false` [`GenerationOutput`] instead of propagating,
/// per spec §4.1's contract.
pub async fn run_generation(input: GenerationInput, cfg: &Config, deps: &Dependencies) -> GenerationOutput {
    let target = input.target_datetime.unwrap_or_else(|| default_target_datetime(Utc::now()));
    let mut state = GenerationState::new(input.location_name.clone(), target);
    state.llm_provider_name = input.llm_provider_name.clone();
    state.use_unified_path = input.use_unified_path.unwrap_or(true) && deps.llm.is_some();
    state.use_indexed_corpus = input.use_indexed_corpus.unwrap_or(false);
    state.exclude_previous = input.exclude_previous.unwrap_or(false);
    state.previous_candidate_texts = input.seed_excluded_texts.clone();
    let mode = input.evaluation_mode.unwrap_or(EvaluationMode::Strict);
    let use_unified_requested = state.use_unified_path;

    macro_rules! fail_out {
        ($err:expr) => {{
            let err = $err;
            state.push_error(err.to_string());
            let output = build_output(&state, false, Some(&err), use_unified_requested, false, mode);
            record_history(deps, &state, &output).await;
            return output;
        }};
    }

    if let Err(err) = timed_step!(state, "Input", nodes::input_node(&mut state).await) {
        fail_out!(err);
    }
    if let Err(err) = timed_step!(state, "FetchForecast", nodes::fetch_forecast_node(&mut state, deps).await) {
        fail_out!(err);
    }
    if let Err(err) = timed_step!(
        state,
        "RetrieveCorpus",
        nodes::retrieve_corpus_node(&mut state, &deps.corpus, cfg).await
    ) {
        fail_out!(err);
    }

    let mut unified_fallback = false;
    if state.use_unified_path {
        let unified_result = timed_step!(
            state,
            "UnifiedSelectGenerate",
            nodes::unified_select_generate_node(&mut state, deps, cfg, mode).await
        );
        match unified_result {
            Ok(()) => {}
            Err(err) => {
                state.push_error(format!("unified path failed, falling back to classic path: {err}"));
                state.use_unified_path = false;
                unified_fallback = true;
            }
        }
    }

    if !state.use_unified_path {
        loop {
            if let Err(err) = timed_step!(state, "SelectPair", nodes::select_pair_node(&mut state, deps).await) {
                fail_out!(err);
            }

            if deps.llm.is_some() {
                if let Err(err) = timed_step!(
                    state,
                    "EvaluateCandidate",
                    nodes::evaluate_candidate_node(&mut state, cfg, mode)
                ) {
                    fail_out!(err);
                }

                if !state.validation.ok && state.retry_count < cfg.max_evaluation_retries {
                    state.retry_count += 1;
                    if let Some(candidate) = &state.candidate {
                        state.previous_candidate_texts.insert(candidate.weather.text.clone());
                        state.previous_candidate_texts.insert(candidate.advice.text.clone());
                    }
                    continue;
                }
                if !state.validation.ok {
                    state.set_metadata("forced", true);
                }
            }
            break;
        }

        if let Err(err) = timed_step!(
            state,
            "GenerateComment",
            nodes::generate_comment_node(&mut state, deps, cfg, mode).await
        ) {
            fail_out!(err);
        }
    }

    let output = timed_step!(state, "OutputBuild", {
        build_output(&state, true, None, use_unified_requested, unified_fallback, mode)
    });
    record_history(deps, &state, &output).await;
    output
}

/// Best-effort append to the generation history; failures are logged,
/// never surfaced (mirrors cache-error demotion, spec §7).
async fn record_history(deps: &Dependencies, state: &GenerationState, output: &GenerationOutput) {
    let record = HistoryRecord {
        timestamp_utc: output.timestamp,
        location_id: state.resolved_location.as_ref().map_or_else(|| state.location_name.clone(), |l| l.id.clone()),
        llm_provider: state.llm_provider_name.clone().unwrap_or_else(|| "none".to_string()),
        success: output.success,
        weather_text: output.success.then(|| output.comment.clone()),
        advice_text: output.success.then(|| output.advice_comment.clone()),
        error: output.error.as_ref().map(|e| e.message.clone()),
    };
    if let Err(err) = deps.history.append(&record).await {
        tracing::warn!(error = %err, "failed to append generation history");
    }
}
