//! Node Implementations (C2): the eight stage handlers plus the unified
//! fast-path node (spec §4.2). Each node reads/writes the shared
//! [`GenerationState`] and is driven by [`super::run_generation`].

use std::collections::HashSet;

use crate::config::Config;
use crate::corpus::CorpusRepository;
use crate::dependencies::Dependencies;
use crate::domain::comment::{CommentPair, CommentType, PastComment};
use crate::domain::season::derive_season;
use crate::domain::state::GenerationState;
use crate::error::WorkflowError;
use crate::llm::{parse_labeled_reply, LlmOptions};
use crate::locations;
use crate::validator::{EvaluationMode, ValidatorPipeline};

/// Resolves `state.location_name` against the static location table and
/// fails fast with [`WorkflowError::LocationNotFound`] if it doesn't
/// match (spec §4.2 Input).
pub async fn input_node(state: &mut GenerationState) -> Result<(), WorkflowError> {
    let location = locations::find(&state.location_name)
        .ok_or_else(|| WorkflowError::LocationNotFound(state.location_name.clone()))?;
    if !location.is_valid() {
        return Err(WorkflowError::LocationNotFound(state.location_name.clone()));
    }
    state.resolved_location = Some(location.clone());
    Ok(())
}

/// Fetches a forecast collection covering `[target-12h, target+12h]` and
/// the sample closest to `target` (spec §4.2 FetchForecast).
pub async fn fetch_forecast_node(
    state: &mut GenerationState,
    deps: &Dependencies,
) -> Result<(), WorkflowError> {
    let location = state
        .resolved_location
        .clone()
        .ok_or_else(|| WorkflowError::Internal("FetchForecast ran before Input resolved a location".to_string()))?;

    let outcome = deps
        .forecast
        .get_forecast(&location.id, location.latitude, location.longitude, state.target_datetime)
        .await?;

    if let Some(from) = &outcome.spatial_borrow_from {
        let display_name = crate::domain::location::find_by_id(from).map_or_else(|| from.clone(), |loc| loc.name.clone());
        state.set_metadata("spatial_borrow", display_name);
        state.cache_hits += 1;
    } else {
        match outcome.served_from {
            crate::forecast::ServedFrom::MemoryCache | crate::forecast::ServedFrom::FileCache => {
                state.cache_hits += 1;
            }
            crate::forecast::ServedFrom::ExternalFetch => state.cache_misses += 1,
            crate::forecast::ServedFrom::SpatialBorrow => {}
        }
    }

    let at_target = outcome.collection.at(state.target_datetime).cloned();
    state.forecast = Some(outcome.collection);
    state.forecast_at_target = at_target;

    if state.forecast_at_target.is_none() {
        return Err(WorkflowError::WeatherFetch(crate::error::WeatherFetchError::new(
            crate::error::WeatherFetchErrorKind::Unknown,
            "forecast collection carried no sample near the target time",
        )));
    }
    Ok(())
}

/// Draws season-filtered weather/advice candidates from the corpus,
/// dropping anything already tried this run when `exclude_previous` is
/// set (spec §4.2 RetrieveCorpus).
pub async fn retrieve_corpus_node(
    state: &mut GenerationState,
    corpus: &CorpusRepository,
    cfg: &Config,
) -> Result<(), WorkflowError> {
    let season = derive_season(state.target_datetime);
    let empty = HashSet::new();
    let exclude = if state.exclude_previous { &state.previous_candidate_texts } else { &empty };
    let weather = corpus
        .get_filtered(season, CommentType::Weather, exclude, cfg.corpus_truncate_n)
        .await;
    let advice = corpus
        .get_filtered(season, CommentType::Advice, exclude, cfg.corpus_truncate_n)
        .await;
    state.corpus_subset.weather = weather;
    state.corpus_subset.advice = advice;
    Ok(())
}

fn available<'a>(pool: &'a [PastComment], excluded: &HashSet<String>) -> Vec<&'a PastComment> {
    pool.iter().filter(|c| !excluded.contains(&c.text)).collect()
}

/// Finds the pool entry whose text matches `reply` (trimmed,
/// case-insensitive), or `None` if nothing matches.
fn match_candidate<'a>(reply: &str, pool: &[&'a PastComment]) -> Option<&'a PastComment> {
    let needle = reply.trim().to_lowercase();
    pool.iter().copied().find(|c| c.text.to_lowercase() == needle)
}

fn forecast_summary(state: &GenerationState) -> String {
    match &state.forecast_at_target {
        Some(f) => format!(
            "condition={:?} temp={:.1}C humidity={:.0}% precip={:.1}mm/h wind={:.1}m/s",
            f.condition, f.temperature_c, f.humidity_pct, f.precipitation_mm, f.wind_speed_mps
        ),
        None => "no forecast sample available".to_string(),
    }
}

fn selection_prompt(state: &GenerationState, weather_pool: &[&PastComment], advice_pool: &[&PastComment]) -> String {
    let weather_list = weather_pool
        .iter()
        .enumerate()
        .map(|(i, c)| format!("{i}. {}", c.text))
        .collect::<Vec<_>>()
        .join("\n");
    let advice_list = advice_pool
        .iter()
        .enumerate()
        .map(|(i, c)| format!("{i}. {}", c.text))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "Forecast: {}\n\nCandidate weather comments:\n{weather_list}\n\nCandidate advice comments:\n{advice_list}\n\n\
         Selection priority: thunder > snow > rain > heat-stroke caution at temp>=35C > others.\n\
         Pick exactly one weather comment and one advice comment verbatim from the lists above.\n\
         Reply with exactly two lines:\nweather: <chosen weather comment>\nadvice: <chosen advice comment>",
        forecast_summary(state)
    )
}

/// Selects one weather/advice phrase from the corpus subset via an LLM
/// call, falling back to the first ranked candidate when the provider
/// is absent or its reply is unparseable (spec §4.2 SelectPair).
pub async fn select_pair_node(state: &mut GenerationState, deps: &Dependencies) -> Result<(), WorkflowError> {
    let empty = HashSet::new();
    let excluded = if state.exclude_previous { &state.previous_candidate_texts } else { &empty };
    let weather_pool = available(&state.corpus_subset.weather, excluded);
    let advice_pool = available(&state.corpus_subset.advice, excluded);

    let fallback_weather = weather_pool
        .first()
        .copied()
        .or_else(|| state.corpus_subset.weather.first())
        .cloned();
    let fallback_advice = advice_pool
        .first()
        .copied()
        .or_else(|| state.corpus_subset.advice.first())
        .cloned();

    let Some(llm) = &deps.llm else {
        let (Some(weather), Some(advice)) = (fallback_weather, fallback_advice) else {
            return Err(WorkflowError::Internal("no corpus candidates available for selection".to_string()));
        };
        state.set_metadata("fallback", "selection");
        state.candidate = Some(CommentPair {
            weather,
            advice,
            similarity_score: None,
            adaptation_score: None,
        });
        return Ok(());
    };

    if weather_pool.is_empty() || advice_pool.is_empty() {
        let (Some(weather), Some(advice)) = (fallback_weather, fallback_advice) else {
            return Err(WorkflowError::Internal("no corpus candidates available for selection".to_string()));
        };
        state.set_metadata("fallback", "selection");
        state.candidate = Some(CommentPair {
            weather,
            advice,
            similarity_score: None,
            adaptation_score: None,
        });
        return Ok(());
    }

    let prompt = selection_prompt(state, &weather_pool, &advice_pool);
    let reply = llm.generate(&prompt, &LlmOptions::default()).await?;

    let parsed = parse_labeled_reply(&reply);
    let (weather, advice) = match parsed {
        Some((weather_text, advice_text)) => {
            let weather = match_candidate(&weather_text, &weather_pool).cloned().or(fallback_weather);
            let advice = match_candidate(&advice_text, &advice_pool).cloned().or(fallback_advice);
            match (weather, advice) {
                (Some(w), Some(a)) => (w, a),
                _ => return Err(WorkflowError::Internal("no corpus candidates available for selection".to_string())),
            }
        }
        None => {
            state.set_metadata("fallback", "selection");
            match (fallback_weather, fallback_advice) {
                (Some(w), Some(a)) => (w, a),
                _ => return Err(WorkflowError::Internal("no corpus candidates available for selection".to_string())),
            }
        }
    };

    state.candidate = Some(CommentPair {
        weather,
        advice,
        similarity_score: None,
        adaptation_score: None,
    });
    Ok(())
}

/// Runs the Validator Pipeline over the current candidate (spec §4.2
/// EvaluateCandidate). No LLM call.
pub fn evaluate_candidate_node(state: &mut GenerationState, cfg: &Config, mode: EvaluationMode) -> Result<(), WorkflowError> {
    let candidate = state
        .candidate
        .as_ref()
        .ok_or_else(|| WorkflowError::Internal("EvaluateCandidate ran with no candidate selected".to_string()))?;
    let forecast = state
        .forecast_at_target
        .as_ref()
        .ok_or_else(|| WorkflowError::Internal("EvaluateCandidate ran with no forecast".to_string()))?;
    let location = state
        .resolved_location
        .as_ref()
        .ok_or_else(|| WorkflowError::Internal("EvaluateCandidate ran with no resolved location".to_string()))?;

    let pipeline = ValidatorPipeline::new(mode, cfg.thresholds, cfg.validator.clone());
    state.validation = pipeline.evaluate(candidate, forecast, location);
    Ok(())
}

fn adaptation_prompt(candidate: &CommentPair, state: &GenerationState, cfg: &Config) -> String {
    format!(
        "Forecast: {}\n\nValidated pair:\nweather: {}\nadvice: {}\n\n\
         Rephrase each line to at most {} characters, keeping the same meaning.\n\
         Do not use any of these words: {}.\n\
         Reply with exactly two lines:\nweather: <line>\nadvice: <line>",
        forecast_summary(state),
        candidate.weather.text,
        candidate.advice.text,
        cfg.validator.max_line_chars,
        cfg.validator.ng_words.join(", "),
    )
}

/// Adapts the validated pair into final short-form phrasing via a
/// second LLM call, re-validating the result and reverting to the
/// pre-adaptation text on failure (spec §4.2 GenerateComment).
pub async fn generate_comment_node(
    state: &mut GenerationState,
    deps: &Dependencies,
    cfg: &Config,
    mode: EvaluationMode,
) -> Result<(), WorkflowError> {
    let candidate = state
        .candidate
        .clone()
        .ok_or_else(|| WorkflowError::Internal("GenerateComment ran with no candidate selected".to_string()))?;

    let Some(llm) = &deps.llm else {
        state.final_weather = candidate.weather.text;
        state.final_advice = candidate.advice.text;
        return Ok(());
    };

    let prompt = adaptation_prompt(&candidate, state, cfg);
    let reply = llm.generate(&prompt, &LlmOptions::default()).await?;

    let Some((weather_text, advice_text)) = parse_labeled_reply(&reply) else {
        state.final_weather = candidate.weather.text;
        state.final_advice = candidate.advice.text;
        return Ok(());
    };

    let emitted = CommentPair {
        weather: PastComment {
            text: weather_text.trim().to_string(),
            ..candidate.weather.clone()
        },
        advice: PastComment {
            text: advice_text.trim().to_string(),
            ..candidate.advice.clone()
        },
        similarity_score: candidate.similarity_score,
        adaptation_score: Some(1),
    };

    let forecast = state.forecast_at_target.as_ref();
    let location = state.resolved_location.as_ref();
    let accepted = match (forecast, location) {
        (Some(forecast), Some(location)) => {
            let pipeline = ValidatorPipeline::new(mode, cfg.thresholds, cfg.validator.clone());
            pipeline.evaluate(&emitted, forecast, location).ok
        }
        _ => false,
    };

    if accepted {
        state.final_weather = emitted.weather.text;
        state.final_advice = emitted.advice.text;
    } else {
        state.final_weather = candidate.weather.text;
        state.final_advice = candidate.advice.text;
    }
    Ok(())
}

fn unified_prompt(state: &GenerationState, weather_pool: &[&PastComment], advice_pool: &[&PastComment], cfg: &Config) -> String {
    let weather_list = weather_pool
        .iter()
        .enumerate()
        .map(|(i, c)| format!("{i}. {}", c.text))
        .collect::<Vec<_>>()
        .join("\n");
    let advice_list = advice_pool
        .iter()
        .enumerate()
        .map(|(i, c)| format!("{i}. {}", c.text))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "Forecast: {}\n\nCandidate weather comments:\n{weather_list}\n\nCandidate advice comments:\n{advice_list}\n\n\
         Selection priority: thunder > snow > rain > heat-stroke caution at temp>=35C > others.\n\
         Choose one weather comment and one advice comment verbatim from the lists, then rephrase each to at \
         most {} characters without contradicting the forecast. Avoid these words: {}.\n\
         Reply with exactly four lines:\nselected_weather: <verbatim choice>\nselected_advice: <verbatim choice>\n\
         weather: <adapted line>\nadvice: <adapted line>",
        forecast_summary(state),
        cfg.validator.max_line_chars,
        cfg.validator.ng_words.join(", "),
    )
}

/// ASCII labels only, so stripping by byte length is safe regardless of
/// the original line's case (mirrors [`crate::llm::parse_labeled_reply`]).
fn strip_label<'a>(line: &'a str, label: &str) -> Option<&'a str> {
    if line.to_lowercase().starts_with(label) {
        Some(line[label.len()..].trim())
    } else {
        None
    }
}

fn parse_unified_reply(text: &str) -> Option<(String, String, String, String)> {
    let mut selected_weather = None;
    let mut selected_advice = None;
    let mut weather = None;
    let mut advice = None;
    for line in text.lines() {
        let trimmed = line.trim();
        if let Some(rest) = strip_label(trimmed, "selected_weather:") {
            selected_weather = Some(rest.to_string());
        } else if let Some(rest) = strip_label(trimmed, "selected_advice:") {
            selected_advice = Some(rest.to_string());
        } else if let Some(rest) = strip_label(trimmed, "weather:") {
            weather = Some(rest.to_string());
        } else if let Some(rest) = strip_label(trimmed, "advice:") {
            advice = Some(rest.to_string());
        }
    }
    Some((selected_weather?, selected_advice?, weather?, advice?))
}

/// The fast path: one LLM call carrying selection + adaptation +
/// validation-aware instructions (spec §4.2 UnifiedSelectGenerate).
/// Returns `Err` on any LLM/parse/validation failure so the caller can
/// fall back to the classic path exactly once (spec §4.1 "Unified fast
/// path").
pub async fn unified_select_generate_node(
    state: &mut GenerationState,
    deps: &Dependencies,
    cfg: &Config,
    mode: EvaluationMode,
) -> Result<(), WorkflowError> {
    let llm = deps
        .llm
        .as_ref()
        .ok_or_else(|| WorkflowError::Internal("unified path requires an LLM provider".to_string()))?;

    let empty = HashSet::new();
    let excluded = if state.exclude_previous { &state.previous_candidate_texts } else { &empty };
    let weather_pool = available(&state.corpus_subset.weather, excluded);
    let advice_pool = available(&state.corpus_subset.advice, excluded);
    if weather_pool.is_empty() || advice_pool.is_empty() {
        return Err(WorkflowError::Internal("no corpus candidates available for unified selection".to_string()));
    }

    let prompt = unified_prompt(state, &weather_pool, &advice_pool, cfg);
    let reply = llm.generate(&prompt, &LlmOptions::default()).await?;

    let (selected_weather, selected_advice, final_weather, final_advice) = parse_unified_reply(&reply)
        .ok_or_else(|| WorkflowError::Internal("unified reply did not contain all four labeled lines".to_string()))?;

    let weather = match_candidate(&selected_weather, &weather_pool)
        .cloned()
        .ok_or_else(|| WorkflowError::Internal("unified reply selected an unknown weather comment".to_string()))?;
    let advice = match_candidate(&selected_advice, &advice_pool)
        .cloned()
        .ok_or_else(|| WorkflowError::Internal("unified reply selected an unknown advice comment".to_string()))?;

    let emitted = CommentPair {
        weather: PastComment {
            text: final_weather.trim().to_string(),
            ..weather.clone()
        },
        advice: PastComment {
            text: final_advice.trim().to_string(),
            ..advice.clone()
        },
        similarity_score: None,
        adaptation_score: Some(1),
    };

    let forecast = state
        .forecast_at_target
        .as_ref()
        .ok_or_else(|| WorkflowError::Internal("unified path ran with no forecast".to_string()))?;
    let location = state
        .resolved_location
        .as_ref()
        .ok_or_else(|| WorkflowError::Internal("unified path ran with no resolved location".to_string()))?;

    let pipeline = ValidatorPipeline::new(mode, cfg.thresholds, cfg.validator.clone());
    let outcome = pipeline.evaluate(&emitted, forecast, location);
    if !outcome.ok {
        return Err(WorkflowError::ValidationFailed(outcome.reasons));
    }

    state.candidate = Some(CommentPair {
        weather,
        advice,
        similarity_score: None,
        adaptation_score: None,
    });
    state.validation = outcome;
    state.final_weather = emitted.weather.text;
    state.final_advice = emitted.advice.text;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::season::Season;

    fn comment(text: &str, ty: CommentType) -> PastComment {
        PastComment {
            text: text.to_string(),
            comment_type: ty,
            season: Season::Summer,
            count: 1,
        }
    }

    #[test]
    fn match_candidate_is_case_insensitive_and_trims() {
        let a = comment("Sunny skies", CommentType::Weather);
        let pool = vec![&a];
        assert!(match_candidate("  sunny skies  ", &pool).is_some());
        assert!(match_candidate("nonexistent", &pool).is_none());
    }

    #[test]
    fn parse_unified_reply_requires_all_four_labels() {
        let text = "selected_weather: a\nselected_advice: b\nweather: c\nadvice: d";
        assert_eq!(
            parse_unified_reply(text),
            Some(("a".to_string(), "b".to_string(), "c".to_string(), "d".to_string()))
        );
        assert!(parse_unified_reply("selected_weather: a\nweather: c\nadvice: d").is_none());
    }

    #[tokio::test]
    async fn input_node_fails_for_unknown_location() {
        let mut state = GenerationState::new("Nowhereville", chrono::Utc::now());
        let result = input_node(&mut state).await;
        assert!(matches!(result, Err(WorkflowError::LocationNotFound(_))));
    }

    #[tokio::test]
    async fn input_node_resolves_known_location() {
        let mut state = GenerationState::new("Tokyo", chrono::Utc::now());
        input_node(&mut state).await.unwrap();
        assert_eq!(state.resolved_location.unwrap().name, "Tokyo");
    }
}
