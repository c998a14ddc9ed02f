//! End-to-end generation scenarios driven through the public
//! `run_generation` entry point, with scripted weather/LLM collaborators
//! standing in for the network (spec §8).

mod common;

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use comment_gen_engine::config::Config;
use comment_gen_engine::domain::weather::WeatherCondition;
use comment_gen_engine::forecast::WeatherAdapter;
use comment_gen_engine::llm::LlmAdapter;
use comment_gen_engine::validator::EvaluationMode;
use comment_gen_engine::workflow::{run_generation, GenerationInput};

use common::{build_dependencies, template, write_csv, ScenarioWeatherAdapter, ScriptedLlm};

fn classic_input(location: &str, target: chrono::DateTime<Utc>) -> GenerationInput {
    GenerationInput {
        location_name: location.to_string(),
        target_datetime: Some(target),
        use_unified_path: Some(false),
        evaluation_mode: Some(EvaluationMode::Strict),
        ..GenerationInput::default()
    }
}

#[tokio::test]
async fn rainy_tokyo_produces_a_short_umbrella_comment() {
    let corpus_dir = tempfile::tempdir().unwrap();
    let cache_dir = tempfile::tempdir().unwrap();
    write_csv(
        corpus_dir.path(),
        "summer_weather_comment_enhanced100.csv",
        "weather_comment,count\nrain due soon,10\n",
    );
    write_csv(
        corpus_dir.path(),
        "summer_advice_enhanced100.csv",
        "advice,count\nbring umbrella,10\n",
    );

    let adapter: Arc<dyn WeatherAdapter> = Arc::new(
        ScenarioWeatherAdapter::new().with_forecast("tokyo", template(WeatherCondition::Rainy, 19.0, 88.0, 6.0, 4.0)),
    );
    let llm: Arc<dyn LlmAdapter> = Arc::new(ScriptedLlm::new(
        "weather: rain due soon\nadvice: bring umbrella",
        "weather: rain due soon\nadvice: bring umbrella",
    ));
    let deps = build_dependencies(corpus_dir.path(), cache_dir.path(), adapter, Some(llm));
    let cfg = Config::default();

    let target = Utc.with_ymd_and_hms(2024, 7, 15, 9, 0, 0).unwrap();
    let output = run_generation(classic_input("Tokyo", target), &cfg, &deps).await;

    assert!(output.success, "{:?}", output.error);
    assert_eq!(output.comment, "rain due soon");
    assert!(output.advice_comment.to_lowercase().contains("umbrella"));
    assert!(output.comment.chars().count() <= 15);
    let metadata = output.metadata.unwrap();
    assert!(!metadata.forced);
    assert_eq!(metadata.retry_count, 0);
}

#[tokio::test]
async fn heat_stroke_day_in_osaka_requires_heat_stroke_vocabulary() {
    let corpus_dir = tempfile::tempdir().unwrap();
    let cache_dir = tempfile::tempdir().unwrap();
    write_csv(
        corpus_dir.path(),
        "summer_weather_comment_enhanced100.csv",
        "weather_comment,count\nsunny all day,10\n",
    );
    write_csv(
        corpus_dir.path(),
        "summer_advice_enhanced100.csv",
        "advice,count\ncaution hydrate,10\n",
    );

    let adapter: Arc<dyn WeatherAdapter> = Arc::new(
        ScenarioWeatherAdapter::new().with_forecast("osaka", template(WeatherCondition::Clear, 36.1, 52.0, 0.0, 2.0)),
    );
    let llm: Arc<dyn LlmAdapter> = Arc::new(ScriptedLlm::new(
        "weather: sunny all day\nadvice: caution hydrate",
        "weather: sunny all day\nadvice: caution hydrate",
    ));
    let deps = build_dependencies(corpus_dir.path(), cache_dir.path(), adapter, Some(llm));
    let cfg = Config::default();

    let target = Utc.with_ymd_and_hms(2024, 7, 15, 9, 0, 0).unwrap();
    let output = run_generation(classic_input("Osaka", target), &cfg, &deps).await;

    assert!(output.success, "{:?}", output.error);
    let advice = output.advice_comment.to_lowercase();
    assert!(advice.contains("hydrate"));
    assert!(!output.comment.to_lowercase().contains("cold"));
    assert!(!output.comment.to_lowercase().contains("chilly"));
}

#[tokio::test]
async fn contradictory_reply_on_rainy_forecast_retries_to_exhaustion_then_forces() {
    let corpus_dir = tempfile::tempdir().unwrap();
    let cache_dir = tempfile::tempdir().unwrap();
    write_csv(
        corpus_dir.path(),
        "summer_weather_comment_enhanced100.csv",
        "weather_comment,count\nclear sky today,10\n",
    );
    write_csv(
        corpus_dir.path(),
        "summer_advice_enhanced100.csv",
        "advice,count\nenjoy the day,10\n",
    );

    let adapter: Arc<dyn WeatherAdapter> = Arc::new(
        ScenarioWeatherAdapter::new().with_forecast("tokyo", template(WeatherCondition::Rainy, 18.0, 70.0, 8.0, 3.0)),
    );
    let llm: Arc<dyn LlmAdapter> = Arc::new(ScriptedLlm::new(
        "weather: clear sky today\nadvice: enjoy the day",
        "weather: clear sky today\nadvice: enjoy the day",
    ));
    let deps = build_dependencies(corpus_dir.path(), cache_dir.path(), adapter, Some(llm));
    let cfg = Config::default();

    let target = Utc.with_ymd_and_hms(2024, 7, 15, 9, 0, 0).unwrap();
    let output = run_generation(classic_input("Tokyo", target), &cfg, &deps).await;

    assert!(output.success, "{:?}", output.error);
    assert_eq!(output.comment, "clear sky today");
    let metadata = output.metadata.unwrap();
    assert!(metadata.forced);
    assert_eq!(metadata.retry_count, cfg.max_evaluation_retries);
}

#[tokio::test]
async fn snow_mention_in_okinawa_is_rejected_then_forced_after_retries() {
    let corpus_dir = tempfile::tempdir().unwrap();
    let cache_dir = tempfile::tempdir().unwrap();
    write_csv(
        corpus_dir.path(),
        "summer_weather_comment_enhanced100.csv",
        "weather_comment,count\nsnow flurries tonight,10\n",
    );
    write_csv(
        corpus_dir.path(),
        "summer_advice_enhanced100.csv",
        "advice,count\nstay safe,10\n",
    );

    let adapter: Arc<dyn WeatherAdapter> = Arc::new(
        ScenarioWeatherAdapter::new().with_forecast("naha", template(WeatherCondition::Clear, 20.0, 50.0, 0.0, 2.0)),
    );
    let llm: Arc<dyn LlmAdapter> = Arc::new(ScriptedLlm::new(
        "weather: snow flurries tonight\nadvice: stay safe",
        "weather: snow flurries tonight\nadvice: stay safe",
    ));
    let deps = build_dependencies(corpus_dir.path(), cache_dir.path(), adapter, Some(llm));
    let cfg = Config::default();

    let target = Utc.with_ymd_and_hms(2024, 7, 15, 9, 0, 0).unwrap();
    let output = run_generation(classic_input("Naha", target), &cfg, &deps).await;

    assert!(output.success, "{:?}", output.error);
    assert!(output.comment.to_lowercase().contains("snow"));
    let metadata = output.metadata.unwrap();
    assert!(metadata.forced);
    assert_eq!(metadata.retry_count, cfg.max_evaluation_retries);
}
