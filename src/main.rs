//! One-shot CLI driver: parses arguments, builds real collaborators, runs
//! one generation (or a batch across several locations), and prints the
//! result as JSON. Mirrors the teacher's `--one-shot` /
//! `print_one_shot_*` convention — this binary has no interactive mode,
//! since a front end beyond this is out of scope.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use comment_gen_engine::config::{Config, LlmProviderKind};
use comment_gen_engine::dependencies::Dependencies;
use comment_gen_engine::domain::location::SpatialIndex;
use comment_gen_engine::domain::Location;
use comment_gen_engine::forecast::{HttpWeatherAdapter, WeatherAdapter};
use comment_gen_engine::history::HistoryStore;
use comment_gen_engine::llm::{HttpLlmAdapter, LlmAdapter};
use comment_gen_engine::locations;
use comment_gen_engine::validator::EvaluationMode;
use comment_gen_engine::{batch, run_generation, BatchInput, GenerationInput};

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
enum EvaluationModeArg {
    Strict,
    Moderate,
    Relaxed,
}

impl From<EvaluationModeArg> for EvaluationMode {
    fn from(value: EvaluationModeArg) -> Self {
        match value {
            EvaluationModeArg::Strict => Self::Strict,
            EvaluationModeArg::Moderate => Self::Moderate,
            EvaluationModeArg::Relaxed => Self::Relaxed,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "comment-gen", version, about = "Weather comment generation engine")]
struct Cli {
    /// One or more location names (see `--list-locations`). More than
    /// one runs the batch orchestrator instead of a single generation.
    locations: Vec<String>,

    /// Print the known location table and exit.
    #[arg(long)]
    list_locations: bool,

    /// LLM provider override (defaults to `Config::default_llm_provider`).
    #[arg(long, value_enum)]
    provider: Option<ProviderArg>,

    /// Validator evaluation mode.
    #[arg(long, value_enum, default_value_t = EvaluationModeArg::Strict)]
    mode: EvaluationModeArg,

    /// Disable the unified fast path, forcing the classic select/evaluate/generate loop.
    #[arg(long)]
    classic: bool,

    /// Directory containing the `<season>_<type>_enhanced100.csv` corpus files.
    #[arg(long, default_value = "corpus")]
    corpus_dir: PathBuf,

    /// Directory for the on-disk forecast cache (L2).
    #[arg(long, default_value = "cache")]
    cache_dir: PathBuf,

    /// Append-only generation history file.
    #[arg(long, default_value = "history.jsonl")]
    history_path: PathBuf,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
enum ProviderArg {
    Openai,
    Anthropic,
    Gemini,
}

impl From<ProviderArg> for LlmProviderKind {
    fn from(value: ProviderArg) -> Self {
        match value {
            ProviderArg::Openai => Self::Openai,
            ProviderArg::Anthropic => Self::Anthropic,
            ProviderArg::Gemini => Self::Gemini,
        }
    }
}

fn build_llm_adapter(cfg: &Config, provider: LlmProviderKind) -> Option<Arc<dyn LlmAdapter>> {
    let key = match provider {
        LlmProviderKind::Openai => cfg.openai_api_key.as_deref(),
        LlmProviderKind::Anthropic => cfg.anthropic_api_key.as_deref(),
        LlmProviderKind::Gemini => cfg.gemini_api_key.as_deref(),
    }?;
    Some(Arc::new(HttpLlmAdapter::new(provider, key)))
}

fn build_dependencies(cli: &Cli, cfg: &Config) -> anyhow::Result<Dependencies> {
    let weather_adapter: Arc<dyn WeatherAdapter> = Arc::new(HttpWeatherAdapter::new(
        cfg.wxtech_base_url.clone(),
        cfg.wxtech_api_key.clone(),
    ));
    let spatial_index = SpatialIndex::from_locations(locations::all());
    let forecast = comment_gen_engine::forecast::ForecastService::new(
        &cfg.cache,
        cli.cache_dir.clone(),
        spatial_index,
        weather_adapter,
    );
    let corpus = comment_gen_engine::corpus::CorpusRepository::new(cli.corpus_dir.clone())?;
    let provider = cli
        .provider
        .map(LlmProviderKind::from)
        .unwrap_or(cfg.default_llm_provider);
    let llm = build_llm_adapter(cfg, provider);
    let history = HistoryStore::new(cli.history_path.clone());
    Ok(Dependencies {
        forecast,
        corpus,
        llm,
        history,
    })
}

fn print_locations(locations: &[Location]) {
    for location in locations {
        println!("{}\t{}\t{:.4}\t{:.4}", location.id, location.name, location.latitude, location.longitude);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if cli.list_locations {
        print_locations(locations::all());
        return Ok(());
    }

    if cli.locations.is_empty() {
        anyhow::bail!("at least one location name is required (see --list-locations)");
    }

    let cfg = Config::from_env()?;
    let deps = build_dependencies(&cli, &cfg)?;
    let mode: EvaluationMode = cli.mode.into();

    if cli.locations.len() == 1 {
        let input = GenerationInput {
            location_name: cli.locations[0].clone(),
            use_unified_path: Some(!cli.classic),
            evaluation_mode: Some(mode),
            ..GenerationInput::default()
        };
        let output = run_generation(input, &cfg, &deps).await;
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        let inputs = cli
            .locations
            .iter()
            .map(|name| BatchInput {
                use_unified_path: Some(!cli.classic),
                evaluation_mode: Some(mode),
                ..BatchInput::new(name)
            })
            .collect();
        let results = batch::run_batch(inputs, &cfg, &deps, |result| {
            tracing::info!(location = %result.location_name, success = result.success, "batch item completed");
        })
        .await;
        for result in &results {
            if let Some(output) = &result.output {
                println!("{}", serde_json::to_string_pretty(output)?);
            } else {
                println!(
                    "{{\"location\":\"{}\",\"success\":false,\"error\":{:?}}}",
                    result.location_name, result.error
                );
            }
        }
    }

    Ok(())
}
