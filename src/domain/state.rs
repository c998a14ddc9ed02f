//! `GenerationState`: the workflow's shared, named-slot record (spec §3,
//! Design Note "use an explicit record/struct with named fields").

use std::collections::HashMap;
use std::collections::HashSet;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::comment::{CommentPair, PastComment};
use crate::domain::location::Location;
use crate::domain::weather::{ForecastCollection, WeatherForecast};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub ok: bool,
    pub reasons: Vec<String>,
    pub score: f32,
}

/// Per-node wall-clock timing, recorded in `metadata.node_execution_times`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeTiming {
    pub node: String,
    pub millis: u128,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CorpusSubset {
    pub weather: Vec<PastComment>,
    pub advice: Vec<PastComment>,
}

#[derive(Debug, Clone)]
pub struct GenerationState {
    pub location_name: String,
    pub target_datetime: DateTime<Utc>,
    pub llm_provider_name: Option<String>,
    pub resolved_location: Option<Location>,

    pub forecast: Option<ForecastCollection>,
    pub forecast_at_target: Option<WeatherForecast>,

    pub corpus_subset: CorpusSubset,
    pub candidate: Option<CommentPair>,
    pub previous_candidate_texts: HashSet<String>,
    pub validation: ValidationOutcome,
    pub retry_count: u32,

    pub final_weather: String,
    pub final_advice: String,

    pub metadata: HashMap<String, Value>,
    pub errors: Vec<String>,

    pub use_unified_path: bool,
    pub use_indexed_corpus: bool,
    pub exclude_previous: bool,

    pub executed_nodes: Vec<String>,
    pub node_timings: Vec<NodeTiming>,
    pub cache_hits: u32,
    pub cache_misses: u32,
}

impl GenerationState {
    #[must_use]
    pub fn new(location_name: impl Into<String>, target_datetime: DateTime<Utc>) -> Self {
        Self {
            location_name: location_name.into(),
            target_datetime,
            llm_provider_name: None,
            resolved_location: None,
            forecast: None,
            forecast_at_target: None,
            corpus_subset: CorpusSubset::default(),
            candidate: None,
            previous_candidate_texts: HashSet::new(),
            validation: ValidationOutcome::default(),
            retry_count: 0,
            final_weather: String::new(),
            final_advice: String::new(),
            metadata: HashMap::new(),
            errors: Vec::new(),
            use_unified_path: true,
            use_indexed_corpus: false,
            exclude_previous: false,
            executed_nodes: Vec::new(),
            node_timings: Vec::new(),
            cache_hits: 0,
            cache_misses: 0,
        }
    }

    pub fn record_node(&mut self, node: &str, elapsed: Duration) {
        self.executed_nodes.push(node.to_string());
        self.node_timings.push(NodeTiming {
            node: node.to_string(),
            millis: elapsed.as_millis(),
        });
    }

    pub fn set_metadata(&mut self, key: &str, value: impl Into<Value>) {
        self.metadata.insert(key.to_string(), value.into());
    }

    pub fn push_error(&mut self, err: impl Into<String>) {
        self.errors.push(err.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_state_starts_with_unified_path_and_no_retries() {
        let state = GenerationState::new("Tokyo", Utc::now());
        assert!(state.use_unified_path);
        assert_eq!(state.retry_count, 0);
        assert!(state.executed_nodes.is_empty());
    }

    #[test]
    fn record_node_appends_name_and_timing() {
        let mut state = GenerationState::new("Tokyo", Utc::now());
        state.record_node("Input", Duration::from_millis(5));
        state.record_node("FetchForecast", Duration::from_millis(12));
        assert_eq!(state.executed_nodes, vec!["Input", "FetchForecast"]);
        assert_eq!(state.node_timings.len(), 2);
    }
}
