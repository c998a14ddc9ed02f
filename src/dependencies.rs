//! `Dependencies`: the constructed collaborators a workflow run needs,
//! bundled as a plain struct passed by reference (spec §9 Design Note
//! "configuration is a value passed down from the entry point" applied
//! to collaborators, not just config).

use std::sync::Arc;

use crate::corpus::CorpusRepository;
use crate::forecast::ForecastService;
use crate::history::HistoryStore;
use crate::llm::LlmAdapter;

/// Collaborators a [`crate::workflow::run_generation`] call needs. Built
/// once at process entry and shared (via `&Dependencies`) across
/// concurrent batch workers; nothing here is mutated through the
/// reference — internal mutability lives in the caches each collaborator
/// owns.
pub struct Dependencies {
    pub forecast: ForecastService,
    pub corpus: CorpusRepository,
    /// `None` when no LLM provider key is configured; the workflow then
    /// runs the no-LLM degenerate path (spec §4.1 `EDGE_evaluate`).
    pub llm: Option<Arc<dyn LlmAdapter>>,
    pub history: HistoryStore,
}
