//! Weather comment generation workflow engine: a typed state machine
//! that turns a location and target time into a short weather/advice
//! comment pair, backed by a three-tier forecast cache, a lazy corpus
//! repository, and a pluggable LLM adapter (see `DESIGN.md`).

pub mod batch;
pub mod cache;
pub mod config;
pub mod corpus;
pub mod dependencies;
pub mod domain;
pub mod error;
pub mod forecast;
pub mod history;
pub mod llm;
pub mod locations;
pub mod retry;
pub mod validator;
pub mod workflow;

pub use batch::{run_batch, BatchInput, BatchResult};
pub use config::Config;
pub use dependencies::Dependencies;
pub use error::WorkflowError;
pub use workflow::{run_generation, GenerationInput, GenerationOutput};
