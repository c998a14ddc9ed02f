//! Core data model (spec §3): locations, weather, seasons, corpus
//! comments, and the workflow's shared generation state.

pub mod comment;
pub mod location;
pub mod season;
pub mod state;
pub mod weather;

pub use comment::{CommentPair, CommentType, PastComment};
pub use location::{Location, SpatialIndex};
pub use season::Season;
pub use state::GenerationState;
pub use weather::{ForecastCollection, WeatherCondition, WeatherForecast, WindDirection};
