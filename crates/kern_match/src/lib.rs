//! Matching layer for kernhash: per-fingerprint hit aggregation and the
//! query engine the transport boundary consumes.

mod engine;
mod ranker;
mod types;

pub use engine::SearchEngine;
pub use ranker::rank;
pub use types::{MatchResult, SearchConfig, SearchError, SearchReport};
