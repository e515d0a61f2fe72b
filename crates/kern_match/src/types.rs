//! Request/response types and errors for the matching layer.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use kern_gram::DEFAULT_FINGERPRINT_SEED;
use kern_index::IndexError;
use kern_notation::ParseError;

/// One ranked candidate: a source document and its aggregated hit count
/// across all query fingerprints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    pub source_id: String,
    pub match_count: u64,
}

/// Outcome of one query. `degraded` distinguishes "no matches found" from
/// "search degraded by a backend failure": when set, some fingerprints could
/// not be looked up and `errors` says which, but the ranking over the
/// remaining fingerprints is still returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchReport {
    pub results: Vec<MatchResult>,
    pub degraded: bool,
    pub errors: Vec<String>,
}

/// Engine configuration. Cheap to clone and serde-friendly so it can ride
/// inside higher-level settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Smallest gram size present in the index.
    pub gram_size_min: usize,
    /// Largest gram size present in the index.
    pub gram_size_max: usize,
    /// Fixed query gram size. When unset, the query's own length clamped
    /// into `[gram_size_min, gram_size_max]` is used.
    #[serde(default)]
    pub query_gram_size: Option<usize>,
    /// Seed shared with the ingestion path; fingerprints from different
    /// seeds never match.
    #[serde(default = "default_seed")]
    pub fingerprint_seed: u64,
}

fn default_seed() -> u64 {
    DEFAULT_FINGERPRINT_SEED
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            gram_size_min: 3,
            gram_size_max: 8,
            query_gram_size: None,
            fingerprint_seed: DEFAULT_FINGERPRINT_SEED,
        }
    }
}

impl SearchConfig {
    /// Validates startup configuration; never called per request.
    pub fn validate(&self) -> Result<(), SearchError> {
        if self.gram_size_min == 0 {
            return Err(SearchError::InvalidConfig(
                "gram_size_min must be at least 1".into(),
            ));
        }
        if self.gram_size_min > self.gram_size_max {
            return Err(SearchError::InvalidConfig(format!(
                "gram_size_min {} exceeds gram_size_max {}",
                self.gram_size_min, self.gram_size_max
            )));
        }
        if self.query_gram_size == Some(0) {
            return Err(SearchError::InvalidConfig(
                "query_gram_size must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Errors produced by the matching layer.
#[derive(Debug, Error)]
pub enum SearchError {
    /// Invalid engine configuration, rejected at construction.
    #[error("invalid search config: {0}")]
    InvalidConfig(String),
    /// The query document could not be parsed.
    #[error(transparent)]
    Parse(#[from] ParseError),
    /// The requested voice does not exist in the query document.
    #[error("voice {index} not found in query document ({available} voices)")]
    VoiceNotFound { index: usize, available: usize },
    /// The selected voice has no tokens left after filtering and trimming.
    #[error("query voice is empty after filtering")]
    EmptyQuery,
    /// Index failure outside the degradable per-fingerprint path.
    #[error(transparent)]
    Index(#[from] IndexError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(SearchConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_gram_size_min_rejected() {
        let cfg = SearchConfig {
            gram_size_min: 0,
            ..SearchConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(SearchError::InvalidConfig(_))));
    }

    #[test]
    fn inverted_gram_range_rejected() {
        let cfg = SearchConfig {
            gram_size_min: 6,
            gram_size_max: 3,
            ..SearchConfig::default()
        };
        let err = cfg.validate().expect_err("config should be invalid");
        match err {
            SearchError::InvalidConfig(msg) => assert!(msg.contains("exceeds")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn zero_query_gram_size_rejected() {
        let cfg = SearchConfig {
            query_gram_size: Some(0),
            ..SearchConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(SearchError::InvalidConfig(_))));
    }
}
