//! Configuration for token filtering.
//!
//! The allowed alphabet used to be process-wide mutable state in older MIR
//! tooling; here it is an explicit value so two ingestion runs with different
//! alphabets can coexist in one process.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Characters removed by [`crate::TokenFilter::strip_disallowed_chars`],
/// expressed as the inverse of the allowed set: pitch letters `A-G`/`a-g`,
/// digits, hyphen, `#` accidental, `r` rest, `n` natural, and the duration
/// dot survive filtering.
pub const DEFAULT_DISALLOWED_PATTERN: &str = r"[^A-Ga-g0-9\-#rn\.]+";

/// Configuration for the token filter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FilterConfig {
    /// Regex matching the characters to strip from event tokens. Deployments
    /// that index additional token classes (e.g. lyrics syllables) widen the
    /// allowed set here.
    pub disallowed: String,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            disallowed: DEFAULT_DISALLOWED_PATTERN.to_string(),
        }
    }
}

/// Errors raised while building a [`crate::TokenFilter`].
#[derive(Debug, Error)]
pub enum FilterError {
    #[error("invalid disallowed-character pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TokenFilter;

    #[test]
    fn default_config_builds_a_filter() {
        let cfg = FilterConfig::default();
        assert!(TokenFilter::new(&cfg).is_ok());
    }

    #[test]
    fn invalid_pattern_is_rejected_at_construction() {
        let cfg = FilterConfig {
            disallowed: "[unclosed".into(),
        };
        let err = TokenFilter::new(&cfg).expect_err("pattern should be rejected");
        assert!(matches!(err, FilterError::InvalidPattern { .. }));
    }
}
