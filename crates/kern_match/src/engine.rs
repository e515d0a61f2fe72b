//! Query engine: the single entry point the transport boundary consumes.

use std::sync::Arc;

use tracing::warn;

use kern_gram::{fingerprint, ngrams};
use kern_index::FingerprintIndex;
use kern_notation::filters::trim_trailing_rests;
use kern_notation::{parse, TokenFilter};

use crate::ranker::rank;
use crate::types::{SearchConfig, SearchError, SearchReport};

/// Identifier given to parsed query documents in logs and parse errors.
const QUERY_SOURCE_ID: &str = "query";

/// Stateless-per-request query engine over a shared fingerprint index.
pub struct SearchEngine {
    index: Arc<FingerprintIndex>,
    filter: TokenFilter,
    config: SearchConfig,
}

impl SearchEngine {
    /// Builds an engine, rejecting invalid configuration up front so request
    /// handling never trips over it.
    pub fn new(
        index: Arc<FingerprintIndex>,
        filter: TokenFilter,
        config: SearchConfig,
    ) -> Result<Self, SearchError> {
        config.validate()?;
        Ok(Self {
            index,
            filter,
            config,
        })
    }

    /// Runs one query: parse the notation, take the selected voice, reduce it
    /// to canonical tokens, fingerprint its n-grams, and rank the per-source
    /// hit counts across all of them.
    ///
    /// An individual fingerprint whose lookup fails contributes zero matches
    /// and flips the `degraded` flag; the query keeps going so a partial
    /// backend outage degrades ranking quality instead of failing the call.
    pub fn lookup(&self, notation: &str, voice_index: usize) -> Result<SearchReport, SearchError> {
        let document = parse(QUERY_SOURCE_ID, notation)?;

        let voice = document
            .voice(voice_index)
            .ok_or(SearchError::VoiceNotFound {
                index: voice_index,
                available: document.voice_count(),
            })?;

        let filtered = voice.filtered_tokens(&self.filter);
        let tokens = trim_trailing_rests(&filtered);
        if tokens.is_empty() {
            return Err(SearchError::EmptyQuery);
        }

        let gram_size = self.query_gram_size(tokens.len());

        let mut per_fingerprint = Vec::new();
        let mut errors = Vec::new();
        for gram in ngrams(tokens, gram_size) {
            let fp = fingerprint(gram, self.config.fingerprint_seed);
            match self.index.lookup(fp) {
                Ok(counts) => per_fingerprint.push(counts),
                Err(err) => {
                    warn!(fingerprint = fp, error = %err, "lookup failed, counting zero matches");
                    errors.push(format!("fingerprint {fp}: {err}"));
                }
            }
        }

        Ok(SearchReport {
            results: rank(per_fingerprint),
            degraded: !errors.is_empty(),
            errors,
        })
    }

    /// Number of distinct documents the index has seen.
    pub fn documents_searched(&self) -> Result<u64, SearchError> {
        Ok(self.index.distinct_document_count()?)
    }

    // The configured size when fixed; otherwise the query's own length
    // clamped into the range of sizes present in the index.
    fn query_gram_size(&self, query_len: usize) -> usize {
        self.config
            .query_gram_size
            .unwrap_or_else(|| query_len.clamp(self.config.gram_size_min, self.config.gram_size_max))
    }
}
