//! Workspace umbrella crate for kernhash.
//!
//! kernhash retrieves symbolic music by content: corpus documents in Humdrum
//! kern notation are reduced per voice to a canonical pitch-rhythm token
//! stream, every n-gram of that stream is fingerprinted with an
//! order-sensitive hash, and the fingerprints are stored in an append-only
//! index. A query runs through the identical pipeline and candidates are
//! ranked by how many query fingerprints each document shares.
//!
//! This crate stitches the layers together: [`document_records`] expands one
//! parsed document into index records, [`ingest_corpus`] walks a corpus
//! directory and feeds the index, and the re-exports give callers a single
//! API entry point.

mod config;
mod corpus;
mod mirror;

pub use config::{ConfigError, IngestSettings};
pub use corpus::{ingest_corpus, CorpusStats, IngestError};
pub use mirror::CsvMirror;

pub use kern_gram::{fingerprint, gram_text, ngrams, DEFAULT_FINGERPRINT_SEED};
#[cfg(feature = "backend-redb")]
pub use kern_index::RedbBackend;
pub use kern_index::{
    FingerprintIndex, IndexBackend, IndexError, IndexRecord, InMemoryBackend, SourceCount,
};
pub use kern_match::{rank, MatchResult, SearchConfig, SearchEngine, SearchError, SearchReport};
pub use kern_notation::{
    parse, Document, FilterConfig, KernMetadata, ParseError, TokenFilter, Voice,
};

use std::ops::RangeInclusive;

/// Expands one parsed document into index records: for every voice and every
/// gram size in `gram_sizes`, one record per n-gram of the voice's filtered
/// token sequence. The records for one document form one atomic insert batch.
pub fn document_records(
    document: &Document,
    filter: &TokenFilter,
    gram_sizes: RangeInclusive<usize>,
    seed: u64,
) -> Vec<IndexRecord> {
    let source_id = document.source_id();
    let dataset_name = document.dataset_name().unwrap_or_default();

    let mut records = Vec::new();
    for voice in document.voices().values() {
        let tokens = voice.filtered_tokens(filter);
        let voice_name = voice.name().unwrap_or_default();
        for gram_size in gram_sizes.clone() {
            for gram in ngrams(&tokens, gram_size) {
                records.push(IndexRecord {
                    fingerprint: fingerprint(gram, seed),
                    source_id: source_id.to_string(),
                    voice_name: voice_name.to_string(),
                    dataset_name: dataset_name.to_string(),
                    gram_size: gram_size as u32,
                    gram_text: gram_text(gram),
                });
            }
        }
    }
    records
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_VOICE: &str = "\
!!!COM: Anonymous
**kern\t**kern
*Icello\t*Iviolin
=1\t=1
4C\t4c
4D\t4d
4E\t4e
4F\t4f
*-\t*-
";

    #[test]
    fn records_cover_every_voice_and_gram_size() {
        let document = parse("duo.krn", TWO_VOICE).expect("parse succeeds");
        let filter = TokenFilter::default();

        let records =
            document_records(&document, &filter, 2..=3, DEFAULT_FINGERPRINT_SEED);

        // Each voice has 4 filtered tokens: three 2-grams and two 3-grams.
        assert_eq!(records.len(), 2 * (3 + 2));
        assert!(records.iter().all(|r| r.source_id == "duo.krn"));
        assert!(records.iter().any(|r| r.voice_name == "cello"));
        assert!(records.iter().any(|r| r.voice_name == "violin"));
        assert!(records.iter().any(|r| r.gram_size == 2));
        assert!(records.iter().any(|r| r.gram_size == 3));
    }

    #[test]
    fn dataset_name_rides_along() {
        let document = parse("duo.krn", TWO_VOICE)
            .expect("parse succeeds")
            .with_dataset_name("test-set");
        let filter = TokenFilter::default();

        let records = document_records(&document, &filter, 4..=4, DEFAULT_FINGERPRINT_SEED);
        assert!(!records.is_empty());
        assert!(records.iter().all(|r| r.dataset_name == "test-set"));
    }

    #[test]
    fn voiceless_document_produces_no_records() {
        let document = parse("meta.krn", "!!!COM: Nobody\n").expect("parse succeeds");
        let filter = TokenFilter::default();
        assert!(document_records(&document, &filter, 2..=4, DEFAULT_FINGERPRINT_SEED).is_empty());
    }
}
