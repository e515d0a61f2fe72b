//! Fingerprint index for kernhash.
//!
//! The index stores `(fingerprint, provenance)` records and answers one
//! question: for a given fingerprint, how many records does each source
//! document contribute? Storage is behind the [`IndexBackend`] trait so the
//! higher layers never depend on a particular engine; the crate ships an
//! in-memory backend (tests, ephemeral serving) and a redb-backed one
//! (feature `backend-redb`, on by default).

mod backend;

#[cfg(feature = "backend-redb")]
pub use backend::RedbBackend;
pub use backend::{IndexBackend, InMemoryBackend};

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Bump this value whenever the persisted record layout changes.
pub const INDEX_SCHEMA_VERSION: u16 = 1;

/// One persisted fingerprint occurrence. Write-once, append-only; the field
/// set is part of the on-disk contract and must be preserved across
/// reimplementations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexRecord {
    /// Order-sensitive n-gram hash; the lookup key.
    pub fingerprint: i64,
    /// Stable document identifier, usually the corpus filename.
    pub source_id: String,
    /// Instrument-class label of the originating voice, empty when the
    /// header declared none.
    pub voice_name: String,
    /// Provenance group, empty when the corpus directory had no descriptor.
    pub dataset_name: String,
    /// The n in n-gram.
    pub gram_size: u32,
    /// Canonical gram text, kept for diagnostics and the CSV mirror.
    pub gram_text: String,
}

/// Per-source hit count for one fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceCount {
    pub source_id: String,
    pub match_count: u64,
}

/// Errors raised by the index. Write failures abort (and roll back) the
/// whole batch; read failures degrade the query that saw them.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("index write failed: {0}")]
    Write(String),
    #[error("index read failed: {0}")]
    Read(String),
}

impl IndexError {
    pub fn write(err: impl std::fmt::Display) -> Self {
        IndexError::Write(err.to_string())
    }

    pub fn read(err: impl std::fmt::Display) -> Self {
        IndexError::Read(err.to_string())
    }
}

/// The fingerprint index over an injected storage backend.
pub struct FingerprintIndex {
    backend: Box<dyn IndexBackend>,
}

impl FingerprintIndex {
    pub fn new(backend: Box<dyn IndexBackend>) -> Self {
        Self { backend }
    }

    /// Convenience constructor for tests and ephemeral serving.
    pub fn in_memory() -> Self {
        Self::new(Box::new(InMemoryBackend::new()))
    }

    /// Inserts one document's records as a single atomic unit and returns the
    /// number inserted. Concurrent lookups see either none or all of a batch.
    pub fn bulk_insert(&self, records: &[IndexRecord]) -> Result<usize, IndexError> {
        if records.is_empty() {
            return Ok(0);
        }
        self.backend.append_batch(records)
    }

    /// Per-source hit counts for one fingerprint, ordered by count descending
    /// with ties broken by `source_id` ascending for determinism. A
    /// fingerprint never inserted yields an empty vec, not an error.
    pub fn lookup(&self, fingerprint: i64) -> Result<Vec<SourceCount>, IndexError> {
        let records = self.backend.records_for(fingerprint)?;

        let mut counts: HashMap<String, u64> = HashMap::new();
        for record in records {
            *counts.entry(record.source_id).or_insert(0) += 1;
        }

        let mut grouped: Vec<SourceCount> = counts
            .into_iter()
            .map(|(source_id, match_count)| SourceCount {
                source_id,
                match_count,
            })
            .collect();
        grouped.sort_by(|a, b| {
            b.match_count
                .cmp(&a.match_count)
                .then_with(|| a.source_id.cmp(&b.source_id))
        });
        Ok(grouped)
    }

    /// Count of distinct `source_id` values ever inserted.
    pub fn distinct_document_count(&self) -> Result<u64, IndexError> {
        self.backend.distinct_source_count()
    }

    pub fn flush(&self) -> Result<(), IndexError> {
        self.backend.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn record(fingerprint: i64, source_id: &str) -> IndexRecord {
        IndexRecord {
            fingerprint,
            source_id: source_id.to_string(),
            voice_name: "violin".to_string(),
            dataset_name: "demo".to_string(),
            gram_size: 3,
            gram_text: "4c4d4e".to_string(),
        }
    }

    #[test]
    fn lookup_groups_and_orders_counts() {
        let index = FingerprintIndex::in_memory();
        index
            .bulk_insert(&[
                record(7, "b.krn"),
                record(7, "a.krn"),
                record(7, "b.krn"),
                record(7, "c.krn"),
                record(9, "a.krn"),
            ])
            .expect("insert succeeds");

        let counts = index.lookup(7).expect("lookup succeeds");
        assert_eq!(
            counts,
            vec![
                SourceCount {
                    source_id: "b.krn".into(),
                    match_count: 2
                },
                SourceCount {
                    source_id: "a.krn".into(),
                    match_count: 1
                },
                SourceCount {
                    source_id: "c.krn".into(),
                    match_count: 1
                },
            ]
        );
    }

    #[test]
    fn unknown_fingerprint_is_empty_not_an_error() {
        let index = FingerprintIndex::in_memory();
        assert!(index.lookup(12345).expect("lookup succeeds").is_empty());
    }

    #[test]
    fn distinct_document_count_tracks_sources() {
        let index = FingerprintIndex::in_memory();
        assert_eq!(index.distinct_document_count().expect("count"), 0);

        index
            .bulk_insert(&[record(1, "a.krn"), record(2, "b.krn"), record(3, "c.krn")])
            .expect("insert succeeds");
        assert_eq!(index.distinct_document_count().expect("count"), 3);

        // Re-inserting an already-known source adds no new document.
        index.bulk_insert(&[record(4, "a.krn")]).expect("insert succeeds");
        assert_eq!(index.distinct_document_count().expect("count"), 3);
    }

    #[test]
    fn double_insert_doubles_counts_exactly() {
        let index = FingerprintIndex::in_memory();
        let batch = [record(11, "a.krn"), record(11, "a.krn")];

        index.bulk_insert(&batch).expect("first insert");
        let once = index.lookup(11).expect("lookup succeeds");
        index.bulk_insert(&batch).expect("second insert");
        let twice = index.lookup(11).expect("lookup succeeds");

        assert_eq!(once[0].match_count * 2, twice[0].match_count);
    }

    #[test]
    fn empty_batch_is_a_no_op() {
        let index = FingerprintIndex::in_memory();
        assert_eq!(index.bulk_insert(&[]).expect("insert succeeds"), 0);
    }
}
