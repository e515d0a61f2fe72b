//! Storage backends for the fingerprint index.
//!
//! A backend stores append-only [`IndexRecord`]s and serves them back by
//! fingerprint. Atomicity contract: `append_batch` is all-or-nothing — a
//! concurrent reader sees either none or all of a batch, and a failed batch
//! leaves the store unchanged.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use crate::{IndexError, IndexRecord};

pub trait IndexBackend: Send + Sync {
    /// Appends one document's records atomically, returning the number
    /// written. Partial failure rolls the whole batch back.
    fn append_batch(&self, records: &[IndexRecord]) -> Result<usize, IndexError>;

    /// All records stored under `fingerprint`, in insertion order.
    fn records_for(&self, fingerprint: i64) -> Result<Vec<IndexRecord>, IndexError>;

    /// Count of distinct `source_id` values ever appended.
    fn distinct_source_count(&self) -> Result<u64, IndexError>;

    fn flush(&self) -> Result<(), IndexError> {
        Ok(())
    }
}

#[derive(Default)]
struct InMemoryState {
    by_fingerprint: HashMap<i64, Vec<IndexRecord>>,
    sources: HashSet<String>,
}

/// RwLock'd map backend for tests and ephemeral serving.
pub struct InMemoryBackend {
    state: RwLock<InMemoryState>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(InMemoryState::default()),
        }
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl IndexBackend for InMemoryBackend {
    fn append_batch(&self, records: &[IndexRecord]) -> Result<usize, IndexError> {
        let mut state = self
            .state
            .write()
            .map_err(|_| IndexError::write("poisoned lock"))?;
        for record in records {
            state.sources.insert(record.source_id.clone());
            state
                .by_fingerprint
                .entry(record.fingerprint)
                .or_default()
                .push(record.clone());
        }
        Ok(records.len())
    }

    fn records_for(&self, fingerprint: i64) -> Result<Vec<IndexRecord>, IndexError> {
        let state = self
            .state
            .read()
            .map_err(|_| IndexError::read("poisoned lock"))?;
        Ok(state
            .by_fingerprint
            .get(&fingerprint)
            .cloned()
            .unwrap_or_default())
    }

    fn distinct_source_count(&self) -> Result<u64, IndexError> {
        let state = self
            .state
            .read()
            .map_err(|_| IndexError::read("poisoned lock"))?;
        Ok(state.sources.len() as u64)
    }
}

#[cfg(feature = "backend-redb")]
mod redb_backend {
    use std::path::Path;

    use redb::{Database, ReadableTable, TableDefinition};

    use super::IndexBackend;
    use crate::{IndexError, IndexRecord};

    // Key: big-endian sign-flipped fingerprint followed by a big-endian
    // insertion sequence number, so all records for one fingerprint form a
    // contiguous key range.
    const GRAMS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("grams");
    // source_id -> number of records, doubling as the distinct-source set.
    const SOURCES: TableDefinition<&str, u64> = TableDefinition::new("sources");
    const META: TableDefinition<&str, u64> = TableDefinition::new("meta");

    const NEXT_SEQ: &str = "next_seq";
    const SIGN_FLIP: u64 = 1 << 63;

    /// Single-file embedded backend. One redb write transaction per batch
    /// gives the all-or-nothing visibility the ingestion path requires.
    pub struct RedbBackend {
        db: Database,
    }

    impl RedbBackend {
        pub fn open(path: impl AsRef<Path>) -> Result<Self, IndexError> {
            let path = path.as_ref();
            let db = Database::create(path).map_err(IndexError::write)?;

            // Create the tables up front so readers never race a fresh file.
            let tx = db.begin_write().map_err(IndexError::write)?;
            {
                tx.open_table(GRAMS).map_err(IndexError::write)?;
                tx.open_table(SOURCES).map_err(IndexError::write)?;
                tx.open_table(META).map_err(IndexError::write)?;
            }
            tx.commit().map_err(IndexError::write)?;

            tracing::debug!(path = %path.display(), "opened fingerprint index");
            Ok(Self { db })
        }

        fn gram_key(fingerprint: i64, seq: u64) -> [u8; 16] {
            let mut key = [0u8; 16];
            // Flipping the sign bit makes the unsigned byte order match the
            // signed fingerprint order.
            key[..8].copy_from_slice(&((fingerprint as u64) ^ SIGN_FLIP).to_be_bytes());
            key[8..].copy_from_slice(&seq.to_be_bytes());
            key
        }
    }

    impl IndexBackend for RedbBackend {
        fn append_batch(&self, records: &[IndexRecord]) -> Result<usize, IndexError> {
            let tx = self.db.begin_write().map_err(IndexError::write)?;
            {
                let mut grams = tx.open_table(GRAMS).map_err(IndexError::write)?;
                let mut sources = tx.open_table(SOURCES).map_err(IndexError::write)?;
                let mut meta = tx.open_table(META).map_err(IndexError::write)?;

                let mut seq = meta
                    .get(NEXT_SEQ)
                    .map_err(IndexError::write)?
                    .map(|guard| guard.value())
                    .unwrap_or(0);

                for record in records {
                    let value = bincode::serialize(record).map_err(IndexError::write)?;
                    let key = Self::gram_key(record.fingerprint, seq);
                    grams
                        .insert(key.as_slice(), value.as_slice())
                        .map_err(IndexError::write)?;
                    seq += 1;

                    let count = sources
                        .get(record.source_id.as_str())
                        .map_err(IndexError::write)?
                        .map(|guard| guard.value())
                        .unwrap_or(0);
                    sources
                        .insert(record.source_id.as_str(), count + 1)
                        .map_err(IndexError::write)?;
                }

                meta.insert(NEXT_SEQ, seq).map_err(IndexError::write)?;
            }
            // An uncommitted transaction is rolled back on drop, so any error
            // above leaves the store untouched.
            tx.commit().map_err(IndexError::write)?;
            Ok(records.len())
        }

        fn records_for(&self, fingerprint: i64) -> Result<Vec<IndexRecord>, IndexError> {
            let tx = self.db.begin_read().map_err(IndexError::read)?;
            let grams = tx.open_table(GRAMS).map_err(IndexError::read)?;

            let lo = Self::gram_key(fingerprint, 0);
            let hi = Self::gram_key(fingerprint, u64::MAX);

            let mut records = Vec::new();
            for entry in grams
                .range(lo.as_slice()..=hi.as_slice())
                .map_err(IndexError::read)?
            {
                let (_, value) = entry.map_err(IndexError::read)?;
                records.push(bincode::deserialize(value.value()).map_err(IndexError::read)?);
            }
            Ok(records)
        }

        fn distinct_source_count(&self) -> Result<u64, IndexError> {
            let tx = self.db.begin_read().map_err(IndexError::read)?;
            let sources = tx.open_table(SOURCES).map_err(IndexError::read)?;
            sources.len().map_err(IndexError::read)
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::FingerprintIndex;

        fn record(fingerprint: i64, source_id: &str, gram_text: &str) -> IndexRecord {
            IndexRecord {
                fingerprint,
                source_id: source_id.to_string(),
                voice_name: "cello".to_string(),
                dataset_name: "demo".to_string(),
                gram_size: 3,
                gram_text: gram_text.to_string(),
            }
        }

        #[test]
        fn records_survive_reopening_the_database() {
            let dir = tempfile::tempdir().expect("tempdir");
            let path = dir.path().join("index.redb");

            {
                let index =
                    FingerprintIndex::new(Box::new(RedbBackend::open(&path).expect("open")));
                index
                    .bulk_insert(&[
                        record(-42, "a.krn", "4c4d4e"),
                        record(-42, "b.krn", "4c4d4e"),
                        record(7, "a.krn", "4d4e4f"),
                    ])
                    .expect("insert succeeds");
            }

            let index = FingerprintIndex::new(Box::new(RedbBackend::open(&path).expect("reopen")));
            let counts = index.lookup(-42).expect("lookup succeeds");
            assert_eq!(counts.len(), 2);
            assert_eq!(counts[0].match_count, 1);
            assert_eq!(index.distinct_document_count().expect("count"), 2);
        }

        #[test]
        fn negative_and_positive_fingerprints_stay_separate() {
            let dir = tempfile::tempdir().expect("tempdir");
            let path = dir.path().join("index.redb");
            let index = FingerprintIndex::new(Box::new(RedbBackend::open(&path).expect("open")));

            index
                .bulk_insert(&[record(i64::MIN, "a.krn", "x"), record(i64::MAX, "b.krn", "y")])
                .expect("insert succeeds");

            let low = index.lookup(i64::MIN).expect("lookup succeeds");
            assert_eq!(low.len(), 1);
            assert_eq!(low[0].source_id, "a.krn");

            let high = index.lookup(i64::MAX).expect("lookup succeeds");
            assert_eq!(high.len(), 1);
            assert_eq!(high[0].source_id, "b.krn");
        }
    }
}

#[cfg(feature = "backend-redb")]
pub use redb_backend::RedbBackend;
