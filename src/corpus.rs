//! Corpus ingestion: walk a data directory, parse every kern file, and feed
//! the fingerprint index.
//!
//! Documents are independent, so parsing and record generation run in
//! parallel per file; the only shared state is the immutable token filter.
//! Inserts stay sequential — one atomic batch per document — so a concurrent
//! reader never observes a half-indexed document. A document that fails to
//! read, parse, or insert is skipped with a warning and never aborts the run.

use std::fs;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

use kern_index::{FingerprintIndex, IndexRecord};
use kern_notation::{parse, ParseError};

use crate::config::{ConfigError, IngestSettings};
use crate::document_records;
use crate::mirror::CsvMirror;

/// Per-directory descriptor associating corpus files with a dataset name.
const DATASET_DESCRIPTOR: &str = "clefdataset.json";

/// File extension of corpus documents.
const KERN_EXTENSION: &str = "krn";

/// Errors that abort the ingestion of a single document.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Outcome of one corpus ingestion run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CorpusStats {
    /// Documents successfully indexed.
    pub documents: usize,
    /// Total records inserted.
    pub records: usize,
    /// Documents skipped because of read, parse, or insert failures.
    pub skipped: usize,
}

/// Walks `settings.data_dir` and indexes every `*.krn` file found.
pub fn ingest_corpus(
    settings: &IngestSettings,
    index: &FingerprintIndex,
) -> Result<CorpusStats, ConfigError> {
    let filter = settings.token_filter()?;
    let mirror = settings.csv_mirror.as_ref().map(CsvMirror::new);
    let gram_sizes = settings.gram_size_min..=settings.gram_size_max;

    let files = collect_corpus_files(&settings.data_dir);
    info!(
        data_dir = %settings.data_dir.display(),
        files = files.len(),
        "ingesting corpus"
    );

    let batches: Vec<Result<(PathBuf, Vec<IndexRecord>), PathBuf>> = files
        .par_iter()
        .map(|path| {
            build_document_batch(path, &filter, gram_sizes.clone(), settings.fingerprint_seed)
                .map(|records| (path.clone(), records))
                .map_err(|err| {
                    warn!(path = %path.display(), error = %err, "skipping document");
                    path.clone()
                })
        })
        .collect();

    let mut stats = CorpusStats::default();
    for batch in batches {
        let (path, records) = match batch {
            Ok(batch) => batch,
            Err(_) => {
                stats.skipped += 1;
                continue;
            }
        };
        match index.bulk_insert(&records) {
            Ok(inserted) => {
                stats.documents += 1;
                stats.records += inserted;
                if let Some(mirror) = &mirror {
                    mirror.append(&records);
                }
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "insert failed, document skipped");
                stats.skipped += 1;
            }
        }
    }

    info!(
        documents = stats.documents,
        records = stats.records,
        skipped = stats.skipped,
        "corpus ingestion finished"
    );
    Ok(stats)
}

/// Reads and parses one corpus file and expands it into index records.
fn build_document_batch(
    path: &Path,
    filter: &kern_notation::TokenFilter,
    gram_sizes: std::ops::RangeInclusive<usize>,
    seed: u64,
) -> Result<Vec<IndexRecord>, IngestError> {
    let text = read_latin1(path)?;
    let source_id = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    let mut document = parse(source_id, &text)?;
    if let Some(name) = path.parent().and_then(dataset_name_for) {
        document = document.with_dataset_name(name);
    }

    Ok(document_records(&document, filter, gram_sizes, seed))
}

/// All `*.krn` files under `root`, sorted for deterministic ingestion order.
fn collect_corpus_files(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                warn!(error = %err, "corpus walk error");
                None
            }
        })
        .filter(|entry| {
            entry.file_type().is_file()
                && entry
                    .path()
                    .extension()
                    .is_some_and(|ext| ext == KERN_EXTENSION)
        })
        .map(|entry| entry.into_path())
        .collect();
    files.sort();
    files
}

// The corpus arrives from the conversion boundary in an 8-bit single-byte
// encoding; every byte maps directly to the code point with the same value.
fn read_latin1(path: &Path) -> Result<String, IngestError> {
    let bytes = fs::read(path).map_err(|source| IngestError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(bytes.iter().map(|&b| char::from(b)).collect())
}

#[derive(Debug, Deserialize)]
struct DatasetDescriptor {
    #[serde(rename = "datasetAttributes", default)]
    dataset_attributes: Option<DatasetAttributes>,
}

#[derive(Debug, Deserialize)]
struct DatasetAttributes {
    #[serde(default)]
    name: Option<String>,
}

/// Dataset name from the sibling `clefdataset.json`, when present and valid.
fn dataset_name_for(dir: &Path) -> Option<String> {
    let descriptor = dir.join(DATASET_DESCRIPTOR);
    let bytes = fs::read(&descriptor).ok()?;
    match serde_json::from_slice::<DatasetDescriptor>(&bytes) {
        Ok(parsed) => parsed.dataset_attributes.and_then(|attrs| attrs.name),
        Err(err) => {
            warn!(path = %descriptor.display(), error = %err, "unreadable dataset descriptor");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IngestSettings;
    use kern_notation::FilterConfig;

    use std::fs;

    fn settings_for(dir: &Path) -> IngestSettings {
        IngestSettings {
            data_dir: dir.to_path_buf(),
            db_path: dir.join("index.redb"),
            gram_size_min: 2,
            gram_size_max: 3,
            csv_mirror: None,
            query_gram_size: None,
            fingerprint_seed: kern_gram::DEFAULT_FINGERPRINT_SEED,
            filter: FilterConfig::default(),
        }
    }

    #[test]
    fn ingests_a_small_corpus() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("one.krn"), "**kern\n4c\n4d\n4e\n*-\n").expect("write");
        fs::write(dir.path().join("two.krn"), "**kern\n4f\n4g\n4a\n4b\n*-\n").expect("write");
        fs::write(dir.path().join("notes.txt"), "not a corpus file").expect("write");
        fs::write(
            dir.path().join(DATASET_DESCRIPTOR),
            r#"{"datasetAttributes": {"name": "unit-corpus"}}"#,
        )
        .expect("write");

        let index = FingerprintIndex::in_memory();
        let stats = ingest_corpus(&settings_for(dir.path()), &index).expect("ingest succeeds");

        // one.krn: 2+1 grams; two.krn: 3+2 grams.
        assert_eq!(stats.documents, 2);
        assert_eq!(stats.records, 8);
        assert_eq!(stats.skipped, 0);
        assert_eq!(index.distinct_document_count().expect("count"), 2);

        let tokens: Vec<String> = ["4c", "4d"].iter().map(|s| s.to_string()).collect();
        let fp = kern_gram::fingerprint(&tokens, kern_gram::DEFAULT_FINGERPRINT_SEED);
        let counts = index.lookup(fp).expect("lookup succeeds");
        assert_eq!(counts.len(), 1);
        assert_eq!(counts[0].source_id, "one.krn");
    }

    #[test]
    fn malformed_documents_are_skipped_not_fatal() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("good.krn"), "**kern\n4c\n4d\n*-\n").expect("write");
        // Event data with no voice declaration.
        fs::write(dir.path().join("bad.krn"), "4c 4d 4e\n").expect("write");

        let index = FingerprintIndex::in_memory();
        let stats = ingest_corpus(&settings_for(dir.path()), &index).expect("ingest succeeds");

        assert_eq!(stats.documents, 1);
        assert_eq!(stats.skipped, 1);
    }

    #[test]
    fn dataset_descriptor_is_optional() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("solo.krn"), "**kern\n4c\n4d\n4e\n*-\n").expect("write");

        let index = FingerprintIndex::in_memory();
        ingest_corpus(&settings_for(dir.path()), &index).expect("ingest succeeds");

        let tokens: Vec<String> = ["4c", "4d", "4e"].iter().map(|s| s.to_string()).collect();
        let fp = kern_gram::fingerprint(&tokens, kern_gram::DEFAULT_FINGERPRINT_SEED);
        assert_eq!(index.lookup(fp).expect("lookup succeeds").len(), 1);
    }

    #[test]
    fn latin1_bytes_decode_losslessly() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("accent.krn");
        // "!!!COM: Fauré" with an ISO-8859-1 e-acute byte.
        fs::write(&path, b"!!!COM: Faur\xe9\n**kern\n4c\n*-\n").expect("write");

        let text = read_latin1(&path).expect("read succeeds");
        assert!(text.contains("Faur\u{e9}"));
    }
}
