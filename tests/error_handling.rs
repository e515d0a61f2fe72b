//! Failure-path behavior across the stack: local parse failures, missing
//! fingerprints, degraded backends, and fatal configuration.

use std::path::PathBuf;
use std::sync::Arc;

use kernhash::{
    FingerprintIndex, FilterConfig, IndexBackend, IndexError, IndexRecord, IngestSettings,
    ParseError, SearchConfig, SearchEngine, SearchError, TokenFilter, parse,
};

#[test]
fn event_data_before_voice_declaration_fails_that_document() {
    let err = parse("orphan.krn", "!!!COM: Nobody\n4c 4d\n").expect_err("must fail");
    assert!(matches!(err, ParseError::NoVoices { line: 2, .. }));
}

#[test]
fn unknown_fingerprint_lookup_is_empty_not_an_error() {
    let index = FingerprintIndex::in_memory();
    let counts = index.lookup(0x5eed).expect("lookup succeeds");
    assert!(counts.is_empty());
}

#[test]
fn missing_query_voice_is_a_search_error() {
    let index = Arc::new(FingerprintIndex::in_memory());
    let engine = SearchEngine::new(index, TokenFilter::default(), SearchConfig::default())
        .expect("valid config");

    let err = engine
        .lookup("**kern\n4c\n4d\n4e\n*-\n", 2)
        .expect_err("voice 2 does not exist");
    assert!(matches!(err, SearchError::VoiceNotFound { index: 2, .. }));
}

struct ReadFailingBackend;

impl IndexBackend for ReadFailingBackend {
    fn append_batch(&self, records: &[IndexRecord]) -> Result<usize, IndexError> {
        Ok(records.len())
    }

    fn records_for(&self, _fingerprint: i64) -> Result<Vec<IndexRecord>, IndexError> {
        Err(IndexError::read("connection reset"))
    }

    fn distinct_source_count(&self) -> Result<u64, IndexError> {
        Ok(0)
    }
}

#[test]
fn backend_read_failures_degrade_the_query_instead_of_failing_it() {
    let index = Arc::new(FingerprintIndex::new(Box::new(ReadFailingBackend)));
    let engine = SearchEngine::new(index, TokenFilter::default(), SearchConfig::default())
        .expect("valid config");

    let report = engine
        .lookup("**kern\n4c\n4d\n4e\n4f\n*-\n", 0)
        .expect("query must survive backend failure");

    assert!(report.degraded);
    assert!(!report.errors.is_empty());
    assert!(report.results.is_empty());
}

struct WriteFailingBackend;

impl IndexBackend for WriteFailingBackend {
    fn append_batch(&self, _records: &[IndexRecord]) -> Result<usize, IndexError> {
        Err(IndexError::write("disk full"))
    }

    fn records_for(&self, _fingerprint: i64) -> Result<Vec<IndexRecord>, IndexError> {
        Ok(Vec::new())
    }

    fn distinct_source_count(&self) -> Result<u64, IndexError> {
        Ok(0)
    }
}

#[test]
fn write_failures_surface_as_index_errors() {
    let index = FingerprintIndex::new(Box::new(WriteFailingBackend));
    let record = IndexRecord {
        fingerprint: 1,
        source_id: "a.krn".into(),
        voice_name: String::new(),
        dataset_name: String::new(),
        gram_size: 3,
        gram_text: "4c4d4e".into(),
    };
    let err = index.bulk_insert(&[record]).expect_err("write must fail");
    assert!(matches!(err, IndexError::Write(_)));
}

#[test]
fn invalid_settings_are_fatal_before_any_request() {
    let settings = IngestSettings {
        data_dir: PathBuf::from("/data/corpus"),
        db_path: PathBuf::from("/tmp/index.redb"),
        gram_size_min: 5,
        gram_size_max: 2,
        csv_mirror: None,
        query_gram_size: None,
        fingerprint_seed: kernhash::DEFAULT_FINGERPRINT_SEED,
        filter: FilterConfig::default(),
    };
    assert!(settings.validate().is_err());
}
