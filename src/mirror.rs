//! Diagnostic CSV mirror of ingested records.
//!
//! Deliberately a dumb writer: values are not quoted or escaped, because the
//! canonical alphabet and source filenames never contain commas. The mirror
//! exists for offline inspection only, so write failures are logged and
//! swallowed — they must never fail an ingestion run.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use tracing::warn;

use kern_index::IndexRecord;

pub struct CsvMirror {
    path: PathBuf,
}

impl CsvMirror {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Appends one `source,voice,gram_size,gram_text,fingerprint` line per
    /// record.
    pub fn append(&self, records: &[IndexRecord]) {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path);
        let mut file = match file {
            Ok(file) => file,
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "csv mirror unavailable");
                return;
            }
        };

        for record in records {
            if let Err(err) = writeln!(
                file,
                "{},{},{},{},{}",
                record.source_id,
                record.voice_name,
                record.gram_size,
                record.gram_text,
                record.fingerprint
            ) {
                warn!(path = %self.path.display(), error = %err, "csv mirror write failed");
                return;
            }
        }
    }
}
