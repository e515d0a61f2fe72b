//! Parsed document model: metadata plus per-voice token sequences.
//!
//! A [`Document`] is produced once by [`crate::parse`] and never mutated
//! afterward; downstream stages share it freely across threads.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::filters::{self, TokenFilter};

static YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d{4}").expect("year pattern"));

/// Reference metadata parsed from `!!!KEY: value` header lines.
///
/// Only the keys the retrieval layer cares about are mapped; anything else in
/// the header is ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernMetadata {
    pub catalog: Option<String>,
    pub catalog_number: Option<String>,
    pub collection_name: Option<String>,
    pub composer: Option<String>,
    pub composer_born: Option<String>,
    pub composer_died: Option<String>,
    pub title: Option<String>,
}

impl KernMetadata {
    /// Applies one header key/value pair. Unrecognized keys are a no-op.
    pub fn set(&mut self, key: &str, value: &str) {
        match key {
            "SCT" => self.set_catalog_name_and_number(value),
            "XEN" => self.collection_name = Some(value.to_string()),
            "COM" => self.composer = Some(value.to_string()),
            "CDT" => self.set_composer_dates(value),
            "OTL" => self.title = Some(value.to_string()),
            _ => {}
        }
    }

    // Catalog references come as "<catalog> <number>", e.g. "BWV 1046".
    fn set_catalog_name_and_number(&mut self, value: &str) {
        let mut parts = value.split_whitespace();
        self.catalog = parts.next().map(str::to_string);
        self.catalog_number = parts.next().map(str::to_string);
    }

    // Composer dates come in free-form ranges like "1685/-1750/" or
    // "1732-1809"; the first two four-digit years are birth and death.
    fn set_composer_dates(&mut self, value: &str) {
        let mut years = YEAR.find_iter(value);
        self.composer_born = years.next().map(|m| m.as_str().to_string());
        self.composer_died = years.next().map(|m| m.as_str().to_string());
    }
}

/// One melodic/rhythmic line within a document.
///
/// `index` is the token column position at first declaration and stays stable
/// for the lifetime of the document. Tokens are appended in file order during
/// parsing and never reordered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voice {
    index: usize,
    name: Option<String>,
    tokens: Vec<String>,
}

impl Voice {
    pub(crate) fn new(index: usize) -> Self {
        Self {
            index,
            name: None,
            tokens: Vec::new(),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Instrument-class label, when the header declared one.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub(crate) fn set_name(&mut self, name: String) {
        self.name = Some(name);
    }

    /// The raw tokens in document order, unfiltered.
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub(crate) fn push_token(&mut self, token: &str) {
        self.tokens.push(token.to_string());
    }

    /// The canonical token sequence: measure delimiters removed, disallowed
    /// characters stripped, null tokens dropped. Recomputed on demand; the
    /// raw tokens are left untouched.
    pub fn filtered_tokens(&self, filter: &TokenFilter) -> Vec<String> {
        self.tokens
            .iter()
            .filter(|token| !filters::is_measure_delimiter(token))
            .map(|token| filter.strip_disallowed_chars(token))
            .filter(|token| !filters::is_null_token(token))
            .collect()
    }
}

/// One corpus or query source: metadata plus voices keyed by column index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    source_id: String,
    dataset_name: Option<String>,
    metadata: KernMetadata,
    voices: BTreeMap<usize, Voice>,
}

impl Document {
    pub(crate) fn new(
        source_id: String,
        metadata: KernMetadata,
        voices: BTreeMap<usize, Voice>,
    ) -> Self {
        Self {
            source_id,
            dataset_name: None,
            metadata,
            voices,
        }
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    /// Provenance group for this document, attached by the ingestion layer.
    pub fn dataset_name(&self) -> Option<&str> {
        self.dataset_name.as_deref()
    }

    pub fn with_dataset_name(mut self, name: impl Into<String>) -> Self {
        self.dataset_name = Some(name.into());
        self
    }

    pub fn metadata(&self) -> &KernMetadata {
        &self.metadata
    }

    pub fn voices(&self) -> &BTreeMap<usize, Voice> {
        &self.voices
    }

    pub fn voice(&self, index: usize) -> Option<&Voice> {
        self.voices.get(&index)
    }

    pub fn voice_count(&self) -> usize {
        self.voices.len()
    }
}
