//! Line-oriented parser for multi-voice kern documents.
//!
//! The parser is a two-state automaton. In the header phase, lines populate
//! metadata, declare voices, and assign instrument names; the transition to
//! the event phase happens at the first line that is neither metadata nor a
//! whole-line interpretation ([`filters::is_interpretation`] with the known
//! voice count is the transition predicate). In the event phase every
//! whitespace column is appended to the voice at that column index. Parsing
//! stops permanently at the first line containing the terminator.

use std::collections::BTreeMap;

use regex::Regex;
use thiserror::Error;
use tracing::warn;

use crate::document::{Document, KernMetadata, Voice};
use crate::filters;
use crate::{TERMINATOR, VOICE_DECLARATION};

/// Marker prefix for reference metadata lines.
const METADATA_PREFIX: &str = "!!!";

/// Marker for instrument-class assignment lines.
const INSTRUMENT_MARKER: &str = "*I";

/// Errors raised while parsing one document.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Event data began before any voice-declaration line was seen. The
    /// document has nowhere to put its tokens.
    #[error("{source_id}:{line}: event data before any voice declaration")]
    NoVoices { source_id: String, line: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Header,
    Events,
}

/// Parses raw kern text into a [`Document`].
///
/// A document with metadata but no voice declarations parses to an empty
/// voice mapping; only event data without a prior declaration is an error.
/// Malformed metadata lines are logged and skipped, never fatal.
pub fn parse(source_id: impl Into<String>, text: &str) -> Result<Document, ParseError> {
    let source_id = source_id.into();
    let mut metadata = KernMetadata::default();
    let mut voices: BTreeMap<usize, Voice> = BTreeMap::new();
    let mut phase = Phase::Header;
    // Compiled once per document, when the voice count becomes known.
    let mut interpretation: Option<Regex> = None;

    for (idx, raw) in text.lines().enumerate() {
        let lineno = idx + 1;
        // Tolerate CRLF input from the conversion boundary.
        let line = raw.strip_suffix('\r').unwrap_or(raw);

        if line.contains(TERMINATOR) {
            break;
        }

        if let Some(rest) = line.strip_prefix(METADATA_PREFIX) {
            match rest.split_once(':') {
                Some((key, value)) => metadata.set(key.trim(), value.trim()),
                None => warn!(%source_id, lineno, line, "skipping malformed metadata line"),
            }
            continue;
        }

        if line.contains(VOICE_DECLARATION) {
            let columns = declare_voices(line, &mut voices);
            interpretation = Some(filters::interpretation_line(columns));
            continue;
        }

        if line.contains(INSTRUMENT_MARKER) {
            assign_instrument_names(line, &mut voices);
            continue;
        }

        if phase == Phase::Header {
            match interpretation.as_ref() {
                Some(pattern) if pattern.is_match(line) => continue,
                Some(_) => phase = Phase::Events,
                None if line.trim().is_empty() => continue,
                None => {
                    return Err(ParseError::NoVoices {
                        source_id,
                        line: lineno,
                    })
                }
            }
        }

        // Columns beyond the declared voice count are ignored.
        for (column, token) in line.split_whitespace().enumerate() {
            if let Some(voice) = voices.get_mut(&column) {
                voice.push_token(token);
            }
        }
    }

    Ok(Document::new(source_id, metadata, voices))
}

/// One [`Voice`] per `**kern` column, indexed by column position. Columns
/// holding other exclusive interpretations keep their index but get no voice.
/// Returns the total column count of the declaration line, which fixes the
/// arity of whole-line interpretation matching.
fn declare_voices(line: &str, voices: &mut BTreeMap<usize, Voice>) -> usize {
    let mut columns = 0;
    for (column, token) in line.split_whitespace().enumerate() {
        if token == VOICE_DECLARATION {
            voices.insert(column, Voice::new(column));
        }
        columns = column + 1;
    }
    columns
}

fn assign_instrument_names(line: &str, voices: &mut BTreeMap<usize, Voice>) {
    for (column, token) in line.split_whitespace().enumerate() {
        if filters::is_instrument_class(token) {
            if let Some(voice) = voices.get_mut(&column) {
                voice.set_name(filters::filter_instrument_class(token));
            }
        }
    }
}
