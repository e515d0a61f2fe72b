//! Token classification and normalization for kern notation.
//!
//! The predicates here are pure functions over single tokens (or, for
//! [`is_interpretation`], one whole line) and are safe to call concurrently.
//! Static grammars are compiled once; the configurable disallowed-character
//! pattern is compiled in [`TokenFilter::new`] so an invalid pattern fails at
//! startup rather than mid-ingestion.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::{FilterConfig, FilterError};

static REST_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+\.*r+$").expect("rest token pattern"));

static MEASURE_DELIMITER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^=+([0-9a-z]*(\|)?:?(\|){0,2})([;:!'`\-])?$").expect("measure delimiter pattern")
});

static INSTRUMENT_CLASS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\*I\S+$").expect("instrument class pattern"));

static INSTRUMENT_NAME_NOISE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-HJ-Za-z0-9]+").expect("instrument name pattern"));

// Body of a tandem interpretation: clef, key signature, meter, key, metric
// notation, or metronome marking. The leading `*` and the not-I / not-`**` /
// not-exclusive constraints are checked in code since the regex crate has no
// look-ahead.
static TANDEM_BODY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(clef[a-zA-Z]+[0-9]|k\[[a-zA-Z#\-]*\]|M\d+/\d+|[a-gA-G]:|met\([a-z]\)|M{2}[0-9]*)?\s*$")
        .expect("tandem interpretation pattern")
});

/// A null token is a single period: the voice has no new event at this line.
pub fn is_null_token(token: &str) -> bool {
    token == "."
}

/// A rest: duration digits, optional duration dots, one or more rest letters.
pub fn is_rest_token(token: &str) -> bool {
    REST_TOKEN.is_match(token)
}

/// A measure boundary: `=` marker, optional measure label, optional repeat
/// and barline markers, optional trailing ornament.
pub fn is_measure_delimiter(token: &str) -> bool {
    MEASURE_DELIMITER.is_match(token)
}

/// A spine-level instrument class marker, e.g. `*Iviola`.
pub fn is_instrument_class(token: &str) -> bool {
    INSTRUMENT_CLASS.is_match(token)
}

/// A tandem interpretation such as `*clefG2`, `*k[f#]`, `*M3/4`, `*d:` or
/// `*MM96`. Exclusive interpretations (`**kern`, `**silbe`) and instrument
/// markers are not tandem interpretations.
pub fn is_tandem_interpretation(token: &str) -> bool {
    let Some(rest) = token.strip_prefix('*') else {
        return false;
    };
    if rest.starts_with('*') || rest.starts_with('I') {
        return false;
    }
    if rest.starts_with("kern") || rest.starts_with("silbe") {
        return false;
    }
    TANDEM_BODY.is_match(rest)
}

/// Compiles the whole-line interpretation grammar for a known voice count:
/// exactly `voice_count` repetitions of an interpretation column.
///
/// The parser compiles this once per document when the voices are declared;
/// [`is_interpretation`] is the one-shot convenience form.
pub fn interpretation_line(voice_count: usize) -> Regex {
    let pattern = format!(r"^(\*+[a-zA-Z0-9:\[\]/#\-]*\s*){{{voice_count}}}$");
    Regex::new(&pattern).expect("interpretation line pattern")
}

/// True iff the entire line consists of `voice_count` interpretation columns.
/// This is the transition predicate between the parser's header phase and its
/// event phase: the first line that is neither metadata nor an interpretation
/// line begins the music data.
pub fn is_interpretation(line: &str, voice_count: usize) -> bool {
    interpretation_line(voice_count).is_match(line)
}

/// Strips the instrument-class signifier, keeping only the bare name:
/// `*Iviola` becomes `viola`.
pub fn filter_instrument_class(token: &str) -> String {
    INSTRUMENT_NAME_NOISE.replace_all(token, "").into_owned()
}

/// Drops trailing rest tokens from a sequence, keeping everything up to and
/// including the last non-rest token. A sequence whose last token is not a
/// rest is returned unchanged; an all-rest sequence trims to empty.
pub fn trim_trailing_rests(tokens: &[String]) -> &[String] {
    let mut end = tokens.len();
    while end > 0 && is_rest_token(&tokens[end - 1]) {
        end -= 1;
    }
    &tokens[..end]
}

/// Stateless-per-call token normalizer carrying the compiled
/// disallowed-character pattern.
#[derive(Debug, Clone)]
pub struct TokenFilter {
    disallowed: Regex,
}

impl TokenFilter {
    /// Builds a filter from configuration. An invalid pattern is a
    /// construction-time error, never a per-token one.
    pub fn new(cfg: &FilterConfig) -> Result<Self, FilterError> {
        let disallowed = Regex::new(&cfg.disallowed).map_err(|source| FilterError::InvalidPattern {
            pattern: cfg.disallowed.clone(),
            source,
        })?;
        Ok(Self { disallowed })
    }

    /// Removes every character outside the allowed alphabet. Deletes beaming,
    /// articulations, annotations and the like, leaving pitch and rhythm.
    pub fn strip_disallowed_chars(&self, token: &str) -> String {
        self.disallowed.replace_all(token, "").into_owned()
    }
}

impl Default for TokenFilter {
    fn default() -> Self {
        Self::new(&FilterConfig::default()).expect("default filter config is valid")
    }
}
