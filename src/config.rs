//! Ingestion-side configuration.
//!
//! Settings come from an optional `kernhash` config file overridden by
//! `KERNHASH_*` environment variables. Anything wrong here — missing corpus
//! directory, inverted gram-size range, invalid filter pattern — is fatal at
//! startup; requests never see configuration errors.

use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;

use kern_gram::DEFAULT_FINGERPRINT_SEED;
use kern_match::SearchConfig;
use kern_notation::{FilterConfig, FilterError, TokenFilter};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration could not be loaded: {0}")]
    Load(String),
    #[error("invalid configuration: {0}")]
    Invalid(String),
    #[error(transparent)]
    Filter(#[from] FilterError),
}

/// Settings for corpus ingestion and query fingerprinting.
#[derive(Debug, Clone, Deserialize)]
pub struct IngestSettings {
    /// Root directory walked for `*.krn` corpus files.
    pub data_dir: PathBuf,

    /// Location of the embedded index database.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Smallest n-gram size stored per document.
    pub gram_size_min: usize,

    /// Largest n-gram size stored per document.
    pub gram_size_max: usize,

    /// Optional diagnostic CSV mirror of every ingested record.
    #[serde(default)]
    pub csv_mirror: Option<PathBuf>,

    /// Fixed query gram size; unset means "derive from the query length".
    #[serde(default)]
    pub query_gram_size: Option<usize>,

    /// Fingerprint seed shared between ingestion and querying.
    #[serde(default = "default_seed")]
    pub fingerprint_seed: u64,

    /// Token filter alphabet.
    #[serde(default)]
    pub filter: FilterConfig,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("data/kernhash.redb")
}

fn default_seed() -> u64 {
    DEFAULT_FINGERPRINT_SEED
}

impl IngestSettings {
    /// Load settings from `kernhash.{toml,json,yaml}` (optional) overridden
    /// by `KERNHASH_*` environment variables, then validate.
    pub fn load() -> Result<Self, ConfigError> {
        let builder = config::Config::builder()
            .add_source(config::File::with_name("kernhash").required(false))
            .add_source(
                config::Environment::with_prefix("KERNHASH")
                    .separator("__")
                    .try_parsing(true),
            );

        let settings: IngestSettings = builder
            .build()
            .map_err(|err| ConfigError::Load(err.to_string()))?
            .try_deserialize()
            .map_err(|err| ConfigError::Load(err.to_string()))?;

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.data_dir.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("data_dir must not be empty".into()));
        }
        if self.gram_size_min == 0 {
            return Err(ConfigError::Invalid(
                "gram_size_min must be at least 1".into(),
            ));
        }
        if self.gram_size_min > self.gram_size_max {
            return Err(ConfigError::Invalid(format!(
                "gram_size_min {} exceeds gram_size_max {}",
                self.gram_size_min, self.gram_size_max
            )));
        }
        if self.query_gram_size == Some(0) {
            return Err(ConfigError::Invalid(
                "query_gram_size must be at least 1".into(),
            ));
        }
        // Surface an invalid filter pattern now rather than mid-ingestion.
        TokenFilter::new(&self.filter)?;
        Ok(())
    }

    /// Compiled token filter for this configuration.
    pub fn token_filter(&self) -> Result<TokenFilter, ConfigError> {
        Ok(TokenFilter::new(&self.filter)?)
    }

    /// The matching-layer view of these settings.
    pub fn search_config(&self) -> SearchConfig {
        SearchConfig {
            gram_size_min: self.gram_size_min,
            gram_size_max: self.gram_size_max,
            query_gram_size: self.query_gram_size,
            fingerprint_seed: self.fingerprint_seed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_settings() -> IngestSettings {
        IngestSettings {
            data_dir: PathBuf::from("/data/corpus"),
            db_path: default_db_path(),
            gram_size_min: 3,
            gram_size_max: 8,
            csv_mirror: None,
            query_gram_size: None,
            fingerprint_seed: DEFAULT_FINGERPRINT_SEED,
            filter: FilterConfig::default(),
        }
    }

    #[test]
    fn valid_settings_pass() {
        assert!(base_settings().validate().is_ok());
    }

    #[test]
    fn zero_gram_size_min_is_fatal() {
        let settings = IngestSettings {
            gram_size_min: 0,
            ..base_settings()
        };
        assert!(matches!(settings.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn inverted_gram_range_is_fatal() {
        let settings = IngestSettings {
            gram_size_min: 9,
            gram_size_max: 3,
            ..base_settings()
        };
        assert!(matches!(settings.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn bad_filter_pattern_is_fatal() {
        let settings = IngestSettings {
            filter: FilterConfig {
                disallowed: "[broken".into(),
            },
            ..base_settings()
        };
        assert!(matches!(settings.validate(), Err(ConfigError::Filter(_))));
    }

    #[test]
    fn search_config_mirrors_settings() {
        let settings = IngestSettings {
            query_gram_size: Some(5),
            ..base_settings()
        };
        let search = settings.search_config();
        assert_eq!(search.gram_size_min, 3);
        assert_eq!(search.gram_size_max, 8);
        assert_eq!(search.query_gram_size, Some(5));
    }
}
