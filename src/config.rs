//! YAML configuration file support for the duplicate scanner.
//!
//! This module lets deployments describe the comparator, index, and
//! preprocessor sections in a single YAML file and apply them to an index at
//! startup. The core itself never reads files or environment variables; the
//! host application decides when (and whether) to load one of these.
//!
//! ## Example YAML configuration
//!
//! ```yaml
//! # Audio duplicate scanner configuration
//! version: "1.0"
//! name: "archive scan"
//!
//! comparator:
//!   similarity_threshold: 0.85
//!   bit_error_threshold: 0.15
//!   minimum_overlap: 10
//!   max_alignment_offset: 360
//!   alignment_step: 6
//!   sliding_window_size: 60
//!   sliding_window_stride: 30
//!   segment_min_similarity_factor: 0.8
//!   group_coverage_min: 0.5
//!   group_min_matching_segments: 3
//!
//! index:
//!   hash_threshold: 5
//!
//! preprocess:
//!   trim_silence: true
//!   silence_threshold_db: -55.0
//!   normalize_sample_rate: true
//!   target_sample_rate: 44100
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use comparator::ComparatorConfig;
use fingerprint::preprocess::PreprocessConfig;
use index::{FingerprintIndex, IndexError};

/// Errors that can occur when loading a YAML configuration file.
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("unsupported config version: {0}")]
    UnsupportedVersion(String),
}

/// Index-level options in the YAML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexYamlConfig {
    #[serde(default = "default_hash_threshold")]
    pub hash_threshold: usize,
}

fn default_hash_threshold() -> usize {
    index::DEFAULT_HASH_THRESHOLD
}

impl Default for IndexYamlConfig {
    fn default() -> Self {
        Self {
            hash_threshold: default_hash_threshold(),
        }
    }
}

impl IndexYamlConfig {
    fn validate(&self) -> Result<(), ConfigLoadError> {
        if self.hash_threshold < 1 {
            return Err(ConfigLoadError::Validation(
                "index.hash_threshold must be >= 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Top-level YAML configuration for a scan deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ScanConfig {
    /// Configuration format version.
    #[serde(default = "default_config_version")]
    pub version: String,

    /// Optional configuration name/description.
    #[serde(default)]
    pub name: Option<String>,

    /// Comparator thresholds and alignment parameters.
    #[serde(default)]
    pub comparator: ComparatorConfig,

    /// Index-level options.
    #[serde(default)]
    pub index: IndexYamlConfig,

    /// Preprocessor surface shared with the fingerprint producer. The core
    /// never consumes these; they are parsed and validated here so one file
    /// can configure the whole deployment.
    #[serde(default)]
    pub preprocess: PreprocessConfig,
}

fn default_config_version() -> String {
    "1.0".to_string()
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            version: default_config_version(),
            name: None,
            comparator: ComparatorConfig::default(),
            index: IndexYamlConfig::default(),
            preprocess: PreprocessConfig::default(),
        }
    }
}

impl ScanConfig {
    /// Load a YAML configuration file from the given path.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigLoadError> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse YAML configuration from a string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigLoadError> {
        let config: ScanConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigLoadError> {
        match self.version.as_str() {
            "1.0" | "1" => {}
            v => return Err(ConfigLoadError::UnsupportedVersion(v.to_string())),
        }

        self.comparator
            .validate()
            .map_err(|err| ConfigLoadError::Validation(err.to_string()))?;
        self.index.validate()?;
        self.preprocess
            .validate()
            .map_err(|err| ConfigLoadError::Validation(err.to_string()))?;

        Ok(())
    }

    /// Publish the comparator and index sections to an existing index.
    pub fn apply_to_index(&self, target: &FingerprintIndex) -> Result<(), IndexError> {
        target.set_comparator_config(self.comparator.clone())?;
        target.set_hash_threshold(self.index.hash_threshold)?;
        Ok(())
    }
}
