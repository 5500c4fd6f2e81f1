//! Run configuration.
//!
//! An [`EtlConfig`] is read from a TOML file with three optional sections:
//!
//! ```toml
//! [input]
//! root = "data"
//! catalog_pattern = "song_data/*/*/*/*.json"
//! activity_pattern = "log_data/*/*/*.json"
//! playback_page = "NextSong"
//! malformed_records = "fail"   # or "skip"
//!
//! [output]
//! root = "output"
//! date_stamped = true
//!
//! [join]
//! duration_tolerance = 0.0     # omit or 0 for exact matching
//! ```
//!
//! Every key has a default, so an empty file (or no file) is valid. Callers
//! typically apply command-line overrides on top and then [`EtlConfig::validate`].

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use snafu::prelude::*;

use crate::transform::{DurationMatch, PLAYBACK_PAGE};

pub use crate::ingest::MalformedRecordPolicy;

/// Default catalog glob, relative to the input root.
pub const DEFAULT_CATALOG_PATTERN: &str = "song_data/*/*/*/*.json";

/// Default activity glob, relative to the input root.
pub const DEFAULT_ACTIVITY_PATTERN: &str = "log_data/*/*/*.json";

/// Errors raised while loading or validating configuration.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[snafu(display("Failed to read config file {}: {source}", path.display()))]
    Read {
        /// Path of the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML for [`EtlConfig`].
    #[snafu(display("Failed to parse config file {}: {source}", path.display()))]
    Parse {
        /// Path of the configuration file.
        path: PathBuf,
        /// Underlying TOML error.
        source: toml::de::Error,
    },

    /// A value is syntactically valid but unusable.
    #[snafu(display("Invalid configuration value for {key}: {reason}"))]
    Invalid {
        /// Dotted key, e.g. `input.catalog_pattern`.
        key: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

/// `[input]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InputConfig {
    /// Input root directory.
    pub root: String,
    /// Glob selecting catalog files under `root`.
    pub catalog_pattern: String,
    /// Glob selecting activity files under `root`.
    pub activity_pattern: String,
    /// `page` value that marks a playback event.
    pub playback_page: String,
    /// Handling of lines that fail to parse.
    pub malformed_records: MalformedRecordPolicy,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            root: "data".to_string(),
            catalog_pattern: DEFAULT_CATALOG_PATTERN.to_string(),
            activity_pattern: DEFAULT_ACTIVITY_PATTERN.to_string(),
            playback_page: PLAYBACK_PAGE.to_string(),
            malformed_records: MalformedRecordPolicy::default(),
        }
    }
}

/// `[output]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    /// Output root directory.
    pub root: String,
    /// Write under `<root>/<YYYY-MM-DD>` rather than directly under `root`.
    pub date_stamped: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            root: "output".to_string(),
            date_stamped: true,
        }
    }
}

/// `[join]` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct JoinConfig {
    /// Absolute tolerance for `length == duration`; `None` or `0` is exact.
    pub duration_tolerance: Option<f64>,
}

/// Complete configuration for one ETL run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EtlConfig {
    /// Input selection.
    pub input: InputConfig,
    /// Output placement.
    pub output: OutputConfig,
    /// Join behaviour.
    pub join: JoinConfig,
}

impl EtlConfig {
    /// Parse a configuration from TOML text.
    pub fn from_toml_str(text: &str, origin: &Path) -> Result<Self, ConfigError> {
        toml::from_str(text).context(ParseSnafu { path: origin })
    }

    /// Read and parse a TOML configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).context(ReadSnafu { path })?;
        Self::from_toml_str(&text, path)
    }

    /// Check values that deserialize fine but cannot drive a run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure!(
            !self.input.root.trim().is_empty(),
            InvalidSnafu {
                key: "input.root",
                reason: "must not be empty",
            }
        );
        ensure!(
            !self.output.root.trim().is_empty(),
            InvalidSnafu {
                key: "output.root",
                reason: "must not be empty",
            }
        );
        ensure!(
            !self.input.catalog_pattern.trim().is_empty(),
            InvalidSnafu {
                key: "input.catalog_pattern",
                reason: "must not be empty",
            }
        );
        ensure!(
            !self.input.activity_pattern.trim().is_empty(),
            InvalidSnafu {
                key: "input.activity_pattern",
                reason: "must not be empty",
            }
        );
        ensure!(
            !self.input.playback_page.is_empty(),
            InvalidSnafu {
                key: "input.playback_page",
                reason: "must not be empty",
            }
        );
        if let Some(eps) = self.join.duration_tolerance {
            ensure!(
                eps.is_finite() && eps >= 0.0,
                InvalidSnafu {
                    key: "join.duration_tolerance",
                    reason: format!("must be a finite, non-negative number (got {eps})"),
                }
            );
        }
        Ok(())
    }

    /// Duration comparison rule for the songplays join.
    pub fn duration_match(&self) -> DurationMatch {
        DurationMatch::from_tolerance(self.join.duration_tolerance)
    }
}
