//! `tod.toml` configuration.
//!
//! Resolution order, lowest to highest precedence: built-in defaults, the
//! config file, the `TOD_DATASET` environment variable, CLI flags.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tod_station_models::Typology;

/// Config file read when neither `--config` nor `TOD_CONFIG` is given.
pub const DEFAULT_CONFIG_FILE: &str = "tod.toml";

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "TOD_CONFIG";

/// Environment variable overriding the dataset path.
pub const DATASET_ENV: &str = "TOD_DATASET";

/// Errors that can occur while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file exists but could not be read.
    #[error("I/O error reading {path}: {source}")]
    Io {
        /// Path that failed.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The config file is not valid TOML for [`Config`].
    #[error("Invalid config {path}: {source}")]
    Parse {
        /// Path that failed.
        path: String,
        /// Underlying TOML error.
        source: toml::de::Error,
    },
}

/// Settings shared by every subcommand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Station CSV to analyse.
    pub dataset: PathBuf,
    /// Typology labels display views show when no `--typology` flag is
    /// given. Category counts are not narrowed by it.
    pub typologies: Vec<String>,
    /// Directory relative `--output` paths are resolved against.
    pub export_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dataset: PathBuf::from("stations.csv"),
            typologies: Typology::canonical()
                .iter()
                .map(|t| t.label().to_owned())
                .collect(),
            export_dir: PathBuf::from("."),
        }
    }
}

impl Config {
    /// Parses a config document. Absent keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if the document is invalid.
    pub fn from_toml_str(path: &str, text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError::Parse {
            path: path.to_owned(),
            source: e,
        })
    }

    /// Loads the config file named by `explicit`, else `TOD_CONFIG`, else
    /// [`DEFAULT_CONFIG_FILE`], then applies `TOD_DATASET`. A missing file
    /// yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file exists but cannot be read or
    /// parsed.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let path = explicit.map_or_else(
            || {
                std::env::var_os(CONFIG_ENV)
                    .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE), PathBuf::from)
            },
            Path::to_path_buf,
        );
        let display = path.display().to_string();

        let config = match std::fs::read_to_string(&path) {
            Ok(text) => {
                log::debug!("Loaded config from {display}");
                Self::from_toml_str(&display, &text)?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                if explicit.is_some() {
                    log::warn!("Config file {display} not found, using defaults");
                } else {
                    log::debug!("No config file at {display}, using defaults");
                }
                Self::default()
            }
            Err(e) => {
                return Err(ConfigError::Io {
                    path: display,
                    source: e,
                });
            }
        };

        Ok(config.with_dataset_override(std::env::var_os(DATASET_ENV)))
    }

    /// Replaces the dataset path when `dataset` is set and non-empty.
    #[must_use]
    pub fn with_dataset_override(mut self, dataset: Option<OsString>) -> Self {
        if let Some(dataset) = dataset.filter(|d| !d.is_empty()) {
            self.dataset = PathBuf::from(dataset);
        }
        self
    }

    /// Resolves an output path against [`Config::export_dir`].
    #[must_use]
    pub fn output_path(&self, output: &Path) -> PathBuf {
        if output.is_absolute() {
            output.to_path_buf()
        } else {
            self.export_dir.join(output)
        }
    }
}
