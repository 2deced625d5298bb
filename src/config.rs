//! Tunables for the query engine, loadable from TOML.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Engine configuration.
///
/// ```toml
/// cache_capacity = 1024
/// max_condition_depth = 64
/// max_in_list = 4096
/// max_literal_depth = 64
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QueryConfig {
    /// Maximum statements held by the query cache; `0` disables caching.
    pub cache_capacity: usize,
    /// Maximum nesting of `not` and parenthesised groups in a `where` clause.
    pub max_condition_depth: usize,
    /// Maximum number of literals in an `in (...)` list.
    pub max_in_list: usize,
    /// Maximum nesting of `{...}`, `[...]` and `convert(...)` literals.
    pub max_literal_depth: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            cache_capacity: 1024,
            max_condition_depth: 64,
            max_in_list: 4096,
            max_literal_depth: 64,
        }
    }
}

impl QueryConfig {
    /// Parses a configuration from TOML text. Missing keys take their defaults.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|source| ConfigError::ParseStr { source })
    }

    /// Loads the configuration at `path`, or defaults when the file is absent.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Loads `explicit` when given, otherwise the per-user default location.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        match explicit.map(Path::to_path_buf).or_else(default_config_path) {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }

    /// Serializes the configuration back to TOML.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|source| ConfigError::Serialize { source })
    }
}

/// Errors raised while reading configuration files.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file exists but could not be read.
    #[error("failed to read config {}: {source}", .path.display())]
    Read {
        /// Path that failed.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// The file is not valid TOML for [`QueryConfig`].
    #[error("failed to parse config {}: {source}", .path.display())]
    Parse {
        /// Path that failed.
        path: PathBuf,
        /// Underlying TOML error.
        source: toml::de::Error,
    },
    /// Inline TOML text is not valid for [`QueryConfig`].
    #[error("failed to parse config: {source}")]
    ParseStr {
        /// Underlying TOML error.
        source: toml::de::Error,
    },
    /// The configuration could not be rendered as TOML.
    #[error("failed to serialize config: {source}")]
    Serialize {
        /// Underlying TOML error.
        source: toml::ser::Error,
    },
}

/// Per-user configuration file location, `<config dir>/quill/config.toml`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|base| base.join("quill").join("config.toml"))
}
