//! Configuration handling
//!
//! Configuration is read from `.covstore.toml` in the current directory, or
//! from an explicit path. Every setting has a default, so the file is
//! optional.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::files::DEFAULT_DATA_FILE;
use crate::domain::PathAliases;

/// Name of the project configuration file
pub const CONFIG_FILE: &str = ".covstore.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to parse configuration: {0}")]
    Parse(String),
}

/// Settings for recording data
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Base name of the data file
    pub data_file: PathBuf,

    /// Write each run to a uniquely suffixed file
    pub parallel: bool,

    /// Expect arc data rather than line data
    pub branch: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            data_file: PathBuf::from(DEFAULT_DATA_FILE),
            parallel: false,
            branch: false,
        }
    }
}

/// Settings for combining data files
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CombineConfig {
    /// Directories to combine from when none are given
    pub data_dirs: Vec<PathBuf>,
}

/// One group of equivalent source locations
///
/// Paths matching any of `aliases` are rewritten to `canonical`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathsEntry {
    pub canonical: String,

    #[serde(default)]
    pub aliases: Vec<String>,
}

/// Full configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub run: RunConfig,
    pub combine: CombineConfig,
    pub paths: Vec<PathsEntry>,
}

impl Config {
    /// Loads `path` if given, otherwise `.covstore.toml` if present
    ///
    /// An explicit path must exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_file(path),
            None => {
                let default = Path::new(CONFIG_FILE);
                if default.exists() {
                    Self::load_file(default)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Loads configuration from a specific file
    pub fn load_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;

        Self::parse(&content).with_context(|| format!("Failed to parse config: {}", path.display()))
    }

    /// Parses configuration text
    pub fn parse(content: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.check()?;
        Ok(config)
    }

    fn check(&self) -> Result<(), ConfigError> {
        if self.run.data_file.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("run.data_file can't be empty".to_string()));
        }
        for entry in &self.paths {
            if entry.canonical.is_empty() {
                return Err(ConfigError::Invalid(
                    "paths entries need a canonical location".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Builds the path aliases from the `[[paths]]` groups, in file order
    pub fn path_aliases(&self) -> Result<PathAliases> {
        let mut aliases = PathAliases::new();
        for entry in &self.paths {
            for pattern in &entry.aliases {
                aliases
                    .add(pattern, &entry.canonical)
                    .with_context(|| format!("Bad alias pattern '{}' in [[paths]]", pattern))?;
            }
        }
        Ok(aliases)
    }
}
