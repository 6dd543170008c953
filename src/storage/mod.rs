//! # Storage Layer
//!
//! Persistence for coverage data.
//!
//! ## Storage Formats
//!
//! | Data | Format | Location |
//! |------|--------|----------|
//! | Coverage data | Magic string + JSON | `.coverage` |
//! | Parallel data | Same, suffixed | `.coverage.<host>.<pid>.<random>` |
//! | Config | TOML | `.covstore.toml` |
//!
//! ## Concurrency Safety
//!
//! - Parallel writers each get their own suffixed file, so writers never
//!   share a path
//! - Reads take a shared `fs2` lock, writes an exclusive one
//! - Combining must wait until every writer has finished; it deletes the
//!   files it merges
//!
//! ## Key Types
//!
//! - [`DataFiles`] - Locates, writes and combines data files
//! - [`Config`] - Project configuration, including path aliases
//! - [`datafile`] - The file encoding itself

pub mod datafile;
mod config;
mod files;

pub use config::{CombineConfig, Config, ConfigError, PathsEntry, RunConfig, CONFIG_FILE};
pub use files::{file_be_gone, DataFiles, DataSuffix, DEFAULT_DATA_FILE};
