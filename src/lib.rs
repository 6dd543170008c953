//! Coverage Store - a mergeable store of code coverage facts
//!
//! Holds executed lines or arcs per file, the plugin that measured each
//! file, and metadata about every contributing run. Data recorded by many
//! processes, possibly on other machines, can be combined into one store,
//! with [`PathAliases`] rewriting foreign paths to local ones.

pub mod domain;
pub mod storage;
pub mod cli;

pub use domain::{CoverageData, DataError, Hasher, PathAliases};
pub use storage::{Config, DataFiles, DataSuffix};
