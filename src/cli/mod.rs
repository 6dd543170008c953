//! # Command-Line Interface
//!
//! The `covdata` front end over [`crate::storage::DataFiles`].
//!
//! ## Commands
//!
//! | Command | Purpose |
//! |---------|---------|
//! | `record` | Write tracer output as a (possibly parallel) data file |
//! | `combine` | Merge parallel data files into the base file |
//! | `erase` | Delete the base data file |
//! | `report` | Executed line counts per file |
//! | `info` | Measured files, measurement kind and runs |
//! | `hash` | Fingerprint of one file's results |
//! | `debug` | Raw dump of data files |
//!
//! ## Output Formats
//!
//! All commands support `--format` flag:
//! - `text` (default) - Human-readable output
//! - `json` - Machine-parseable JSON
//!
//! ## Logging
//!
//! Diagnostics go to stderr through `tracing`. `--verbose` turns on debug
//! logging, otherwise `RUST_LOG` applies:
//! ```bash
//! RUST_LOG=coverage_store=debug covdata combine
//! ```
//!
//! ## Entry Point
//!
//! Call [`run()`] to parse arguments and execute the appropriate command.

mod app;
mod output;
mod record;
mod combine;
mod inspect;

pub use app::{Cli, Commands, run};
pub use output::{Output, OutputFormat};
