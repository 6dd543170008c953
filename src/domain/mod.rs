//! Domain models for coverage data
//!
//! Contains the data model, the merge algorithm and path aliasing, without
//! any file I/O.

mod aliases;
mod data;
mod error;
mod hasher;
mod paths;

pub use aliases::PathAliases;
pub use data::{Arc, CoverageData, DataPayload, LineNo, Measurements, RunInfo};
pub use error::DataError;
pub use hasher::{Fingerprint, Hasher};
pub use paths::{abs_file, canonical_filename, isabs_anywhere, normalize};
