//! Error type shared by the store, the aliases and the file layer

use std::path::PathBuf;

use thiserror::Error;

/// Every failure the coverage store can report.
///
/// All variants are the same kind of error to callers; the variants exist so
/// tests and the CLI can tell them apart without matching on messages.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("Can't add lines to existing arc data")]
    LinesIntoArcs,

    #[error("Can't add arcs to existing line data")]
    ArcsIntoLines,

    #[error("Can't combine arc data with line data")]
    CombineArcsWithLines,

    #[error("Can't combine line data with arc data")]
    CombineLinesWithArcs,

    #[error("Can't add file tracer data for unmeasured file '{0}'")]
    UnmeasuredFile(String),

    #[error("Conflicting file tracer name for '{path}': '{existing}' vs '{incoming}'")]
    ConflictingTracer {
        path: String,
        existing: String,
        incoming: String,
    },

    #[error("Pattern must not end with wildcards.")]
    WildcardAtEnd(String),

    #[error("Couldn't combine from non-existent directory '{}'", .0.display())]
    MissingDirectory(PathBuf),

    #[error("Doesn't seem to be a coverage data file")]
    NotADataFile,

    #[error("Couldn't read data from '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: Box<DataError>,
    },

    #[error("Invalid path pattern '{pattern}': {reason}")]
    BadPattern { pattern: String, reason: String },

    #[error("Broken invariant: {0}")]
    Invariant(String),

    #[error("IoError: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSONDecodeError: {0}")]
    Json(#[from] serde_json::Error),
}

impl DataError {
    /// Wraps a read failure with the name of the file being read
    pub fn reading(path: impl Into<PathBuf>, source: DataError) -> Self {
        DataError::Read {
            path: path.into(),
            source: Box::new(source),
        }
    }
}
