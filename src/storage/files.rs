//! Data file management
//!
//! [`DataFiles`] decides where data is stored. Parallel runs each write their
//! own suffixed file (`.coverage.<host>.<pid>.<random>`), so no two writers
//! ever share a path. A later combine step globs for `<base>.*`, merges every
//! match into one store, and deletes each file once it's merged.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use rand::Rng;
use tracing::{debug, info};

use super::datafile;
use crate::domain::{normalize, CoverageData, DataError, PathAliases};

/// Default base name of the data file
pub const DEFAULT_DATA_FILE: &str = ".coverage";

/// Suffix to add to the base file name when writing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSuffix {
    /// A suffix unique to this host, process and moment
    Unique,
    /// A caller-chosen suffix; empty means none
    Named(String),
}

/// Manages the data files for one base file name
#[derive(Debug, Clone)]
pub struct DataFiles {
    filename: PathBuf,
}

impl DataFiles {
    /// Creates a manager for `basename`, resolved to a normalized absolute
    /// path
    pub fn new(basename: impl AsRef<Path>) -> Result<Self, DataError> {
        let basename = basename.as_ref();
        let filename = if basename.is_absolute() {
            normalize(basename)
        } else {
            normalize(&std::env::current_dir()?.join(basename))
        };
        Ok(Self { filename })
    }

    /// Creates a manager for `.coverage` in the current directory
    pub fn in_current_dir() -> Result<Self, DataError> {
        Self::new(DEFAULT_DATA_FILE)
    }

    /// The absolute base file name
    pub fn filename(&self) -> &Path {
        &self.filename
    }

    /// Deletes the base data file; a missing file is not an error
    pub fn erase(&self) -> Result<(), DataError> {
        file_be_gone(&self.filename)?;
        Ok(())
    }

    /// Reads the base data file into `data`, if it exists
    pub fn read(&self, data: &mut CoverageData) -> Result<(), DataError> {
        if self.filename.exists() {
            datafile::read_file(data, &self.filename)?;
        }
        Ok(())
    }

    /// Writes `data` to the base file, or to a suffixed sibling
    ///
    /// Returns the path written.
    pub fn write(
        &self,
        data: &CoverageData,
        suffix: Option<&DataSuffix>,
    ) -> Result<PathBuf, DataError> {
        let suffix = match suffix {
            None => None,
            // Computed at the last moment so a forked process gets its own pid
            Some(DataSuffix::Unique) => Some(unique_suffix()),
            Some(DataSuffix::Named(name)) if name.is_empty() => None,
            Some(DataSuffix::Named(name)) => Some(name.clone()),
        };

        let filename = match suffix {
            Some(suffix) => {
                let mut name = self.filename.clone().into_os_string();
                name.push(".");
                name.push(suffix);
                PathBuf::from(name)
            }
            None => self.filename.clone(),
        };

        datafile::write_file(data, &filename)?;
        Ok(filename)
    }

    /// Combines every `<base>.*` file into `data`, deleting each once merged
    ///
    /// Files are looked for in each of `data_dirs`, or in the base file's own
    /// directory if none are given. Paths are mapped through `aliases`.
    /// Returns the number of files combined.
    ///
    /// Not atomic: if a file fails to merge, the files before it are already
    /// merged and deleted, and the rest are left on disk.
    pub fn combine_parallel_data(
        &self,
        data: &mut CoverageData,
        aliases: Option<&PathAliases>,
        data_dirs: &[PathBuf],
    ) -> Result<usize, DataError> {
        let (data_dir, local) = self.split();
        let dirs: Vec<PathBuf> = if data_dirs.is_empty() {
            vec![data_dir]
        } else {
            data_dirs.to_vec()
        };

        let mut files_to_combine = Vec::new();
        for dir in &dirs {
            if !dir.is_dir() {
                return Err(DataError::MissingDirectory(dir.clone()));
            }
            files_to_combine.extend(matching_files(dir, &local)?);
        }

        for path in &files_to_combine {
            let mut new_data = CoverageData::new();
            datafile::read_file(&mut new_data, path)?;
            data.update(&new_data, aliases)?;
            fs::remove_file(path)?;
            info!("Combined data file {}", path.display());
        }

        Ok(files_to_combine.len())
    }

    fn split(&self) -> (PathBuf, String) {
        let dir = self
            .filename
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let local = self
            .filename
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| DEFAULT_DATA_FILE.to_string());
        (dir, local)
    }
}

/// Files in `dir` named `<local>.<anything>`, sorted
fn matching_files(dir: &Path, local: &str) -> Result<Vec<PathBuf>, DataError> {
    let dir = if dir.is_absolute() {
        dir.to_path_buf()
    } else {
        std::env::current_dir()?.join(dir)
    };
    let pattern = format!(
        "{}/{}.*",
        glob::Pattern::escape(&dir.to_string_lossy()),
        glob::Pattern::escape(local)
    );
    debug!(pattern = %pattern, "Looking for data files");

    let options = glob::MatchOptions {
        require_literal_leading_dot: false,
        ..glob::MatchOptions::new()
    };
    let entries = glob::glob_with(&pattern, options).map_err(|e| DataError::BadPattern {
        pattern: pattern.clone(),
        reason: e.to_string(),
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(glob::GlobError::into_error)?;
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Removes `path`, ignoring a file that's already gone
pub fn file_be_gone(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// `<host>.<pid>.<random>`, distinct for every parallel writer
fn unique_suffix() -> String {
    let random: u32 = rand::thread_rng().gen_range(0..1_000_000);
    format!("{}.{}.{:06}", hostname(), std::process::id(), random)
}

/// Best-effort host name, from the environment or `/etc/hostname`
fn hostname() -> String {
    std::env::var("HOSTNAME")
        .ok()
        .or_else(|| std::env::var("COMPUTERNAME").ok())
        .or_else(|| fs::read_to_string("/etc/hostname").ok())
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "localhost".to_string())
}
