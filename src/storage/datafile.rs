//! Data file encoding
//!
//! A data file is a fixed magic string followed by a JSON object with up to
//! four keys:
//!
//! ```text
//! !coverage.py: This is a private format, don't read it directly!{"lines": {"a.py": [1, 2]}}
//! ```
//!
//! The magic string is a sniff guard: anything that doesn't start with it is
//! refused. The format is private; go through [`CoverageData`] instead of
//! reading it directly.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use serde_json::Value;
use tracing::debug;

use crate::domain::{CoverageData, DataError, DataPayload};

/// Leading bytes of every data file
pub const MAGIC: &str = "!coverage.py: This is a private format, don't read it directly!";

/// Writes `data` in data file format to `writer`
pub fn write<W: Write>(data: &CoverageData, writer: &mut W) -> Result<(), DataError> {
    writer.write_all(MAGIC.as_bytes())?;
    serde_json::to_writer(&mut *writer, &data.to_payload())?;
    Ok(())
}

/// Replaces the contents of `data` with what `reader` holds
pub fn read<R: Read>(data: &mut CoverageData, reader: R) -> Result<(), DataError> {
    let payload: DataPayload = serde_json::from_value(read_raw(reader)?)?;
    data.load_payload(payload)
}

/// Reads the undecoded JSON payload, for debugging
pub fn read_raw<R: Read>(mut reader: R) -> Result<Value, DataError> {
    let mut content = String::new();
    reader.read_to_string(&mut content)?;
    let json = content.strip_prefix(MAGIC).ok_or(DataError::NotADataFile)?;
    Ok(serde_json::from_str(json)?)
}

/// Writes `data` to the file at `path`
pub fn write_file(data: &CoverageData, path: &Path) -> Result<(), DataError> {
    debug!("Writing data to {:?}", path.display().to_string());

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)?;

    // Truncate only once we hold the lock
    FileExt::lock_exclusive(&file)?;
    file.set_len(0)?;

    let mut writer = BufWriter::new(&file);
    write(data, &mut writer)?;
    writer.flush()?;

    // Lock is released when file is dropped
    Ok(())
}

/// Reads the file at `path` into `data`, replacing what it held
///
/// Every failure is reported with the file name. `data` is unchanged if the
/// read fails.
pub fn read_file(data: &mut CoverageData, path: &Path) -> Result<(), DataError> {
    debug!("Reading data from {:?}", path.display().to_string());
    open_for_reading(path)
        .and_then(|file| read(data, file))
        .map_err(|e| DataError::reading(path, e))
}

/// Reads the raw JSON payload of the file at `path`
pub fn read_raw_file(path: &Path) -> Result<Value, DataError> {
    open_for_reading(path)
        .and_then(read_raw)
        .map_err(|e| DataError::reading(path, e))
}

fn open_for_reading(path: &Path) -> Result<File, DataError> {
    let file = File::open(path)?;
    FileExt::lock_shared(&file)?;
    Ok(file)
}

/// Default file dumped when no names are given
pub const DEFAULT_DUMP_FILE: &str = ".coverage";

/// Writes a human-readable dump of each file's raw payload to `out`
pub fn debug_dump<W: Write>(filenames: &[PathBuf], out: &mut W) -> Result<(), DataError> {
    let default = [PathBuf::from(DEFAULT_DUMP_FILE)];
    let filenames = if filenames.is_empty() { &default[..] } else { filenames };

    for filename in filenames {
        writeln!(out, "--- {} ------------------------------", filename.display())?;
        let raw = read_raw_file(filename)?;
        writeln!(out, "{}", serde_json::to_string_pretty(&raw)?)?;
    }
    Ok(())
}
