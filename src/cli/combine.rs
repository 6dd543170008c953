//! Combine and erase commands

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::info;

use super::app::Session;
use super::output::Output;
use crate::domain::CoverageData;

pub fn combine(session: &Session, output: &Output, dirs: &[PathBuf], append: bool) -> Result<()> {
    let aliases = session.config.path_aliases()?;
    let dirs = if dirs.is_empty() {
        &session.config.combine.data_dirs[..]
    } else {
        dirs
    };

    let mut data = CoverageData::new();
    if append {
        session.files.read(&mut data)?;
    }

    let combined = session
        .files
        .combine_parallel_data(&mut data, Some(&aliases), dirs)
        .context("Couldn't combine data files")?;

    if combined == 0 {
        if output.is_json() {
            output.data(&serde_json::json!({ "combined": 0 }));
        } else {
            output.success("No data files to combine");
        }
        return Ok(());
    }

    let written = session.files.write(&data, None)?;
    info!("Combined {} data files into {}", combined, written.display());

    if output.is_json() {
        output.data(&serde_json::json!({
            "combined": combined,
            "written": written.display().to_string(),
            "files": data.measured_files().len(),
        }));
    } else {
        output.success(&format!(
            "Combined {} data files into {}",
            combined,
            written.display()
        ));
    }

    Ok(())
}

pub fn erase(session: &Session, output: &Output) -> Result<()> {
    let filename = session.files.filename();
    session.files.erase()?;

    if output.is_json() {
        output.data(&serde_json::json!({ "erased": filename.display().to_string() }));
    } else {
        output.success(&format!("Erased {}", filename.display()));
    }
    Ok(())
}
