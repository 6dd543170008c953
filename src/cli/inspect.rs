//! Read-only commands: report, info, hash, debug

use std::io::Write;
use std::path::PathBuf;

use anyhow::{bail, Result};

use super::app::Session;
use super::output::Output;
use crate::domain::{CoverageData, Hasher};
use crate::storage::datafile;

fn load(session: &Session) -> Result<CoverageData> {
    let mut data = CoverageData::new();
    session.files.read(&mut data)?;
    Ok(data)
}

pub fn report(session: &Session, output: &Output, full_path: bool) -> Result<()> {
    let data = load(session)?;
    if data.is_empty() {
        bail!("No data to report.");
    }

    let counts = data.line_counts(full_path);
    if output.is_json() {
        output.data(&counts);
        return Ok(());
    }

    let width = counts.keys().map(|name| name.len()).max().unwrap_or(0).max(4);
    println!("{:<width$}  {:>6}", "Name", "Lines", width = width);
    let mut total = 0;
    for (name, count) in &counts {
        println!("{:<width$}  {:>6}", name, count, width = width);
        total += count;
    }
    println!("{:<width$}  {:>6}", "TOTAL", total, width = width);
    Ok(())
}

pub fn info(session: &Session, output: &Output) -> Result<()> {
    let filename = session.files.filename();
    let data = load(session)?;
    let measured = data.measured_files();

    if output.is_json() {
        output.data(&serde_json::json!({
            "path": filename.display().to_string(),
            "exists": filename.exists(),
            "has_arcs": data.has_arcs(),
            "files": measured,
            "runs": data.run_infos(),
        }));
        return Ok(());
    }

    output.row(&["path:", &filename.display().to_string()]);
    if !filename.exists() {
        output.row(&["", "(no data file)"]);
        return Ok(());
    }
    output.row(&["has_arcs:", &data.has_arcs().to_string()]);
    output.row(&["files:", &measured.len().to_string()]);
    for &name in &measured {
        match data.file_tracer(name) {
            Some(tracer) if !tracer.is_empty() => output.row(&["", name, tracer]),
            _ => output.row(&["", name]),
        }
    }
    output.row(&["runs:", &data.run_infos().len().to_string()]);
    for run in data.run_infos() {
        output.row(&["", &serde_json::to_string(run)?]);
    }
    Ok(())
}

pub fn hash(session: &Session, output: &Output, file: &str) -> Result<()> {
    let data = load(session)?;
    if data.file_tracer(file).is_none() {
        bail!("File '{}' was not measured", file);
    }

    let mut hasher = Hasher::new();
    data.add_to_hash(file, &mut hasher);
    let digest = hasher.hexdigest();

    if output.is_json() {
        output.data(&serde_json::json!({ "file": file, "hash": digest }));
    } else {
        println!("{}", digest);
    }
    Ok(())
}

pub fn debug(session: &Session, files: &[PathBuf]) -> Result<()> {
    let files = if files.is_empty() {
        vec![session.files.filename().to_path_buf()]
    } else {
        files.to_vec()
    };

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    datafile::debug_dump(&files, &mut out)?;
    out.flush()?;
    Ok(())
}
