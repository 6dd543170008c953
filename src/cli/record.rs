//! Record command: turns tracer output into a data file

use std::collections::BTreeMap;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::Args;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::app::Session;
use super::output::Output;
use crate::domain::{Arc, CoverageData, LineNo, RunInfo};
use crate::storage::DataSuffix;

#[derive(Args)]
pub struct RecordArgs {
    /// Tracer output JSON file, or `-` for stdin
    pub input: PathBuf,

    /// Write to a uniquely suffixed file for a later combine
    #[arg(long, conflicts_with = "suffix")]
    pub parallel: bool,

    /// Write to `<data-file>.<SUFFIX>`
    #[arg(long)]
    pub suffix: Option<String>,

    /// Merge into the existing data file instead of replacing it
    #[arg(long)]
    pub append: bool,

    /// Extra run information as key=value (repeatable)
    #[arg(long = "run-info", value_parser = parse_key_val)]
    pub run_info: Vec<(String, String)>,
}

/// What a tracer hands over at the end of a run
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct TracerOutput {
    #[serde(default)]
    lines: Option<BTreeMap<String, Vec<LineNo>>>,

    #[serde(default)]
    arcs: Option<BTreeMap<String, Vec<Arc>>>,

    #[serde(default)]
    file_tracers: BTreeMap<String, String>,

    #[serde(default)]
    run_info: RunInfo,
}

impl TracerOutput {
    fn parse(content: &str) -> Result<Self> {
        let output: TracerOutput = serde_json::from_str(content).context("Invalid tracer output")?;
        if output.lines.is_some() && output.arcs.is_some() {
            bail!("Tracer output can't have both lines and arcs");
        }
        Ok(output)
    }

    fn into_data(self) -> Result<CoverageData> {
        let mut data = CoverageData::new();
        if let Some(lines) = self.lines {
            data.set_lines(lines)?;
        }
        if let Some(arcs) = self.arcs {
            data.set_arcs(arcs)?;
        }
        data.set_file_tracers(self.file_tracers)?;
        if !self.run_info.is_empty() {
            data.add_run_info(self.run_info);
        }
        Ok(data)
    }
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected key=value, got '{}'", s)),
    }
}

/// JSON values are kept as JSON, anything else is a string
fn run_info_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn read_input(input: &Path) -> Result<String> {
    if input == Path::new("-") {
        let mut content = String::new();
        std::io::stdin()
            .read_to_string(&mut content)
            .context("Failed to read tracer output from stdin")?;
        Ok(content)
    } else {
        fs::read_to_string(input).with_context(|| format!("Failed to read {}", input.display()))
    }
}

pub fn run(session: &Session, output: &Output, args: RecordArgs) -> Result<()> {
    let tracer = TracerOutput::parse(&read_input(&args.input)?)?;
    if session.config.run.branch && tracer.lines.is_some() {
        warn!("Branch measurement is configured but the tracer reported lines");
    }

    let mut data = tracer.into_data()?;
    data.add_run_info([
        ("when".to_string(), Value::from(Utc::now().to_rfc3339())),
        ("version".to_string(), Value::from(env!("CARGO_PKG_VERSION"))),
    ]);
    data.add_run_info(
        args.run_info
            .iter()
            .map(|(key, value)| (key.clone(), run_info_value(value))),
    );

    let suffix = if args.parallel || session.config.run.parallel {
        Some(DataSuffix::Unique)
    } else {
        args.suffix.map(DataSuffix::Named)
    };

    if args.append {
        let mut existing = CoverageData::new();
        session.files.read(&mut existing)?;
        debug!("Appending to {} measured files", existing.measured_files().len());
        existing.update(&data, None)?;
        data = existing;
    }

    let written = session.files.write(&data, suffix.as_ref())?;
    let measured = data.measured_files().len();

    if output.is_json() {
        output.data(&serde_json::json!({
            "written": written.display().to_string(),
            "files": measured,
            "arcs": data.has_arcs(),
        }));
    } else {
        output.success(&format!(
            "Wrote data for {} files to {}",
            measured,
            written.display()
        ));
    }

    Ok(())
}
