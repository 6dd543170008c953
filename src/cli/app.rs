//! Main CLI application structure

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use super::output::{Output, OutputFormat};
use super::{combine, inspect, record};
use crate::storage::{Config, DataFiles};

#[derive(Parser)]
#[command(name = "covdata")]
#[command(author, version, about = "Record, combine and inspect coverage data files")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output format
    #[arg(long, short = 'f', global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Enable debug logging
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Base data file (overrides the config file)
    #[arg(long, global = true, env = "COVERAGE_FILE")]
    pub data_file: Option<PathBuf>,

    /// Configuration file (defaults to .covstore.toml if present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Record tracer output as a data file
    Record(record::RecordArgs),

    /// Combine parallel data files into the base data file
    Combine {
        /// Directories to look in (defaults to config, then the data file's directory)
        dirs: Vec<PathBuf>,

        /// Include the existing base data file in the result
        #[arg(long)]
        append: bool,
    },

    /// Delete the base data file
    Erase,

    /// Show executed line counts per file
    Report {
        /// Key by full path instead of base name
        #[arg(long)]
        full_path: bool,
    },

    /// Show a summary of the data file
    Info,

    /// Print the fingerprint of one measured file
    Hash {
        /// Measured file name, as recorded
        file: String,
    },

    /// Dump the raw contents of data files
    Debug {
        /// Data files to dump (defaults to the base data file)
        files: Vec<PathBuf>,
    },
}

/// Configuration and data files resolved for one invocation
pub struct Session {
    pub config: Config,
    pub files: DataFiles,
}

impl Session {
    fn open(config_path: Option<&Path>, data_file: Option<&Path>) -> Result<Self> {
        let config = Config::load(config_path)?;
        let data_file = data_file.unwrap_or(&config.run.data_file);
        let files = DataFiles::new(data_file)?;
        Ok(Self { config, files })
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    // A subscriber may already be installed when running in-process
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .try_init();
}

/// Main entry point for the CLI
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let output = Output::new(cli.format);

    let session = Session::open(cli.config.as_deref(), cli.data_file.as_deref())?;
    tracing::debug!("Using data file {}", session.files.filename().display());

    match cli.command {
        Commands::Record(args) => record::run(&session, &output, args)?,
        Commands::Combine { dirs, append } => combine::combine(&session, &output, &dirs, append)?,
        Commands::Erase => combine::erase(&session, &output)?,
        Commands::Report { full_path } => inspect::report(&session, &output, full_path)?,
        Commands::Info => inspect::info(&session, &output)?,
        Commands::Hash { file } => inspect::hash(&session, &output, &file)?,
        Commands::Debug { files } => inspect::debug(&session, &files)?,
    }

    Ok(())
}
