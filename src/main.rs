//! covdata - Record, combine and inspect coverage data files

use std::process::ExitCode;

fn main() -> ExitCode {
    if let Err(e) = coverage_store::cli::run() {
        eprintln!("Error: {:#}", e);
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
