//! `aeolus` — summarize aeolian transport from flat wind/forecast files.
//!
//! Usage: aeolus [--csv] <config.toml> <file>...
//!
//! Files are merged in the order given. The summary table goes to stdout as
//! JSON (default) or CSV; logs go to stderr.

use std::io;
use std::path::{Path, PathBuf};
use std::process;

use aeolus_service::config::AnalysisConfig;
use aeolus_service::logging::{self, LogLevel, Stage};
use aeolus_service::model::AnalysisError;
use aeolus_service::pipeline::Pipeline;

fn main() {
    dotenv::dotenv().ok();
    logging::init_logger(LogLevel::Info, true);

    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let csv_output = match args.iter().position(|a| a == "--csv") {
        Some(i) => {
            args.remove(i);
            true
        }
        None => false,
    };
    if args.len() < 2 {
        eprintln!("usage: aeolus [--csv] <config.toml> <file>...");
        process::exit(2);
    }

    if let Err(e) = run(Path::new(&args[0]), &args[1..], csv_output) {
        logging::error(Stage::System, None, &e.to_string());
        process::exit(1);
    }
}

fn run(config_path: &Path, files: &[String], csv_output: bool) -> Result<(), AnalysisError> {
    let config = AnalysisConfig::load(config_path)?;
    let files: Vec<PathBuf> = files.iter().map(PathBuf::from).collect();
    let report = Pipeline::new(config).run(&files)?;

    if csv_output {
        report.summary.write_csv(io::stdout().lock())?;
    } else {
        println!("{}", report.summary.to_json()?);
    }
    Ok(())
}
