use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

use maps_dedup::config::{DedupConfig, DEFAULT_COMBINED_DIR, DEFAULT_MAPS_DIR};
use maps_dedup::filter::DEFAULT_MIN_RATING;
use maps_dedup::pipeline::{self, RunOutcome};

#[derive(Parser)]
#[command(name = "maps-dedup")]
#[command(about = "Merge per-query Google Maps tables into one deduplicated table and sync review status")]
struct Args {
    /// Source table names (comma-separated, relative to --maps-dir)
    #[arg(required_unless_present = "query_file")]
    files: Option<String>,

    /// Query spreadsheet (CSV); combine the map tables of its successful queries
    #[arg(long, conflicts_with = "files")]
    query_file: Option<PathBuf>,

    #[arg(long, default_value = DEFAULT_MAPS_DIR)]
    maps_dir: PathBuf,

    #[arg(long, default_value = DEFAULT_COMBINED_DIR)]
    combined_dir: PathBuf,

    /// Minimum rating to keep (inclusive)
    #[arg(long, default_value_t = DEFAULT_MIN_RATING)]
    min_rating: f64,

    /// Log-only mode: disable progress bars, print periodic status lines
    #[arg(long)]
    log_only: bool,

    /// Write run statistics as JSON to this path
    #[arg(long)]
    stats_json: Option<PathBuf>,
}

impl From<Args> for DedupConfig {
    fn from(args: Args) -> Self {
        Self {
            maps_dir: args.maps_dir,
            combined_dir: args.combined_dir,
            min_rating: args.min_rating,
            log_only: args.log_only,
            stats_path: args.stats_json,
        }
    }
}

fn run() -> Result<ExitCode> {
    let args = Args::parse();
    let files = args.files.clone();
    let query_file = args.query_file.clone();
    let config = DedupConfig::from(args);

    let files = match query_file {
        Some(path) => pipeline::resolve_query_files(&config, &path)?,
        None => pipeline::parse_file_list(files.as_deref().unwrap_or_default()),
    };

    match pipeline::run(&config, &files)? {
        RunOutcome::Written { .. } => Ok(ExitCode::SUCCESS),
        RunOutcome::NoSurvivors { .. } => Ok(ExitCode::FAILURE),
    }
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
