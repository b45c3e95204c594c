use anyhow::{Context, Result};
use chrono::Datelike;
use clap::Parser;
use std::path::PathBuf;

use maps_dedup::scoring::{score_website, WebsiteMetrics};

#[derive(Parser)]
#[command(name = "score-website")]
#[command(about = "Score a listing's website quality from collected metrics")]
struct Args {
    /// JSON file with the collected metrics
    metrics: PathBuf,

    /// Year used for the content-age check (defaults to the current year)
    #[arg(long)]
    year: Option<i32>,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let raw = std::fs::read_to_string(&args.metrics)
        .with_context(|| format!("Failed to read metrics file {}", args.metrics.display()))?;
    let metrics: WebsiteMetrics = serde_json::from_str(&raw)
        .with_context(|| format!("Invalid metrics JSON in {}", args.metrics.display()))?;

    let year = args.year.unwrap_or_else(|| chrono::Local::now().year());
    let result = score_website(&metrics, year);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    println!("Score: {}", result.score);
    println!("Verdict: {}", if result.is_bad { "BAD" } else { "OK" });
    for r in &result.reasons {
        println!("  +{:<4} {}", r.penalty, r.reason);
    }
    Ok(())
}
