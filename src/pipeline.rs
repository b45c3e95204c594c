//! End-to-end dedup run: read source tables, filter, merge, write the
//! combined table, then reconcile source statuses.
//!
//! Each phase reads everything it needs, computes, and writes once. Source
//! tables are only touched again by the reconciler after the combined table
//! is safely on disk.

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::DedupConfig;
use crate::filter::filter_min_rating;
use crate::merge::{merge_listings, SourceIndex};
use crate::models::{DedupStats, RawListing};
use crate::naming::combined_file_name;
use crate::progress::{format_duration, Reporter};
use crate::queries::expected_map_files;
use crate::reconcile::{included_keys, update_source_statuses};
use crate::safety::validate_output_path;
use crate::table::{write_combined, SourceTable};

/// How a run ended, when it did not fail outright.
#[derive(Debug)]
pub enum RunOutcome {
    Written { path: PathBuf, stats: DedupStats },
    /// Every row was filtered out or lacked a listing_link; nothing written
    NoSurvivors { stats: DedupStats },
}

impl RunOutcome {
    pub fn stats(&self) -> &DedupStats {
        match self {
            RunOutcome::Written { stats, .. } | RunOutcome::NoSurvivors { stats } => stats,
        }
    }
}

/// Split a comma-separated file list, trimming and dropping empty entries.
pub fn parse_file_list(arg: &str) -> Vec<String> {
    arg.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

/// Map tables named by a query file that exist in `config.maps_dir`.
/// Queries whose table was never scraped are skipped with a warning.
pub fn resolve_query_files(config: &DedupConfig, query_file: &Path) -> Result<Vec<String>> {
    let reporter = config.reporter();
    let expected = expected_map_files(query_file)
        .with_context(|| format!("Failed to read query file {}", query_file.display()))?;

    let (existing, missing): (Vec<String>, Vec<String>) = expected
        .into_iter()
        .partition(|name| config.source_path(name).is_file());
    for name in &missing {
        reporter.warn(None, &format!("No map table for query: {}", name));
    }
    if existing.is_empty() {
        bail!(
            "No map files found to combine for {} in {}",
            query_file.display(),
            config.maps_dir.display()
        );
    }

    println!(
        "Resolved {} map file(s) from {}",
        existing.len(),
        query_file.display()
    );
    Ok(existing)
}

/// Phase 1: read, normalize and rating-filter every table, concatenated in
/// input order. Unreadable tables are skipped and counted.
fn load_pool(
    paths: &[PathBuf],
    config: &DedupConfig,
    reporter: &Reporter,
    stats: &mut DedupStats,
) -> Vec<RawListing> {
    let pb = reporter.progress_bar(paths.len() as u64, "Phase 1: Reading tables");
    let mut pool = Vec::new();

    for (i, path) in paths.iter().enumerate() {
        match SourceTable::read(path) {
            Ok(table) => {
                let outcome = filter_min_rating(table.listings(), config.min_rating);
                stats.rows_before += outcome.before;
                stats.removed_by_rating += outcome.removed();
                stats.tables_read += 1;
                pool.extend(outcome.kept);
            }
            Err(e) => {
                reporter.warn(Some(&pb), &format!("Skipping {}: {:#}", path.display(), e));
                stats.tables_failed += 1;
            }
        }
        pb.inc(1);
        reporter.log_progress("read", (i + 1) as u64, paths.len() as u64, 10);
    }

    pb.finish_with_message(format!(
        "Phase 1: Read {} rows from {} tables ({} kept at rating >= {})",
        stats.rows_before,
        stats.tables_read,
        pool.len(),
        config.min_rating
    ));
    pool
}

fn finish(stats: &mut DedupStats, start: Instant, config: &DedupConfig, reporter: &Reporter) {
    stats.elapsed_seconds = start.elapsed().as_secs_f64();
    stats.print_summary();
    if reporter.is_log_only() {
        stats.log_phase("dedup");
    }
    if let Some(ref path) = config.stats_path {
        if let Err(e) = stats.write_to_file(path) {
            reporter.warn(None, &format!("Failed to write stats to {}: {:#}", path.display(), e));
        }
    }
}

/// Run the full merge over the named source tables (file names inside
/// `config.maps_dir`, in priority order).
pub fn run(config: &DedupConfig, files: &[String]) -> Result<RunOutcome> {
    let start = Instant::now();
    let reporter = config.reporter();

    if files.is_empty() {
        bail!("No input files provided. Nothing to do.");
    }

    let sources = SourceIndex::new(files.iter().cloned());
    if sources.len() < files.len() {
        reporter.warn(
            None,
            &format!(
                "Ignoring {} duplicate file name(s) in the input list",
                files.len() - sources.len()
            ),
        );
    }
    let names = sources.names().to_vec();

    let mut paths = Vec::with_capacity(names.len());
    for name in &names {
        let path = config.source_path(name);
        if !path.exists() {
            bail!("Not found in {}: {}", config.maps_dir.display(), name);
        }
        paths.push(path);
    }

    let mut stats = DedupStats {
        tables_requested: names.len(),
        min_rating: config.min_rating,
        ..Default::default()
    };

    let pool = load_pool(&paths, config, &reporter, &mut stats);
    if stats.tables_read == 0 {
        bail!("None of the {} source tables could be read", names.len());
    }

    // Phase 2: merge
    let spinner = reporter.spinner("Phase 2: Merging listings");
    let merged = merge_listings(&pool, &sources);
    stats.removed_no_link = merged.missing_key;
    stats.removed_by_dedup = merged.duplicates();
    stats.combined_rows = merged.listings.len();
    spinner.finish_with_message(format!(
        "Phase 2: Merged {} rows into {} listings",
        pool.len(),
        merged.listings.len()
    ));

    if merged.listings.is_empty() {
        println!("No rows left after filtering; nothing to combine.");
        finish(&mut stats, start, config, &reporter);
        return Ok(RunOutcome::NoSurvivors { stats });
    }

    let out_name = combined_file_name(&names);
    let out_path = config.combined_path(&out_name);
    validate_output_path(&out_path, &config.maps_dir, &paths)?;

    // Statuses must never claim success for rows that were not written
    if let Err(e) = write_combined(&out_path, &merged.listings, sources.len())
        .with_context(|| format!("Failed to write combined table {}", out_path.display()))
    {
        finish(&mut stats, start, config, &reporter);
        return Err(e);
    }
    stats.output_file = Some(out_path.display().to_string());

    // Phase 3: reconcile
    let included = included_keys(&merged.listings);
    let report = update_source_statuses(&paths, &included, &reporter);
    stats.statuses_success = report.counts.success;
    stats.statuses_pending = report.counts.pending;
    stats.status_write_failures = report.failures.len();

    finish(&mut stats, start, config, &reporter);
    if !reporter.is_log_only() {
        println!("Done in {}", format_duration(start.elapsed()));
    }

    Ok(RunOutcome::Written {
        path: out_path,
        stats,
    })
}
