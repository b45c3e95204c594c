//! Status reconciliation: derive every source row's status from the keys that
//! made it into the combined output.
//!
//! Status is recomputed from scratch each run, never accumulated. A row that
//! was `success` last run flips back to `pending` if this run excluded it.

use anyhow::Error;
use rustc_hash::FxHashSet;
use std::path::PathBuf;

use crate::models::{CanonicalListing, ReviewStatus};
use crate::normalize::non_blank;
use crate::progress::Reporter;
use crate::table::{SourceTable, COL_LISTING_LINK, COL_STATUS};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileCounts {
    pub success: usize,
    pub pending: usize,
}

impl ReconcileCounts {
    fn add(&mut self, other: ReconcileCounts) {
        self.success += other.success;
        self.pending += other.pending;
    }
}

/// A source table that could not be read or written back.
#[derive(Debug)]
pub struct FileFailure {
    pub path: PathBuf,
    pub error: Error,
}

#[derive(Debug, Default)]
pub struct ReconcileReport {
    pub updated: usize,
    pub counts: ReconcileCounts,
    pub failures: Vec<FileFailure>,
}

/// Identity keys present in the combined output.
pub fn included_keys(listings: &[CanonicalListing]) -> FxHashSet<String> {
    listings
        .iter()
        .filter_map(|l| non_blank(Some(l.identity_key.as_str())))
        .map(str::to_string)
        .collect()
}

/// Status for one row given its raw listing_link cell.
pub fn row_status(link: Option<&str>, included: &FxHashSet<String>) -> ReviewStatus {
    match non_blank(link) {
        Some(key) if included.contains(key) => ReviewStatus::Success,
        _ => ReviewStatus::Pending,
    }
}

/// Rewrite the status column of one table in memory. A missing status column
/// is created first, defaulting to pending.
pub fn reconcile_table(table: &mut SourceTable, included: &FxHashSet<String>) -> ReconcileCounts {
    let status_col = table.ensure_column(COL_STATUS, ReviewStatus::Pending.as_str());
    let link_col = table.column(COL_LISTING_LINK);

    let mut counts = ReconcileCounts::default();
    for row in &mut table.rows {
        let link = link_col.and_then(|c| row.get(c)).map(String::as_str);
        let status = row_status(link, included);
        match status {
            ReviewStatus::Success => counts.success += 1,
            ReviewStatus::Pending => counts.pending += 1,
        }
        row[status_col] = status.as_str().to_string();
    }
    counts
}

/// Read, reconcile and write back every source table. Failures are collected
/// per file and do not stop the remaining files.
pub fn update_source_statuses(
    paths: &[PathBuf],
    included: &FxHashSet<String>,
    reporter: &Reporter,
) -> ReconcileReport {
    let mut report = ReconcileReport::default();
    let pb = reporter.progress_bar(paths.len() as u64, "Phase 3: Updating source statuses");

    for (i, path) in paths.iter().enumerate() {
        let result = SourceTable::read(path).and_then(|mut table| {
            let counts = reconcile_table(&mut table, included);
            table.write()?;
            Ok(counts)
        });

        match result {
            Ok(counts) => {
                report.updated += 1;
                report.counts.add(counts);
            }
            Err(error) => {
                reporter.warn(
                    Some(&pb),
                    &format!("Failed to update statuses for {}: {:#}", path.display(), error),
                );
                report.failures.push(FileFailure {
                    path: path.clone(),
                    error,
                });
            }
        }
        pb.inc(1);
        reporter.log_progress("statuses", (i + 1) as u64, paths.len() as u64, 10);
    }

    pb.finish_with_message(format!(
        "Phase 3: Updated status in {}/{} source files",
        report.updated,
        paths.len()
    ));
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn keys(values: &[&str]) -> FxHashSet<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_included_rows_succeed_regardless_of_prior_status() {
        let mut table = SourceTable::new(
            PathBuf::from("A.csv"),
            strings(&["listing_link", "status"]),
            vec![
                strings(&["K1", "pending"]),
                strings(&["K2", "success"]),
                strings(&["", "success"]),
                strings(&[" K1 ", "good"]),
            ],
        );
        let counts = reconcile_table(&mut table, &keys(&["K1"]));
        let statuses: Vec<_> = table.rows.iter().map(|r| r[1].as_str()).collect();
        assert_eq!(statuses, vec!["success", "pending", "pending", "success"]);
        assert_eq!(counts, ReconcileCounts { success: 2, pending: 2 });
    }

    #[test]
    fn test_missing_status_column_is_created() {
        let mut table = SourceTable::new(
            PathBuf::from("A.csv"),
            strings(&["listing_link", "name"]),
            vec![strings(&["K1", "Acme"]), strings(&["K3", "Other"])],
        );
        reconcile_table(&mut table, &keys(&["K1"]));
        assert_eq!(table.headers, strings(&["listing_link", "name", "status"]));
        assert_eq!(table.rows[0][2], "success");
        assert_eq!(table.rows[1][2], "pending");
    }

    #[test]
    fn test_missing_link_column_marks_everything_pending() {
        let mut table = SourceTable::new(
            PathBuf::from("A.csv"),
            strings(&["name", "status"]),
            vec![strings(&["Acme", "success"])],
        );
        let counts = reconcile_table(&mut table, &keys(&["Acme"]));
        assert_eq!(table.rows[0][1], "pending");
        assert_eq!(counts.pending, 1);
    }

    #[test]
    fn test_reconcile_is_idempotent() {
        let mut table = SourceTable::new(
            PathBuf::from("A.csv"),
            strings(&["listing_link", "status"]),
            vec![strings(&["K1", ""]), strings(&["K2", ""])],
        );
        let included = keys(&["K2"]);
        reconcile_table(&mut table, &included);
        let once = table.clone();
        reconcile_table(&mut table, &included);
        assert_eq!(once, table);
    }

    #[test]
    fn test_update_keeps_rows_after_a_ragged_row() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("A.csv");
        fs::write(&path, "listing_link,status\nK1,\nK2,,extra\nK3,\n").unwrap();

        let report = update_source_statuses(&[path.clone()], &keys(&["K1", "K3"]), &Reporter::new(true));
        assert!(report.failures.is_empty());
        assert_eq!(report.counts, ReconcileCounts { success: 2, pending: 1 });
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "listing_link,status\nK1,success\nK2,pending,extra\nK3,success\n"
        );
    }

    #[test]
    fn test_update_adds_status_column_without_clobbering_extra_cells() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("A.csv");
        fs::write(&path, "listing_link,name\nK1,Acme,note\nK2,Other\n").unwrap();

        update_source_statuses(&[path.clone()], &keys(&["K1"]), &Reporter::new(true));
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "listing_link,name,status\nK1,Acme,success,note\nK2,Other,pending\n"
        );
    }

    #[test]
    fn test_update_continues_past_failing_file() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("A.csv");
        fs::write(&good, "listing_link,status\nK1,\nK2,success\n").unwrap();
        let missing = dir.path().join("missing.csv");

        let report = update_source_statuses(
            &[missing.clone(), good.clone()],
            &keys(&["K1"]),
            &Reporter::new(true),
        );
        assert_eq!(report.updated, 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].path, missing);
        assert_eq!(report.counts, ReconcileCounts { success: 1, pending: 1 });

        let rewritten = SourceTable::read(&good).unwrap();
        assert_eq!(rewritten.rows[0], strings(&["K1", "success"]));
        assert_eq!(rewritten.rows[1], strings(&["K2", "pending"]));
    }
}
