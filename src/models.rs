//! Core data models for listing deduplication.
//!
//! This module contains the struct definitions, type aliases, and enums
//! used throughout the merge pipeline.

use rustc_hash::FxHashMap;
use serde::Serialize;

// ============================================================================
// Type Aliases
// ============================================================================

/// Index mapping identity_key to its position in Vec<CanonicalListing>
pub type ListingIndex = FxHashMap<String, usize>;

// ============================================================================
// Review Status
// ============================================================================

/// Review state of a listing. Source tables may hold arbitrary text in their
/// status column; anything that is not "success" reads back as pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewStatus {
    #[default]
    Pending,
    Success,
}

impl ReviewStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ReviewStatus::Pending => "pending",
            ReviewStatus::Success => "success",
        }
    }

    /// Parse a raw status cell (case-insensitive, trimmed).
    pub fn from_cell(cell: &str) -> Self {
        if cell.trim().eq_ignore_ascii_case("success") {
            ReviewStatus::Success
        } else {
            ReviewStatus::Pending
        }
    }
}

impl std::fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Listing Models
// ============================================================================

/// One observation of a business from one scrape of one query.
/// Created once per source-table row and never mutated afterwards.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawListing {
    pub identity_key: Option<String>, // listing_link
    pub rank_position: Option<i64>,   // 1-based rank on the results page
    pub name: Option<String>,
    pub category_list: Vec<String>,
    pub website: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub review_count: Option<String>,
    pub rating: Option<f64>,
    pub source_query_name: Option<String>, // source_file column, free text
    pub source_table_name: Option<String>, // file name of the table this row came from
    pub search_volume: Option<String>,     // opaque passthrough
}

/// One recorded (position, source table, search volume) observation.
///
/// `source_table` is None only when a position was seen without a known
/// table; such sightings still occupy a slot so the derived provenance
/// arrays stay index-aligned.
#[derive(Clone, Debug, PartialEq)]
pub struct Sighting {
    pub position: i64,
    pub source_table: Option<String>,
    pub search_volume: Option<String>,
}

/// One merged business, keyed uniquely by identity_key.
///
/// Rebuilt from scratch on every run. Scalar fields hold the first non-empty
/// value seen across all folded listings, in pool order.
#[derive(Clone, Debug, PartialEq)]
pub struct CanonicalListing {
    pub identity_key: String,
    pub sightings: Vec<Sighting>, // first-encounter order, never sorted
    pub name: Option<String>,
    pub category_list: Vec<String>,
    pub website: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub review_count: Option<String>,
    pub rating: Option<f64>,
    pub first_source_query_name: Option<String>,
    pub presence: Vec<bool>, // presence[i] <=> seen in source table i + 1
    pub review_status: ReviewStatus,
}

impl CanonicalListing {
    pub fn rank_positions(&self) -> Vec<i64> {
        self.sightings.iter().map(|s| s.position).collect()
    }

    pub fn source_tables(&self) -> Vec<Option<&str>> {
        self.sightings
            .iter()
            .map(|s| s.source_table.as_deref())
            .collect()
    }

    pub fn search_volumes(&self) -> Vec<Option<&str>> {
        self.sightings
            .iter()
            .map(|s| s.search_volume.as_deref())
            .collect()
    }

    /// True if the exact (source_table, position) pair is already recorded.
    pub fn has_pair(&self, source_table: &str, position: i64) -> bool {
        self.sightings
            .iter()
            .any(|s| s.position == position && s.source_table.as_deref() == Some(source_table))
    }

    pub fn has_position(&self, position: i64) -> bool {
        self.sightings.iter().any(|s| s.position == position)
    }
}

// ============================================================================
// Statistics (Instrumentation)
// ============================================================================

/// End-of-run counters. Printed after every run so a human can sanity-check
/// the merge, optionally dumped as JSON.
#[derive(Default, Debug, Clone, Serialize)]
pub struct DedupStats {
    pub tables_requested: usize,
    pub tables_read: usize,
    pub tables_failed: usize,

    pub rows_before: usize,
    pub removed_by_rating: usize,
    pub removed_by_dedup: usize,
    pub removed_no_link: usize,
    pub combined_rows: usize,

    pub statuses_success: usize,
    pub statuses_pending: usize,
    pub status_write_failures: usize,

    pub min_rating: f64,
    pub output_file: Option<String>,

    pub elapsed_seconds: f64,
}

impl DedupStats {
    /// Log stats to stderr in JSON format
    pub fn log_phase(&self, phase: &str) {
        if let Ok(json) = serde_json::to_string_pretty(self) {
            eprintln!("[STATS:{}]\n{}", phase, json);
        }
    }

    /// Write stats to a JSON file
    pub fn write_to_file(&self, path: &std::path::Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Print the human-readable end-of-run summary.
    pub fn print_summary(&self) {
        println!("\n{:=<60}", "");
        if let Some(ref output) = self.output_file {
            println!("Combined written: {}", output);
        }
        println!("  Rows before: {}", self.rows_before);
        println!(
            "  Removed by rating (< {}): {}",
            self.min_rating, self.removed_by_rating
        );
        println!("  Removed by deduplication: {}", self.removed_by_dedup);
        println!(
            "  Removed due to missing listing_link: {}",
            self.removed_no_link
        );
        println!("  Rows in combined: {}", self.combined_rows);
        if self.tables_failed > 0 {
            println!(
                "  Tables skipped (read errors): {}/{}",
                self.tables_failed, self.tables_requested
            );
        }
        if self.status_write_failures > 0 {
            println!("  Status updates failed: {}", self.status_write_failures);
        }
        println!("  Elapsed: {:.2}s", self.elapsed_seconds);
        println!("{:=<60}", "");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sighting(position: i64, table: Option<&str>) -> Sighting {
        Sighting {
            position,
            source_table: table.map(str::to_string),
            search_volume: None,
        }
    }

    #[test]
    fn test_review_status_from_cell() {
        assert_eq!(ReviewStatus::from_cell("success"), ReviewStatus::Success);
        assert_eq!(ReviewStatus::from_cell("  SUCCESS "), ReviewStatus::Success);
        assert_eq!(ReviewStatus::from_cell(""), ReviewStatus::Pending);
        assert_eq!(ReviewStatus::from_cell("nan"), ReviewStatus::Pending);
        assert_eq!(ReviewStatus::from_cell("good"), ReviewStatus::Pending);
    }

    #[test]
    fn test_provenance_views_stay_aligned() {
        let listing = CanonicalListing {
            identity_key: "L1".to_string(),
            sightings: vec![sighting(3, Some("A.csv")), sighting(7, None)],
            name: None,
            category_list: Vec::new(),
            website: None,
            phone: None,
            address: None,
            review_count: None,
            rating: None,
            first_source_query_name: None,
            presence: vec![true],
            review_status: ReviewStatus::Pending,
        };
        assert_eq!(listing.rank_positions(), vec![3, 7]);
        assert_eq!(listing.source_tables(), vec![Some("A.csv"), None]);
        assert_eq!(listing.search_volumes().len(), 2);
        assert!(listing.has_pair("A.csv", 3));
        assert!(!listing.has_pair("A.csv", 7));
        assert!(listing.has_position(7));
    }
}
