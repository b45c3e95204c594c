//! Tabular storage for source and combined tables (CSV).
//!
//! Source tables are read whole, handed to the pipeline as raw listings, and
//! only ever rewritten by the status reconciler. Unknown columns are carried
//! through untouched on rewrite.

use anyhow::{Context, Result};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

use crate::models::{CanonicalListing, RawListing};
use crate::normalize::{non_blank, normalize_categories, parse_number, parse_position, CategoryCell};

// ============================================================================
// Column Layout
// ============================================================================

pub const COL_LISTING_LINK: &str = "listing_link";
pub const COL_POSITION: &str = "position";
pub const COL_NAME: &str = "name";
pub const COL_CATEGORIES: &str = "categories";
pub const COL_WEBSITE: &str = "website";
pub const COL_PHONE: &str = "phone";
pub const COL_ADDRESS: &str = "address";
pub const COL_REVIEWS_COUNT: &str = "reviews_count";
pub const COL_RATING: &str = "rating";
pub const COL_STATUS: &str = "status";
pub const COL_SOURCE_FILE: &str = "source_file";
pub const COL_SEARCH_VOLUME: &str = "search_volume";
pub const COL_MAP_FILES: &str = "map_files";

/// Extension of map tables written by the scraper
pub const TABLE_EXTENSION: &str = "csv";

/// Prefix of the per-input presence flag columns (query_filename1..N).
pub const PRESENCE_PREFIX: &str = "query_filename";

/// Columns of the combined table before the presence flags.
pub const COMBINED_BASE_COLUMNS: [&str; 13] = [
    COL_LISTING_LINK,
    COL_POSITION,
    COL_NAME,
    COL_CATEGORIES,
    COL_WEBSITE,
    COL_PHONE,
    COL_ADDRESS,
    COL_REVIEWS_COUNT,
    COL_RATING,
    COL_SOURCE_FILE,
    COL_SEARCH_VOLUME,
    COL_MAP_FILES,
    COL_STATUS,
];

/// Column indexes resolved once per table; None when the column is absent.
struct Columns {
    listing_link: Option<usize>,
    position: Option<usize>,
    name: Option<usize>,
    categories: Option<usize>,
    website: Option<usize>,
    phone: Option<usize>,
    address: Option<usize>,
    reviews_count: Option<usize>,
    rating: Option<usize>,
    source_file: Option<usize>,
    search_volume: Option<usize>,
}

// ============================================================================
// Source Tables
// ============================================================================

/// One per-query table of scraped listings.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceTable {
    pub path: PathBuf,
    pub name: String, // file name, doubles as the map_file value
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl SourceTable {
    /// Build an in-memory table; rows are padded to the header width.
    pub fn new(path: PathBuf, headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut table = SourceTable {
            path,
            name,
            headers,
            rows,
        };
        table.pad_rows();
        table
    }

    pub fn read(path: &Path) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(path)
            .with_context(|| format!("Failed to open table {}", path.display()))?;

        let headers: Vec<String> = reader
            .headers()
            .with_context(|| format!("Failed to read header of {}", path.display()))?
            .iter()
            .map(str::to_string)
            .collect();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record =
                record.with_context(|| format!("Malformed row in {}", path.display()))?;
            rows.push(record.iter().map(str::to_string).collect());
        }

        Ok(SourceTable::new(path.to_path_buf(), headers, rows))
    }

    fn pad_rows(&mut self) {
        let width = self.headers.len();
        for row in &mut self.rows {
            if row.len() < width {
                row.resize(width, String::new());
            }
        }
    }

    /// Header lookup ignores surrounding whitespace; the raw header text is
    /// what gets written back.
    pub fn column(&self, header: &str) -> Option<usize> {
        self.headers.iter().position(|h| h.trim() == header)
    }

    /// Index of `header`, appending it with `default` in every row if missing.
    /// Cells past the header width stay after the new column.
    pub fn ensure_column(&mut self, header: &str, default: &str) -> usize {
        if let Some(idx) = self.column(header) {
            return idx;
        }
        let idx = self.headers.len();
        self.headers.push(header.to_string());
        for row in &mut self.rows {
            row.insert(idx, default.to_string());
        }
        idx
    }

    fn columns(&self) -> Columns {
        Columns {
            listing_link: self.column(COL_LISTING_LINK),
            position: self.column(COL_POSITION),
            name: self.column(COL_NAME),
            categories: self.column(COL_CATEGORIES),
            website: self.column(COL_WEBSITE),
            phone: self.column(COL_PHONE),
            address: self.column(COL_ADDRESS),
            reviews_count: self.column(COL_REVIEWS_COUNT),
            rating: self.column(COL_RATING),
            source_file: self.column(COL_SOURCE_FILE),
            search_volume: self.column(COL_SEARCH_VOLUME),
        }
    }

    /// Convert every row into a normalized raw listing tagged with this table's name.
    pub fn listings(&self) -> Vec<RawListing> {
        let cols = self.columns();
        let cell = |row: &[String], col: Option<usize>| -> Option<String> {
            col.and_then(|c| row.get(c))
                .and_then(|v| non_blank(Some(v.as_str())))
                .map(str::to_string)
        };

        self.rows
            .iter()
            .map(|row| {
                let row = row.as_slice();
                let categories = cols.categories.and_then(|c| row.get(c)).map(String::as_str);
                RawListing {
                    identity_key: cell(row, cols.listing_link),
                    rank_position: cell(row, cols.position).and_then(|p| parse_position(&p)),
                    name: cell(row, cols.name),
                    category_list: normalize_categories(CategoryCell::from_cell(categories)),
                    website: cell(row, cols.website),
                    phone: cell(row, cols.phone),
                    address: cell(row, cols.address),
                    review_count: cell(row, cols.reviews_count),
                    rating: cell(row, cols.rating).and_then(|r| parse_number(&r)),
                    source_query_name: cell(row, cols.source_file),
                    source_table_name: Some(self.name.clone()),
                    search_volume: cell(row, cols.search_volume),
                }
            })
            .collect()
    }

    /// Write the table back to its own path.
    pub fn write(&self) -> Result<()> {
        write_rows(&self.path, &self.headers, &self.rows)
    }
}

fn write_rows(path: &Path, headers: &[String], rows: &[Vec<String>]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }

    let tmp = temp_path(path);
    let written = write_csv(&tmp, headers, rows)
        .and_then(|_| {
            fs::rename(&tmp, path)
                .with_context(|| format!("Rename {} -> {}", tmp.display(), path.display()))
        });
    if written.is_err() && tmp.is_file() {
        fs::remove_file(&tmp).ok();
    }
    written
}

/// Sibling path the table is staged at before replacing the target.
fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Rows may be wider than the header; extra cells are written as they were read.
fn write_csv(path: &Path, headers: &[String], rows: &[Vec<String>]) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Create {}", path.display()))?;
    writer.write_record(headers)?;
    for row in rows {
        writer.write_record(row)?;
    }
    writer
        .flush()
        .with_context(|| format!("Failed to flush {}", path.display()))?;
    Ok(())
}

// ============================================================================
// Combined Table
// ============================================================================

/// Numeric search volumes stay numbers in JSON; anything else is a string.
fn scalar_json(text: &str) -> Value {
    if let Ok(int) = text.trim().parse::<i64>() {
        return Value::from(int);
    }
    parse_number(text)
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
        .unwrap_or_else(|| Value::String(text.to_string()))
}

fn json_cell<T: serde::Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

pub fn combined_headers(source_count: usize) -> Vec<String> {
    COMBINED_BASE_COLUMNS
        .iter()
        .map(|c| c.to_string())
        .chain((1..=source_count).map(|i| format!("{}{}", PRESENCE_PREFIX, i)))
        .collect()
}

/// Encode one canonical listing as a combined-table row. List-shaped columns
/// are JSON arrays so downstream readers can decode them with the same rules
/// as source category cells.
pub fn combined_record(listing: &CanonicalListing, source_count: usize) -> Result<Vec<String>> {
    let text = |value: &Option<String>| value.clone().unwrap_or_default();
    let volumes: Vec<Value> = listing
        .search_volumes()
        .into_iter()
        .map(|v| v.map_or(Value::Null, scalar_json))
        .collect();

    let mut record = vec![
        listing.identity_key.clone(),
        json_cell(&listing.rank_positions())?,
        text(&listing.name),
        json_cell(&listing.category_list)?,
        text(&listing.website),
        text(&listing.phone),
        text(&listing.address),
        text(&listing.review_count),
        listing.rating.map(|r| r.to_string()).unwrap_or_default(),
        text(&listing.first_source_query_name),
        json_cell(&volumes)?,
        json_cell(&listing.source_tables())?,
        listing.review_status.as_str().to_string(),
    ];
    record.extend((0..source_count).map(|i| {
        listing
            .presence
            .get(i)
            .copied()
            .unwrap_or(false)
            .to_string()
    }));
    Ok(record)
}

/// Write the combined table, one row per canonical listing in merge order.
pub fn write_combined(path: &Path, listings: &[CanonicalListing], source_count: usize) -> Result<()> {
    let rows = listings
        .iter()
        .map(|listing| combined_record(listing, source_count))
        .collect::<Result<Vec<_>>>()?;
    write_rows(path, &combined_headers(source_count), &rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ReviewStatus, Sighting};
    use crate::normalize::parse_list_cell;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_read_pads_short_rows_and_keeps_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roofers.csv");
        fs::write(
            &path,
            "listing_link,position,rating\nL1,1,4.5\nL2,2\n",
        )
        .unwrap();

        let table = SourceTable::read(&path).unwrap();
        assert_eq!(table.name, "roofers.csv");
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[1], strings(&["L2", "2", ""]));
    }

    #[test]
    fn test_read_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(SourceTable::read(&dir.path().join("absent.csv")).is_err());
    }

    #[test]
    fn test_listings_coerce_fields() {
        let table = SourceTable::new(
            PathBuf::from("maps/A.csv"),
            strings(&["listing_link", "position", "categories", "rating", "source_file", "search_volume"]),
            vec![
                strings(&[" L1 ", "3.0", "['Roofer', 'roofer', 'Gutters']", "4.7", "roofers denver", "1200"]),
                strings(&["", "x", "", "n/a", "", ""]),
            ],
        );
        let listings = table.listings();
        assert_eq!(listings[0].identity_key.as_deref(), Some("L1"));
        assert_eq!(listings[0].rank_position, Some(3));
        assert_eq!(listings[0].category_list, vec!["Roofer", "Gutters"]);
        assert_eq!(listings[0].rating, Some(4.7));
        assert_eq!(listings[0].source_query_name.as_deref(), Some("roofers denver"));
        assert_eq!(listings[0].source_table_name.as_deref(), Some("A.csv"));
        assert_eq!(listings[0].search_volume.as_deref(), Some("1200"));

        assert_eq!(listings[1].identity_key, None);
        assert_eq!(listings[1].rank_position, None);
        assert_eq!(listings[1].rating, None);
        assert!(listings[1].category_list.is_empty());
        // Missing columns read as absent, not as errors
        assert_eq!(listings[1].phone, None);
    }

    #[test]
    fn test_ensure_column_appends_default() {
        let mut table = SourceTable::new(
            PathBuf::from("A.csv"),
            strings(&["listing_link"]),
            vec![strings(&["L1"]), strings(&["L2"])],
        );
        let idx = table.ensure_column("status", "pending");
        assert_eq!(idx, 1);
        assert_eq!(table.rows[0], strings(&["L1", "pending"]));
        assert_eq!(table.ensure_column("status", "other"), 1);
    }

    #[test]
    fn test_ensure_column_lands_before_extra_cells() {
        let mut table = SourceTable::new(
            PathBuf::from("A.csv"),
            strings(&["listing_link", "name"]),
            vec![strings(&["L1", "Acme", "stray"]), strings(&["L2"])],
        );
        let idx = table.ensure_column("status", "pending");
        assert_eq!(idx, 2);
        assert_eq!(table.rows[0], strings(&["L1", "Acme", "pending", "stray"]));
        assert_eq!(table.rows[1], strings(&["L2", "", "pending"]));
    }

    #[test]
    fn test_rewrite_keeps_ragged_rows_and_raw_headers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("A.csv");
        fs::write(&path, " listing_link ,status\nK1,\nK2,,extra\nK3,\n").unwrap();

        let table = SourceTable::read(&path).unwrap();
        assert_eq!(table.column("listing_link"), Some(0));
        assert_eq!(table.rows.len(), 3);
        table.write().unwrap();

        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            " listing_link ,status\nK1,\nK2,,extra\nK3,\n"
        );
        assert!(!dir.path().join("A.csv.tmp").exists());
    }

    #[test]
    fn test_failed_rewrite_leaves_original_intact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("A.csv");
        let original = "listing_link,status\nK1,\nK2,\n";
        fs::write(&path, original).unwrap();
        // Occupy the staging path so the write cannot start
        fs::create_dir(dir.path().join("A.csv.tmp")).unwrap();

        let mut table = SourceTable::read(&path).unwrap();
        table.rows[0][1] = "success".to_string();
        assert!(table.write().is_err());
        assert_eq!(fs::read_to_string(&path).unwrap(), original);
    }

    #[test]
    fn test_combined_round_trip_keeps_lists_decodable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("combined").join("A__B.csv");
        let listing = CanonicalListing {
            identity_key: "L1".to_string(),
            sightings: vec![
                Sighting {
                    position: 1,
                    source_table: Some("A.csv".to_string()),
                    search_volume: Some("1200".to_string()),
                },
                Sighting {
                    position: 4,
                    source_table: Some("B.csv".to_string()),
                    search_volume: None,
                },
            ],
            name: Some("Acme, Inc.".to_string()),
            category_list: strings(&["Roofer"]),
            website: None,
            phone: None,
            address: None,
            review_count: Some("87".to_string()),
            rating: Some(4.5),
            first_source_query_name: None,
            presence: vec![true, true],
            review_status: ReviewStatus::Pending,
        };

        write_combined(&path, &[listing], 2).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let headers: Vec<String> = reader.headers().unwrap().iter().map(str::to_string).collect();
        assert_eq!(headers, combined_headers(2));
        assert_eq!(headers.last().map(String::as_str), Some("query_filename2"));

        let record = reader.records().next().unwrap().unwrap();
        assert_eq!(&record[0], "L1");
        assert_eq!(&record[1], "[1,4]");
        assert_eq!(&record[2], "Acme, Inc.");
        assert_eq!(&record[8], "4.5");
        assert_eq!(&record[10], "[1200,null]");
        assert_eq!(&record[12], "pending");
        assert_eq!(&record[13], "true");

        assert_eq!(
            parse_list_cell(&record[11]),
            vec![Some("A.csv".to_string()), Some("B.csv".to_string())]
        );
        assert_eq!(
            parse_list_cell(&record[10]),
            vec![Some("1200".to_string()), None]
        );
    }

    #[test]
    fn test_scalar_json() {
        assert_eq!(scalar_json("1200"), Value::from(1200));
        assert_eq!(scalar_json("12.5"), Value::from(12.5));
        assert_eq!(scalar_json("n/a"), Value::String("n/a".to_string()));
    }
}
