//! Run configuration, built once from CLI arguments and passed to each stage.

use std::path::{Path, PathBuf};

use crate::filter::DEFAULT_MIN_RATING;
use crate::progress::Reporter;

pub const DEFAULT_MAPS_DIR: &str = "data/maps";
pub const DEFAULT_COMBINED_DIR: &str = "data/combined";

#[derive(Debug, Clone, PartialEq)]
pub struct DedupConfig {
    /// Directory holding the per-query source tables
    pub maps_dir: PathBuf,
    /// Directory the combined table is written to
    pub combined_dir: PathBuf,
    /// Minimum rating (inclusive)
    pub min_rating: f64,
    /// Hide progress bars and emit periodic log lines instead
    pub log_only: bool,
    /// Optional JSON stats output
    pub stats_path: Option<PathBuf>,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            maps_dir: PathBuf::from(DEFAULT_MAPS_DIR),
            combined_dir: PathBuf::from(DEFAULT_COMBINED_DIR),
            min_rating: DEFAULT_MIN_RATING,
            log_only: false,
            stats_path: None,
        }
    }
}

impl DedupConfig {
    /// Config rooted at a data directory containing maps/ and combined/.
    pub fn with_data_dir(data_dir: &Path) -> Self {
        Self {
            maps_dir: data_dir.join("maps"),
            combined_dir: data_dir.join("combined"),
            ..Self::default()
        }
    }

    pub fn source_path(&self, name: &str) -> PathBuf {
        self.maps_dir.join(name)
    }

    pub fn combined_path(&self, name: &str) -> PathBuf {
        self.combined_dir.join(name)
    }

    pub fn reporter(&self) -> Reporter {
        Reporter::new(self.log_only)
    }
}
