//! Merge engine: folds raw listings from every source table into one
//! canonical record per identity key.
//!
//! Identities come out in first-encounter order over the pool, and the pool
//! itself is source tables in input order with rows in file order. Sightings
//! are never sorted; their order is the provenance.

use rustc_hash::FxHashMap;

use crate::models::{CanonicalListing, ListingIndex, RawListing, ReviewStatus, Sighting};
use crate::normalize::non_blank;

// ============================================================================
// Source Index
// ============================================================================

/// Stable mapping from source-table name to its 1-based input index.
/// Duplicate names keep the index of their first occurrence.
#[derive(Debug, Clone, Default)]
pub struct SourceIndex {
    names: Vec<String>,
    index: FxHashMap<String, usize>,
}

impl SourceIndex {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut source_index = SourceIndex::default();
        for name in names {
            let name = name.into();
            if source_index.index.contains_key(&name) {
                continue;
            }
            source_index.names.push(name.clone());
            source_index.index.insert(name, source_index.names.len());
        }
        source_index
    }

    /// 1-based index of a table, if known.
    pub fn get(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

// ============================================================================
// Merge
// ============================================================================

/// Canonical listings plus the accounting needed for the run summary.
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub listings: Vec<CanonicalListing>,
    pub input_rows: usize,
    pub missing_key: usize,
}

impl MergeOutcome {
    /// Rows folded into an identity that was already present.
    pub fn duplicates(&self) -> usize {
        self.input_rows - self.missing_key - self.listings.len()
    }
}

fn new_canonical(key: &str, first: &RawListing, sources: &SourceIndex) -> CanonicalListing {
    CanonicalListing {
        identity_key: key.to_string(),
        sightings: Vec::new(),
        name: first.name.clone(),
        category_list: first.category_list.clone(),
        website: first.website.clone(),
        phone: first.phone.clone(),
        address: first.address.clone(),
        review_count: first.review_count.clone(),
        rating: first.rating,
        first_source_query_name: first.source_query_name.clone(),
        presence: vec![false; sources.len()],
        review_status: ReviewStatus::Pending,
    }
}

/// First non-empty wins: only replace a blank slot, and only with a non-blank value.
fn fill_if_empty(slot: &mut Option<String>, value: &Option<String>) {
    if non_blank(slot.as_deref()).is_some() {
        return;
    }
    if non_blank(value.as_deref()).is_some() {
        *slot = value.clone();
    }
}

/// Record one listing's rank position on the canonical record.
fn record_sighting(canonical: &mut CanonicalListing, listing: &RawListing) {
    let Some(position) = listing.rank_position else {
        return;
    };

    match non_blank(listing.source_table_name.as_deref()) {
        Some(table) => {
            if !canonical.has_pair(table, position) {
                canonical.sightings.push(Sighting {
                    position,
                    source_table: Some(table.to_string()),
                    search_volume: listing.search_volume.clone(),
                });
            }
        }
        None => {
            // Without a table, dedup on the position value alone
            if !canonical.has_position(position) {
                canonical.sightings.push(Sighting {
                    position,
                    source_table: None,
                    search_volume: None,
                });
            }
        }
    }
}

/// Fold one raw listing into its canonical record.
pub fn fold_listing(canonical: &mut CanonicalListing, listing: &RawListing, sources: &SourceIndex) {
    record_sighting(canonical, listing);

    if canonical.category_list.is_empty() && !listing.category_list.is_empty() {
        canonical.category_list = listing.category_list.clone();
    }

    fill_if_empty(&mut canonical.name, &listing.name);
    fill_if_empty(&mut canonical.website, &listing.website);
    fill_if_empty(&mut canonical.phone, &listing.phone);
    fill_if_empty(&mut canonical.address, &listing.address);
    fill_if_empty(&mut canonical.review_count, &listing.review_count);
    if canonical.rating.is_none() {
        canonical.rating = listing.rating;
    }
    fill_if_empty(
        &mut canonical.first_source_query_name,
        &listing.source_query_name,
    );

    if let Some(idx) = listing
        .source_table_name
        .as_deref()
        .and_then(|table| sources.get(table.trim()))
    {
        if let Some(flag) = canonical.presence.get_mut(idx - 1) {
            *flag = true;
        }
    }
}

/// Group the pool by identity key and fold every listing into its group.
/// Listings without a usable key are dropped and counted.
pub fn merge_listings(pool: &[RawListing], sources: &SourceIndex) -> MergeOutcome {
    let mut index: ListingIndex = FxHashMap::default();
    let mut listings: Vec<CanonicalListing> = Vec::new();
    let mut missing_key = 0;

    for listing in pool {
        let Some(key) = non_blank(listing.identity_key.as_deref()) else {
            missing_key += 1;
            continue;
        };

        let slot = match index.get(key) {
            Some(&slot) => slot,
            None => {
                listings.push(new_canonical(key, listing, sources));
                index.insert(key.to_string(), listings.len() - 1);
                listings.len() - 1
            }
        };
        fold_listing(&mut listings[slot], listing, sources);
    }

    MergeOutcome {
        listings,
        input_rows: pool.len(),
        missing_key,
    }
}
