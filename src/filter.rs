//! Rating filter applied per source table before merging.

use crate::models::RawListing;

/// Default minimum rating (inclusive).
pub const DEFAULT_MIN_RATING: f64 = 4.2;

/// Listings that passed the threshold plus before/after counts for auditing.
#[derive(Debug, Clone)]
pub struct RatingFilterOutcome {
    pub kept: Vec<RawListing>,
    pub before: usize,
    pub after: usize,
}

impl RatingFilterOutcome {
    pub fn removed(&self) -> usize {
        self.before - self.after
    }
}

/// Whether a listing's rating clears the threshold. Missing or non-numeric
/// ratings never pass.
pub fn passes_min_rating(listing: &RawListing, min_rating: f64) -> bool {
    listing.rating.is_some_and(|rating| rating >= min_rating)
}

/// Keep only listings with rating >= min_rating.
pub fn filter_min_rating(listings: Vec<RawListing>, min_rating: f64) -> RatingFilterOutcome {
    let before = listings.len();
    let kept: Vec<RawListing> = listings
        .into_iter()
        .filter(|listing| passes_min_rating(listing, min_rating))
        .collect();
    let after = kept.len();
    RatingFilterOutcome { kept, before, after }
}
