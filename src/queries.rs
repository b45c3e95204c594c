//! Query spreadsheets: resolve which map tables a dedup run should combine.
//!
//! Each query row holds a Google Maps search URL. The scraper names the map
//! table it writes after a slug of that URL, so the same slug rules recover
//! the table names here.

use anyhow::{bail, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;
use url::Url;

use crate::normalize::non_blank;
use crate::table::{SourceTable, TABLE_EXTENSION};

// ============================================================================
// REGEX PATTERNS
// ============================================================================

/// Characters that cannot appear in a file name
static SLUG_ILLEGAL: Lazy<Regex> = Lazy::new(|| Regex::new(r#"[\\/:*?"<>|]+"#).unwrap());

static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Slug used when a URL yields no usable text
pub const FALLBACK_SLUG: &str = "google maps query";

const SEARCH_PATH: &str = "/maps/search/";

const URL_COLUMNS: [&str; 3] = ["query_url", "url", "link"];

// ============================================================================
// SLUGS
// ============================================================================

/// Decode `+` and percent escapes in a URL fragment.
fn decode_plus(raw: &str) -> String {
    let escaped = raw.replace('&', "%26").replace('=', "%3D");
    url::form_urlencoded::parse(escaped.as_bytes())
        .next()
        .map(|(text, _)| text.into_owned())
        .unwrap_or_default()
}

/// Search text from a URL path: whatever follows `/maps/search/`, else the last segment.
fn path_query(path: &str) -> &str {
    match path.split_once(SEARCH_PATH) {
        Some((_, after)) => after,
        None => path.trim_matches('/').rsplit('/').next().unwrap_or(""),
    }
}

fn raw_query(url: &str) -> String {
    let Ok(parsed) = Url::parse(url.trim()) else {
        return decode_plus(path_query(url.trim()));
    };

    // Already decoded by query_pairs
    for key in ["q", "query"] {
        let value = parsed
            .query_pairs()
            .find(|(k, v)| k == key && !v.trim().is_empty())
            .map(|(_, v)| v.into_owned());
        if let Some(value) = value {
            return value;
        }
    }
    decode_plus(path_query(parsed.path()))
}

/// Deterministic, file-name-safe slug for a Google Maps search URL.
pub fn query_to_slug(url: &str) -> String {
    let lowered = raw_query(url).to_lowercase();
    let cleaned = SLUG_ILLEGAL.replace_all(lowered.trim(), " ");
    let collapsed = WHITESPACE_RUN.replace_all(&cleaned, " ");
    let slug = collapsed.trim().replace([' ', ',', '.'], "_");

    if slug.is_empty() {
        FALLBACK_SLUG.to_string()
    } else {
        slug
    }
}

// ============================================================================
// QUERY FILES
// ============================================================================

/// URLs of the query rows to combine: rows marked success, or every non-empty
/// URL when no row is.
pub fn selected_query_urls(table: &SourceTable) -> Result<Vec<String>> {
    let header_is = |names: &[&str]| {
        table
            .headers
            .iter()
            .position(|h| names.contains(&h.trim().to_lowercase().as_str()))
    };
    let Some(url_col) = header_is(&URL_COLUMNS) else {
        bail!(
            "Query file '{}' must contain a 'query_url' (or 'url'/'link') column",
            table.name
        );
    };
    let status_col = header_is(&["status"]);

    let urls: Vec<(String, bool)> = table
        .rows
        .iter()
        .filter_map(|row| {
            let url = non_blank(row.get(url_col).map(String::as_str))?;
            let success = status_col
                .and_then(|c| row.get(c))
                .is_some_and(|s| s.trim().eq_ignore_ascii_case("success"));
            Some((url.to_string(), success))
        })
        .collect();

    let any_success = urls.iter().any(|(_, success)| *success);
    Ok(urls
        .into_iter()
        .filter(|(_, success)| *success || !any_success)
        .map(|(url, _)| url)
        .collect())
}

/// Map table names expected for a query file, in query order.
pub fn expected_map_files(query_file: &Path) -> Result<Vec<String>> {
    let table = SourceTable::read(query_file)?;
    Ok(selected_query_urls(&table)?
        .iter()
        .map(|url| format!("{}.{}", query_to_slug(url), TABLE_EXTENSION))
        .collect())
}
