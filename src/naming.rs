//! Combined output file naming.
//!
//! The combined table is named after its inputs so reruns over the same
//! ordered file list land on the same file. Long joins collapse to a digest
//! to stay under Windows path limits.

use sha2::{Digest, Sha256};

/// Joined base names longer than this fall back to a hashed name.
pub const MAX_JOINED_LEN: usize = 120;

/// Separator between input base names.
pub const NAME_SEPARATOR: &str = "__";

/// Extension used when the first input has none.
pub const FALLBACK_EXTENSION: &str = "csv";

/// Prefix of hashed names.
pub const HASHED_PREFIX: &str = "combined";

fn extension_of(name: &str) -> &str {
    match name.rsplit_once('.') {
        Some((_, ext)) => ext,
        None => FALLBACK_EXTENSION,
    }
}

fn base_name(name: &str) -> &str {
    name.rsplit_once('.').map_or(name, |(base, _)| base)
}

/// First 10 hex characters of SHA-256 over the full names joined with the separator.
pub fn names_digest<S: AsRef<str>>(names: &[S]) -> String {
    let joined = names
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(NAME_SEPARATOR);
    let digest = hex::encode(Sha256::digest(joined.as_bytes()));
    digest[..10].to_string()
}

/// Derive the combined file name from the ordered list of input file names.
pub fn combined_file_name<S: AsRef<str>>(names: &[S]) -> String {
    let ext = names
        .first()
        .map_or(FALLBACK_EXTENSION, |first| extension_of(first.as_ref()));

    let joined = names
        .iter()
        .map(|name| base_name(name.as_ref()))
        .collect::<Vec<_>>()
        .join(NAME_SEPARATOR);

    if joined.chars().count() > MAX_JOINED_LEN {
        return format!(
            "{}_{}_{}.{}",
            HASHED_PREFIX,
            names.len(),
            names_digest(names),
            ext
        );
    }
    format!("{}.{}", joined, ext)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_names_are_joined() {
        assert_eq!(combined_file_name(&["a.xlsx", "b.xlsx"]), "a__b.xlsx");
        assert_eq!(combined_file_name(&["roofers.csv"]), "roofers.csv");
    }

    #[test]
    fn test_extension_comes_from_first_name() {
        assert_eq!(combined_file_name(&["a.csv", "b.xlsx"]), "a__b.csv");
        assert_eq!(combined_file_name(&["a", "b.xlsx"]), "a__b.csv");
        assert_eq!(combined_file_name(&["a.tar.gz"]), "a.tar.gz");
    }

    #[test]
    fn test_deterministic() {
        let names = vec!["a.xlsx".to_string(), "b.xlsx".to_string()];
        assert_eq!(combined_file_name(&names), combined_file_name(&names));
    }

    #[test]
    fn test_long_names_fall_back_to_digest() {
        let names: Vec<String> = (0..6)
            .map(|i| format!("spray_foam_insulation_denver_query_number_{}.csv", i))
            .collect();
        let name = combined_file_name(&names);
        assert!(name.starts_with("combined_6_"));
        assert!(name.ends_with(".csv"));
        // combined_ + 6 + _ + 10 hex + .csv
        assert_eq!(name.len(), "combined_6_".len() + 10 + ".csv".len());
        assert_eq!(name, combined_file_name(&names));
    }

    #[test]
    fn test_digest_depends_on_order() {
        let forward = names_digest(&["a.csv", "b.csv"]);
        let backward = names_digest(&["b.csv", "a.csv"]);
        assert_eq!(forward.len(), 10);
        assert_ne!(forward, backward);
    }

    #[test]
    fn test_exactly_max_len_is_not_hashed() {
        let base = "x".repeat(MAX_JOINED_LEN);
        let name = combined_file_name(&[format!("{}.csv", base)]);
        assert_eq!(name, format!("{}.csv", base));
    }
}
