//! Safety checks to prevent overwriting source tables.
//!
//! The combined table and the per-query tables share a file format, so a
//! misconfigured combined directory could otherwise clobber scraped data.

use anyhow::{bail, Result};
use std::path::{Component, Path, PathBuf};

/// Lexically normalize a path (drop `.`, resolve `..`) without touching the
/// filesystem; the output file usually does not exist yet.
fn lexical(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Validates that the combined output path is safe to write.
///
/// Checks:
/// - Output cannot be the same as any source table
/// - Output cannot live in the source directory
///
/// # Returns
/// * `Ok(())` if the output path is safe
/// * `Err` with a descriptive message if the check fails
pub fn validate_output_path(output: &Path, maps_dir: &Path, source_paths: &[PathBuf]) -> Result<()> {
    let output_norm = lexical(output);

    for source in source_paths {
        if output_norm == lexical(source) {
            bail!(
                "Safety check failed: output '{}' cannot be the same as source '{}'",
                output.display(),
                source.display()
            );
        }
    }

    if output_norm.parent() == Some(lexical(maps_dir).as_path()) {
        bail!(
            "Safety check failed: output '{}' must not be written into the source directory '{}'",
            output.display(),
            maps_dir.display()
        );
    }

    Ok(())
}
