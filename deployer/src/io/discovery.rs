//! Test file discovery by naming convention.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;
use walkdir::WalkDir;

pub const TEST_FILE_PREFIX: &str = "test_";
pub const TEST_FILE_SUFFIX: &str = ".py";

/// True for `test_*.py` (case-sensitive on both ends).
pub fn is_test_file_name(name: &str) -> bool {
    name.starts_with(TEST_FILE_PREFIX) && name.ends_with(TEST_FILE_SUFFIX)
}

/// Recursively collect regular files named `test_*.py` under `root`.
///
/// Symlinks are not followed. Results are ordered by a sorted depth-first walk
/// so repeated runs visit files in the same order.
pub fn discover_test_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.with_context(|| format!("walk {}", root.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        if is_test_file_name(&entry.file_name().to_string_lossy()) {
            found.push(entry.into_path());
        }
    }
    debug!(root = %root.display(), count = found.len(), "discovered test files");
    Ok(found)
}
