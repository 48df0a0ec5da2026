//! Scratch directories that hold repository checkouts.
//!
//! With unique naming each clone gets `<root>/<repo>_<timestamp>_<short-id>`,
//! so concurrent or repeated invocations never share a checkout. Shared naming
//! uses `<root>/<repo>` and replaces whatever was there.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use rand::{Rng, distributions::Alphanumeric};
use tracing::{debug, warn};

/// Pick the checkout directory for `repo_name` under `root`.
pub fn checkout_dir(root: &Path, repo_name: &str, unique: bool) -> PathBuf {
    if unique {
        root.join(build_scratch_name(
            repo_name,
            &generate_timestamp(),
            &generate_short_id(),
        ))
    } else {
        root.join(repo_name)
    }
}

pub fn build_scratch_name(repo_name: &str, timestamp: &str, short_id: &str) -> String {
    format!("{repo_name}_{timestamp}_{short_id}")
}

/// Make sure `dir` does not exist and its parent does.
///
/// An existing directory (or file) at `dir` is removed unconditionally, along
/// with everything in it.
pub fn prepare_checkout_dir(dir: &Path) -> Result<()> {
    if dir.symlink_metadata().is_ok() {
        warn!(dir = %dir.display(), "removing existing checkout");
        remove_entry(dir).with_context(|| format!("remove {}", dir.display()))?;
    }
    if let Some(parent) = dir.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create scratch root {}", parent.display()))?;
    }
    debug!(dir = %dir.display(), "checkout directory ready");
    Ok(())
}

/// Remove a checkout that is not handed back to the caller.
///
/// Best effort: a failure is logged, never returned.
pub fn discard_checkout_dir(dir: &Path) {
    if dir.symlink_metadata().is_err() {
        return;
    }
    match remove_entry(dir) {
        Ok(()) => debug!(dir = %dir.display(), "discarded checkout"),
        Err(err) => warn!(dir = %dir.display(), err = %err, "failed to discard checkout"),
    }
}

fn remove_entry(path: &Path) -> std::io::Result<()> {
    if path.is_dir() && !path.is_symlink() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}

fn generate_timestamp() -> String {
    Utc::now().format("%Y%m%d_%H%M%S").to_string()
}

fn generate_short_id() -> String {
    let mut rng = rand::thread_rng();
    std::iter::repeat_with(|| rng.sample(Alphanumeric))
        .map(char::from)
        .take(6)
        .collect::<String>()
        .to_lowercase()
}
