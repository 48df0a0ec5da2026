//! Git adapter for fetching repositories.
//!
//! Only `git clone` is needed. It runs through the shared [`CommandRunner`] so
//! the clone bound and output capture match every other external call.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, instrument, warn};

use crate::io::process::{CommandOutput, CommandRunner, CommandSpec};

/// Wrapper for executing git through a command runner.
#[derive(Debug, Clone)]
pub struct Git<'a, R: CommandRunner> {
    runner: &'a R,
    program: String,
}

impl<'a, R: CommandRunner> Git<'a, R> {
    pub fn new(runner: &'a R, program: impl Into<String>) -> Self {
        Self {
            runner,
            program: program.into(),
        }
    }

    /// Build the `git clone <url> <dest>` invocation.
    pub fn clone_spec(&self, url: &str, dest: &Path, timeout: Duration) -> CommandSpec {
        CommandSpec::new(&self.program, timeout)
            .arg("clone")
            .arg(url)
            .arg(dest.to_string_lossy())
    }

    /// Clone `url` into `dest`, which must not exist yet.
    ///
    /// The returned output carries the exit code and timeout flag; callers
    /// decide how to report a failed clone.
    #[instrument(skip_all, fields(url = %url, dest = %dest.display()))]
    pub fn clone_repo(&self, url: &str, dest: &Path, timeout: Duration) -> Result<CommandOutput> {
        debug!("cloning repository");
        let output = self
            .runner
            .run(&self.clone_spec(url, dest, timeout))
            .with_context(|| format!("git clone {url}"))?;
        if output.timed_out {
            warn!(timeout_secs = timeout.as_secs(), "git clone timed out");
        } else if !output.success() {
            warn!(exit_code = ?output.exit_code, "git clone failed");
        }
        Ok(output)
    }
}
