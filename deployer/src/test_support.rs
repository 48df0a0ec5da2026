//! Test-only helpers: scripted command runners and throwaway repositories.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result, anyhow, bail};

use crate::io::config::DeployerConfig;
use crate::io::process::{CommandOutput, CommandRunner, CommandSpec};

/// One queued response of a [`ScriptedRunner`].
#[derive(Debug, Clone)]
pub enum ScriptedStep {
    /// Return this output.
    Output(CommandOutput),
    /// Fail as if the program could not be spawned.
    SpawnError(String),
    /// Act like a successful `git clone`: create the destination (last
    /// argument) with the given `(relative path, contents)` files.
    CloneWith(Vec<(String, String)>),
}

impl ScriptedStep {
    pub fn output(output: CommandOutput) -> Self {
        ScriptedStep::Output(output)
    }

    pub fn spawn_error(message: &str) -> Self {
        ScriptedStep::SpawnError(message.to_string())
    }

    pub fn clone_with(files: &[(&str, &str)]) -> Self {
        ScriptedStep::CloneWith(
            files
                .iter()
                .map(|(path, contents)| (path.to_string(), contents.to_string()))
                .collect(),
        )
    }
}

/// Command runner that replays queued responses in order and records calls.
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    steps: RefCell<VecDeque<ScriptedStep>>,
    calls: RefCell<Vec<CommandSpec>>,
}

impl ScriptedRunner {
    pub fn new(steps: Vec<ScriptedStep>) -> Self {
        Self {
            steps: RefCell::new(steps.into()),
            calls: RefCell::new(Vec::new()),
        }
    }

    pub fn outputs(outputs: Vec<CommandOutput>) -> Self {
        Self::new(outputs.into_iter().map(ScriptedStep::Output).collect())
    }

    /// Every spec passed to `run`, in call order.
    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.borrow().clone()
    }

    /// Queued responses that were never consumed.
    pub fn remaining(&self) -> usize {
        self.steps.borrow().len()
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        self.calls.borrow_mut().push(spec.clone());
        let step = self
            .steps
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| anyhow!("no scripted response left for `{spec}`"))?;
        match step {
            ScriptedStep::Output(output) => Ok(output),
            ScriptedStep::SpawnError(message) => Err(anyhow!(message)).context("spawn command"),
            ScriptedStep::CloneWith(files) => {
                let dest = spec
                    .args
                    .last()
                    .map(PathBuf::from)
                    .ok_or_else(|| anyhow!("clone spec has no destination"))?;
                for (relative, contents) in files {
                    let path = dest.join(relative);
                    if let Some(parent) = path.parent() {
                        fs::create_dir_all(parent)?;
                    }
                    fs::write(&path, contents)?;
                }
                fs::create_dir_all(&dest)?;
                Ok(ok_output(""))
            }
        }
    }
}

/// Zero-exit output with the given stdout.
pub fn ok_output(stdout: &str) -> CommandOutput {
    CommandOutput {
        exit_code: Some(0),
        stdout: stdout.as_bytes().to_vec(),
        ..CommandOutput::default()
    }
}

/// Non-zero exit with the given stderr.
pub fn failed_output(code: i32, stderr: &str) -> CommandOutput {
    CommandOutput {
        exit_code: Some(code),
        stderr: stderr.as_bytes().to_vec(),
        ..CommandOutput::default()
    }
}

/// Output of a command that was killed at its bound.
pub fn timed_out_output() -> CommandOutput {
    CommandOutput {
        exit_code: None,
        timed_out: true,
        ..CommandOutput::default()
    }
}

/// Default config with checkouts placed under `root`.
pub fn scratch_config(root: &Path) -> DeployerConfig {
    let mut cfg = DeployerConfig::default();
    cfg.scratch.root = Some(root.to_path_buf());
    cfg
}

/// A real git repository in a temp directory, usable as a clone source.
pub struct LocalRepo {
    dir: tempfile::TempDir,
}

impl LocalRepo {
    /// Create a repository with one commit containing `files`.
    pub fn with_files(files: &[(&str, &str)]) -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix("deployer-src")
            .tempdir()
            .context("create source tempdir")?;
        let root = dir.path();
        run_git(root, &["init", "--quiet"])?;
        run_git(root, &["config", "user.name", "Deployer Tests"])?;
        run_git(root, &["config", "user.email", "deployer-tests@local.invalid"])?;
        for (relative, contents) in files {
            let path = root.join(relative);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&path, contents).with_context(|| format!("write {}", path.display()))?;
        }
        run_git(root, &["add", "."])?;
        run_git(root, &["commit", "--quiet", "-m", "initial"])?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Clone URL for this repository (a local path).
    pub fn url(&self) -> String {
        self.dir.path().to_string_lossy().into_owned()
    }
}

fn run_git(root: &Path, args: &[&str]) -> Result<()> {
    let output = Command::new("git")
        .args(args)
        .current_dir(root)
        .output()
        .with_context(|| format!("run git {args:?}"))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("git {:?} failed: {}", args, stderr.trim());
    }
    Ok(())
}
