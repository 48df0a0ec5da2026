//! Per-file test execution for discovered `test_*.py` files.
//!
//! Each file runs under `python -m pytest <file> -v` from its own directory.
//! If that exits non-zero the file is run as a plain script from the same
//! directory. Either zero exit counts as a pass.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, info, instrument, warn};

use crate::core::types::{PassedVia, TestFileResult, TestVerdict};
use crate::io::process::{CommandRunner, CommandSpec};

/// Result of attempting one test file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileRun {
    Completed(TestFileResult),
    /// An invocation hit its bound; the caller aborts the whole test phase.
    TimedOut { file: String },
}

/// Runs discovered test files with a Python interpreter.
#[derive(Debug, Clone)]
pub struct PythonTests<'a, R: CommandRunner> {
    runner: &'a R,
    python: String,
    timeout: Duration,
}

impl<'a, R: CommandRunner> PythonTests<'a, R> {
    pub fn new(runner: &'a R, python: impl Into<String>, timeout: Duration) -> Self {
        Self {
            runner,
            python: python.into(),
            timeout,
        }
    }

    /// `python -m pytest <name> -v`, run from the file's directory.
    pub fn pytest_spec(&self, file: &Path) -> Result<CommandSpec> {
        let (dir, name) = split_test_path(file)?;
        Ok(CommandSpec::new(&self.python, self.timeout)
            .args(["-m", "pytest"])
            .arg(name)
            .arg("-v")
            .current_dir(dir))
    }

    /// `python <name>`, run from the file's directory.
    pub fn script_spec(&self, file: &Path) -> Result<CommandSpec> {
        let (dir, name) = split_test_path(file)?;
        Ok(CommandSpec::new(&self.python, self.timeout)
            .arg(name)
            .current_dir(dir))
    }

    /// Run one file: pytest first, script fallback on failure.
    #[instrument(skip_all, fields(file = %file.display()))]
    pub fn run_file(&self, checkout_root: &Path, file: &Path) -> Result<FileRun> {
        let relative = relative_display(checkout_root, file);
        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| anyhow!("test path has no file name: {}", file.display()))?;

        let pytest = self
            .runner
            .run(&self.pytest_spec(file)?)
            .with_context(|| format!("run pytest on {relative}"))?;
        if pytest.timed_out {
            warn!(file = %relative, "pytest timed out");
            return Ok(FileRun::TimedOut { file: relative });
        }
        if pytest.success() {
            info!(file = %relative, "passed under pytest");
            return Ok(FileRun::Completed(TestFileResult {
                file: relative,
                name,
                verdict: TestVerdict::Passed,
                passed_via: Some(PassedVia::Pytest),
            }));
        }

        debug!(file = %relative, exit_code = ?pytest.exit_code, "pytest failed, running as script");
        let script = self
            .runner
            .run(&self.script_spec(file)?)
            .with_context(|| format!("run {relative} as script"))?;
        if script.timed_out {
            warn!(file = %relative, "script run timed out");
            return Ok(FileRun::TimedOut { file: relative });
        }

        let (verdict, passed_via) = if script.success() {
            info!(file = %relative, "passed as script");
            (TestVerdict::Passed, Some(PassedVia::Script))
        } else {
            warn!(file = %relative, exit_code = ?script.exit_code, "test file failed");
            (TestVerdict::Failed, None)
        };
        Ok(FileRun::Completed(TestFileResult {
            file: relative,
            name,
            verdict,
            passed_via,
        }))
    }
}

fn split_test_path(file: &Path) -> Result<(&Path, String)> {
    let dir = file
        .parent()
        .ok_or_else(|| anyhow!("test path has no parent: {}", file.display()))?;
    let name = file
        .file_name()
        .ok_or_else(|| anyhow!("test path has no file name: {}", file.display()))?;
    Ok((dir, name.to_string_lossy().into_owned()))
}

/// `/`-separated path relative to the checkout, falling back to the full path.
fn relative_display(root: &Path, file: &Path) -> String {
    let relative = file.strip_prefix(root).unwrap_or(file);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ScriptedRunner, failed_output, ok_output, timed_out_output};
    use std::path::PathBuf;

    fn tests_with(runner: &ScriptedRunner) -> PythonTests<'_, ScriptedRunner> {
        PythonTests::new(runner, "python3", Duration::from_secs(120))
    }

    #[test]
    fn pytest_runs_from_containing_directory() {
        let runner = ScriptedRunner::new(Vec::new());
        let spec = tests_with(&runner)
            .pytest_spec(Path::new("/co/pkg/test_app.py"))
            .expect("spec");
        assert_eq!(spec.program, "python3");
        assert_eq!(spec.args, vec!["-m", "pytest", "test_app.py", "-v"]);
        assert_eq!(spec.cwd, Some(PathBuf::from("/co/pkg")));
        assert_eq!(spec.timeout, Duration::from_secs(120));
    }

    #[test]
    fn pytest_pass_skips_fallback() {
        let runner = ScriptedRunner::outputs(vec![ok_output("1 passed")]);
        let run = tests_with(&runner)
            .run_file(Path::new("/co"), Path::new("/co/pkg/test_app.py"))
            .expect("run");
        let FileRun::Completed(result) = run else {
            panic!("expected completed run");
        };
        assert_eq!(result.file, "pkg/test_app.py");
        assert_eq!(result.name, "test_app.py");
        assert_eq!(result.verdict, TestVerdict::Passed);
        assert_eq!(result.passed_via, Some(PassedVia::Pytest));
        assert_eq!(runner.calls().len(), 1);
    }

    #[test]
    fn script_fallback_can_pass() {
        let runner = ScriptedRunner::outputs(vec![
            failed_output(1, "No module named pytest"),
            ok_output("All tests passed"),
        ]);
        let run = tests_with(&runner)
            .run_file(Path::new("/co"), Path::new("/co/test_app.py"))
            .expect("run");
        let FileRun::Completed(result) = run else {
            panic!("expected completed run");
        };
        assert_eq!(result.verdict, TestVerdict::Passed);
        assert_eq!(result.passed_via, Some(PassedVia::Script));

        let calls = runner.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1].args, vec!["test_app.py"]);
        assert_eq!(calls[1].cwd, Some(PathBuf::from("/co")));
    }

    #[test]
    fn both_failing_is_failed() {
        let runner = ScriptedRunner::outputs(vec![failed_output(1, ""), failed_output(2, "")]);
        let run = tests_with(&runner)
            .run_file(Path::new("/co"), Path::new("/co/test_app.py"))
            .expect("run");
        let FileRun::Completed(result) = run else {
            panic!("expected completed run");
        };
        assert_eq!(result.verdict, TestVerdict::Failed);
        assert_eq!(result.passed_via, None);
    }

    #[test]
    fn timeout_is_reported_without_fallback() {
        let runner = ScriptedRunner::outputs(vec![timed_out_output()]);
        let run = tests_with(&runner)
            .run_file(Path::new("/co"), Path::new("/co/test_slow.py"))
            .expect("run");
        assert_eq!(
            run,
            FileRun::TimedOut {
                file: "test_slow.py".to_string()
            }
        );
        assert_eq!(runner.calls().len(), 1);
    }
}
