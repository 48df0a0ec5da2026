//! Orchestration for the repository tester: clone, discover, run, aggregate.
//!
//! [`clone_and_test`] never returns an error. Every fault is folded into a
//! [`TestReport`] with `status=error` and a `step` naming the phase. A checkout
//! that the report does not hand back is deleted before returning.

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::{debug, info, instrument, warn};

use crate::core::repo::repo_name_from_url;
use crate::core::report::{aggregate_results, no_tests_found};
use crate::core::types::{Checkout, Step, TestReport};
use crate::io::config::DeployerConfig;
use crate::io::discovery::discover_test_files;
use crate::io::git::Git;
use crate::io::process::CommandRunner;
use crate::io::pytest::{FileRun, PythonTests};
use crate::io::scratch::{checkout_dir, discard_checkout_dir, prepare_checkout_dir};

const TIMEOUT_MESSAGE: &str = "Operation timed out. Please try again.";

/// Clone `url` into a fresh scratch directory and run its `test_*.py` files.
#[instrument(skip_all, fields(url = %url))]
pub fn clone_and_test<R: CommandRunner>(runner: &R, cfg: &DeployerConfig, url: &str) -> TestReport {
    let mut scratch = None;
    let report = match try_clone_and_test(runner, cfg, url, &mut scratch) {
        Ok(report) => {
            info!(status = ?report.status, step = ?report.step, "repository test finished");
            report
        }
        Err(err) => {
            warn!(err = %err, "repository test failed unexpectedly");
            TestReport::error(Step::Exception, format!("Error: {err:#}"))
        }
    };
    if let (None, Some(dir)) = (report.checkout(), scratch.as_deref()) {
        discard_checkout_dir(dir);
    }
    report
}

/// `scratch` receives the checkout directory as soon as it is chosen.
fn try_clone_and_test<R: CommandRunner>(
    runner: &R,
    cfg: &DeployerConfig,
    url: &str,
    scratch: &mut Option<PathBuf>,
) -> Result<TestReport> {
    let repo_name = match repo_name_from_url(url) {
        Ok(name) => name,
        Err(err) => {
            return Ok(TestReport::error(
                Step::Clone,
                format!("Failed to clone repository: {err}"),
            ));
        }
    };

    let clone_path = checkout_dir(&cfg.scratch_root(), &repo_name, cfg.scratch.unique);
    *scratch = Some(clone_path.clone());
    prepare_checkout_dir(&clone_path)?;

    info!(repo = %repo_name, dest = %clone_path.display(), "cloning repository");
    let git = Git::new(runner, &cfg.tools.git);
    let output = git.clone_repo(url, &clone_path, cfg.clone_timeout())?;
    if output.timed_out {
        return Ok(TestReport::error(Step::Timeout, TIMEOUT_MESSAGE));
    }
    if !output.success() {
        return Ok(TestReport::error(
            Step::Clone,
            format!(
                "Failed to clone repository: {}",
                output.stderr_text().trim()
            ),
        ));
    }

    let checkout = Checkout {
        clone_path,
        repo_name,
    };
    run_discovered_tests(runner, cfg, checkout)
}

fn run_discovered_tests<R: CommandRunner>(
    runner: &R,
    cfg: &DeployerConfig,
    checkout: Checkout,
) -> Result<TestReport> {
    let test_files = discover_test_files(&checkout.clone_path)
        .with_context(|| format!("discover tests in {}", checkout.clone_path.display()))?;
    if test_files.is_empty() {
        info!("no test files found");
        return Ok(no_tests_found(checkout));
    }

    info!(count = test_files.len(), "running test files");
    let tests = PythonTests::new(runner, &cfg.tools.python, cfg.test_timeout());
    let mut results = Vec::with_capacity(test_files.len());
    for file in &test_files {
        match tests.run_file(&checkout.clone_path, file)? {
            FileRun::Completed(result) => {
                debug!(file = %result.file, verdict = ?result.verdict, "test file finished");
                results.push(result);
            }
            FileRun::TimedOut { file } => {
                warn!(file = %file, "aborting test phase after timeout");
                return Ok(TestReport::error(Step::Timeout, TIMEOUT_MESSAGE));
            }
        }
    }

    Ok(aggregate_results(checkout, results))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{PassedVia, Status, TestVerdict};
    use crate::test_support::{
        ScriptedRunner, ScriptedStep, failed_output, ok_output, scratch_config, timed_out_output,
    };

    #[test]
    fn unusable_url_fails_before_cloning() {
        let temp = tempfile::tempdir().expect("tempdir");
        let runner = ScriptedRunner::new(Vec::new());
        let report = clone_and_test(
            &runner,
            &scratch_config(temp.path()),
            "https://github.com/org/.git",
        );
        assert_eq!(report.status, Status::Error);
        assert_eq!(report.step, Step::Clone);
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn clone_failure_reports_stderr() {
        let temp = tempfile::tempdir().expect("tempdir");
        let runner = ScriptedRunner::new(vec![ScriptedStep::output(failed_output(
            128,
            "fatal: repository not found",
        ))]);
        let report = clone_and_test(
            &runner,
            &scratch_config(temp.path()),
            "https://github.com/org/missing.git",
        );
        assert_eq!(report.status, Status::Error);
        assert_eq!(report.step, Step::Clone);
        assert!(report.message.contains("fatal: repository not found"));
        assert!(report.clone_path.is_none());
    }

    #[test]
    fn clone_timeout_is_timeout_step() {
        let temp = tempfile::tempdir().expect("tempdir");
        let runner = ScriptedRunner::new(vec![ScriptedStep::output(timed_out_output())]);
        let report = clone_and_test(&runner, &scratch_config(temp.path()), "https://h/o/r");
        assert_eq!(report.step, Step::Timeout);
        assert_eq!(report.status, Status::Error);
    }

    #[test]
    fn spawn_failure_is_exception_step() {
        let temp = tempfile::tempdir().expect("tempdir");
        let runner = ScriptedRunner::new(vec![ScriptedStep::spawn_error("git: not found")]);
        let report = clone_and_test(&runner, &scratch_config(temp.path()), "https://h/o/r");
        assert_eq!(report.step, Step::Exception);
        assert!(report.message.starts_with("Error: "));
        assert!(report.message.contains("git: not found"));
    }

    #[test]
    fn no_test_files_is_warning_with_checkout() {
        let temp = tempfile::tempdir().expect("tempdir");
        let runner = ScriptedRunner::new(vec![ScriptedStep::clone_with(&[("README.md", "hi")])]);
        let report = clone_and_test(
            &runner,
            &scratch_config(temp.path()),
            "https://github.com/org/repo.git",
        );
        assert_eq!(report.status, Status::Warning);
        assert_eq!(report.step, Step::Test);
        assert_eq!(report.repo_name.as_deref(), Some("repo"));
        let clone_path = report.clone_path.clone().expect("clone path");
        assert!(clone_path.join("README.md").is_file());
        assert_ne!(report.ready_to_deploy, Some(true));
        assert!(report.checkout().is_some());
    }

    #[test]
    fn passing_tests_are_ready_to_deploy() {
        let temp = tempfile::tempdir().expect("tempdir");
        let runner = ScriptedRunner::new(vec![
            ScriptedStep::clone_with(&[("tests/test_app.py", "def test_ok(): pass\n")]),
            ScriptedStep::output(ok_output("1 passed")),
        ]);
        let report = clone_and_test(
            &runner,
            &scratch_config(temp.path()),
            "https://github.com/org/app",
        );
        assert_eq!(report.status, Status::Success);
        assert_eq!(report.step, Step::TestPassed);
        assert_eq!(report.ready_to_deploy, Some(true));
        assert!(report.message.contains("✓ test_app.py: PASSED"));
        assert_eq!(report.results[0].passed_via, Some(PassedVia::Pytest));

        let calls = runner.calls();
        let clone_path = report.clone_path.expect("clone path");
        assert_eq!(calls[1].cwd, Some(clone_path.join("tests")));
    }

    #[test]
    fn one_failing_file_fails_run_but_all_files_are_attempted() {
        let temp = tempfile::tempdir().expect("tempdir");
        let runner = ScriptedRunner::new(vec![
            ScriptedStep::clone_with(&[("test_a.py", ""), ("test_b.py", "")]),
            // test_a.py: pytest fails, script fails
            ScriptedStep::output(failed_output(1, "")),
            ScriptedStep::output(failed_output(1, "")),
            // test_b.py: pytest passes
            ScriptedStep::output(ok_output("")),
        ]);
        let report = clone_and_test(
            &runner,
            &scratch_config(temp.path()),
            "https://github.com/org/mixed",
        );
        assert_eq!(report.status, Status::Error);
        assert_eq!(report.step, Step::TestFailed);
        assert!(report.message.contains("✗ test_a.py: FAILED"));
        assert!(report.message.contains("✓ test_b.py: PASSED"));
        assert_eq!(report.results[0].verdict, TestVerdict::Failed);
        assert_eq!(report.results[1].verdict, TestVerdict::Passed);
        assert!(report.clone_path.is_none());
        assert_eq!(runner.calls().len(), 4);
    }

    fn scratch_entries(root: &std::path::Path) -> usize {
        std::fs::read_dir(root).expect("read scratch root").count()
    }

    #[test]
    fn failed_runs_leave_no_checkouts_behind() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = scratch_config(temp.path());
        for _ in 0..3 {
            let runner = ScriptedRunner::new(vec![
                ScriptedStep::clone_with(&[("test_a.py", "")]),
                ScriptedStep::output(failed_output(1, "")),
                ScriptedStep::output(failed_output(1, "")),
            ]);
            let report = clone_and_test(&runner, &cfg, "https://github.com/org/flaky");
            assert_eq!(report.step, Step::TestFailed);
        }
        assert_eq!(scratch_entries(temp.path()), 0);
    }

    #[test]
    fn timed_out_and_faulted_runs_discard_their_checkout() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = scratch_config(temp.path());

        let timed_out = ScriptedRunner::new(vec![
            ScriptedStep::clone_with(&[("test_a.py", "")]),
            ScriptedStep::output(timed_out_output()),
        ]);
        let report = clone_and_test(&timed_out, &cfg, "https://github.com/org/slow");
        assert_eq!(report.step, Step::Timeout);

        // Clone succeeds, then the runner has nothing left for the pytest call.
        let faulted = ScriptedRunner::new(vec![ScriptedStep::clone_with(&[("test_a.py", "")])]);
        let report = clone_and_test(&faulted, &cfg, "https://github.com/org/broken");
        assert_eq!(report.step, Step::Exception);

        assert_eq!(scratch_entries(temp.path()), 0);
    }

    #[test]
    fn handed_back_checkout_is_kept() {
        let temp = tempfile::tempdir().expect("tempdir");
        let runner = ScriptedRunner::new(vec![ScriptedStep::clone_with(&[("README.md", "")])]);
        let report = clone_and_test(
            &runner,
            &scratch_config(temp.path()),
            "https://github.com/org/docs",
        );
        let checkout = report.checkout().expect("checkout");
        assert!(checkout.clone_path.is_dir());
        assert_eq!(scratch_entries(temp.path()), 1);
    }

    #[test]
    fn test_timeout_aborts_with_timeout_step() {
        let temp = tempfile::tempdir().expect("tempdir");
        let runner = ScriptedRunner::new(vec![
            ScriptedStep::clone_with(&[("test_a.py", ""), ("test_b.py", "")]),
            ScriptedStep::output(timed_out_output()),
        ]);
        let report = clone_and_test(&runner, &scratch_config(temp.path()), "https://h/o/slow");
        assert_eq!(report.step, Step::Timeout);
        assert_eq!(runner.calls().len(), 2);
    }
}
