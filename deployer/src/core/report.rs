//! Aggregation of per-file test results into a tester report.

use crate::core::types::{Checkout, Status, Step, TestFileResult, TestReport};

/// Report for a checkout with no discovered test files.
///
/// Testing is not mandatory for progression, so the checkout is still surfaced
/// for a later deployment; readiness is left unset.
pub fn no_tests_found(checkout: Checkout) -> TestReport {
    TestReport {
        status: Status::Warning,
        message: "No test files found (test_*.py). Proceeding without tests.".to_string(),
        step: Step::Test,
        clone_path: Some(checkout.clone_path),
        repo_name: Some(checkout.repo_name),
        ready_to_deploy: None,
        results: Vec::new(),
    }
}

/// Aggregate per-file results.
///
/// Every file passed: `success` with the checkout and `ready_to_deploy=true`.
/// Any file failed: `error` with `step=test_failed` and no checkout, while the
/// message still lists every file's verdict.
pub fn aggregate_results(checkout: Checkout, results: Vec<TestFileResult>) -> TestReport {
    let lines = results
        .iter()
        .map(TestFileResult::summary_line)
        .collect::<Vec<_>>()
        .join("\n");

    if results.iter().all(TestFileResult::passed) {
        TestReport {
            status: Status::Success,
            message: format!("Repository cloned and all tests passed!\n{lines}"),
            step: Step::TestPassed,
            clone_path: Some(checkout.clone_path),
            repo_name: Some(checkout.repo_name),
            ready_to_deploy: Some(true),
            results,
        }
    } else {
        TestReport {
            results,
            ..TestReport::error(Step::TestFailed, format!("Tests failed:\n{lines}"))
        }
    }
}
