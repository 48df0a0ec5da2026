//! Shared result vocabulary for the deployer operations.
//!
//! Every operation answers with a status tag, a human-readable message, and a
//! handful of operation-specific fields that are only present when they mean
//! something for that status. These types must stay serializable as flat JSON
//! objects; the CLI prints them verbatim.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Status tag carried by every operation result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Info,
    Warning,
    Error,
    Confirmed,
    Cancelled,
}

/// Phase discriminator reported by the repository tester.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    /// Clone failed (or the URL did not yield a usable repository name).
    Clone,
    /// Clone succeeded but no test files were found.
    Test,
    TestPassed,
    TestFailed,
    /// A bounded wait was exceeded at any stage.
    Timeout,
    /// Any other unexpected fault.
    Exception,
}

/// Deployment targets recognised by the platform selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Platform {
    #[serde(rename = "Google Cloud Platform (GCP)")]
    Gcp,
    #[serde(rename = "AWS")]
    Aws,
    #[serde(rename = "Azure")]
    Azure,
}

impl Platform {
    pub fn display_name(self) -> &'static str {
        match self {
            Platform::Gcp => "Google Cloud Platform (GCP)",
            Platform::Aws => "AWS",
            Platform::Azure => "Azure",
        }
    }

    /// Only GCP (Cloud Run) deployments are implemented.
    pub fn is_supported(self) -> bool {
        matches!(self, Platform::Gcp)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformSelection {
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<Platform>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Confirmation {
    pub status: Status,
    pub message: String,
}

impl Confirmation {
    pub fn is_confirmed(&self) -> bool {
        self.status == Status::Confirmed
    }
}

/// Per-file verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TestVerdict {
    Passed,
    Failed,
}

/// Which invocation made a test file pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PassedVia {
    Pytest,
    Script,
}

/// Outcome of running one discovered test file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestFileResult {
    /// Path relative to the checkout root, `/`-separated.
    pub file: String,
    /// Bare file name, used in the human-readable summary.
    pub name: String,
    pub verdict: TestVerdict,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub passed_via: Option<PassedVia>,
}

impl TestFileResult {
    pub fn passed(&self) -> bool {
        self.verdict == TestVerdict::Passed
    }

    /// One summary line, e.g. `✓ test_app.py: PASSED`.
    pub fn summary_line(&self) -> String {
        match self.verdict {
            TestVerdict::Passed => format!("✓ {}: PASSED", self.name),
            TestVerdict::Failed => format!("✗ {}: FAILED", self.name),
        }
    }
}

/// A local checkout handed from the tester to the deployment invoker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkout {
    pub clone_path: PathBuf,
    pub repo_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestReport {
    pub status: Status,
    pub message: String,
    pub step: Step,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clone_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repo_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ready_to_deploy: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub results: Vec<TestFileResult>,
}

impl TestReport {
    /// Error report with no checkout attached.
    pub fn error(step: Step, message: impl Into<String>) -> Self {
        Self {
            status: Status::Error,
            message: message.into(),
            step,
            clone_path: None,
            repo_name: None,
            ready_to_deploy: None,
            results: Vec::new(),
        }
    }

    /// The deployable checkout, present only after `success` or `warning`.
    pub fn checkout(&self) -> Option<Checkout> {
        if !matches!(self.status, Status::Success | Status::Warning) {
            return None;
        }
        match (&self.clone_path, &self.repo_name) {
            (Some(clone_path), Some(repo_name)) => Some(Checkout {
                clone_path: clone_path.clone(),
                repo_name: repo_name.clone(),
            }),
            _ => None,
        }
    }
}

/// How the reported service URL was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UrlSource {
    /// A machine-readable line emitted by the deploy tool.
    Structured,
    /// Scanned out of free-form output text.
    Scraped,
    /// Placeholder built from the service name and region.
    Synthesized,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployReport {
    pub status: Status,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url_source: Option<UrlSource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl DeployReport {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: Status::Error,
            message: message.into(),
            service_url: None,
            url_source: None,
            service_name: None,
            project: None,
            region: None,
            details: None,
        }
    }
}
