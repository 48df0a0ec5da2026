//! Conversation state machine.
//!
//! The dialogue is an explicit sequence of states with the four operations as
//! transition actions:
//!
//! ```text
//! AwaitingPlatform -> AwaitingRepoUrl -> Testing -> AwaitingConfirmation -> Deploying -> Done
//!                          ^                |                                  |
//!                          +-- clone error -+-- test failure -> Failed <-------+
//! ```
//!
//! Transitions are pure: they take the current state and the result of an
//! operation and return the next state. Running the operations is the job of
//! [`crate::session`].

use anyhow::{Result, bail};
use serde::Serialize;

use crate::core::types::{
    Checkout, Confirmation, DeployReport, Platform, PlatformSelection, Status, Step, TestReport,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionState {
    AwaitingPlatform,
    AwaitingRepoUrl {
        platform: Platform,
    },
    /// Transient: the repository tester is running.
    Testing {
        platform: Platform,
        url: String,
    },
    AwaitingConfirmation {
        platform: Platform,
        checkout: Checkout,
    },
    /// Transient: the deployment invoker is running.
    Deploying {
        checkout: Checkout,
    },
    Done {
        completion: Completion,
    },
    Failed {
        reason: String,
    },
}

/// How a session ended without failing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Completion {
    Deployed { service_url: String },
    Cancelled,
}

/// Operation results (and raw input) that drive the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    PlatformSelected(PlatformSelection),
    RepoUrlSubmitted(String),
    Tested(TestReport),
    ConfirmationReceived(Confirmation),
    Deployed(DeployReport),
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::PlatformSelected(_) => "platform_selected",
            Event::RepoUrlSubmitted(_) => "repo_url_submitted",
            Event::Tested(_) => "tested",
            Event::ConfirmationReceived(_) => "confirmation_received",
            Event::Deployed(_) => "deployed",
        }
    }
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::AwaitingPlatform => "awaiting_platform",
            SessionState::AwaitingRepoUrl { .. } => "awaiting_repo_url",
            SessionState::Testing { .. } => "testing",
            SessionState::AwaitingConfirmation { .. } => "awaiting_confirmation",
            SessionState::Deploying { .. } => "deploying",
            SessionState::Done { .. } => "done",
            SessionState::Failed { .. } => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Done { .. } | SessionState::Failed { .. })
    }

    /// Question to put to the user, for states that wait on input.
    pub fn prompt(&self) -> Option<&'static str> {
        match self {
            SessionState::AwaitingPlatform => Some(
                "Which cloud platform would you like to deploy to? (AWS, Google Cloud/GCP, or Azure)",
            ),
            SessionState::AwaitingRepoUrl { .. } => {
                Some("Please provide the GitHub repository URL you want to deploy.")
            }
            SessionState::AwaitingConfirmation { .. } => {
                Some("Would you like to proceed with deployment to Cloud Run? (yes/no)")
            }
            _ => None,
        }
    }
}

/// Compute the state that follows `state` once `event` has happened.
///
/// Events that do not belong to the current state are rejected.
pub fn transition(state: &SessionState, event: Event) -> Result<SessionState> {
    let next = match (state, event) {
        (SessionState::AwaitingPlatform, Event::PlatformSelected(selection)) => {
            match (selection.status, selection.platform) {
                (Status::Success | Status::Info, Some(platform)) => {
                    SessionState::AwaitingRepoUrl { platform }
                }
                _ => SessionState::AwaitingPlatform,
            }
        }
        (SessionState::AwaitingRepoUrl { platform }, Event::RepoUrlSubmitted(url)) => {
            let url = url.trim();
            if url.is_empty() {
                SessionState::AwaitingRepoUrl {
                    platform: *platform,
                }
            } else {
                SessionState::Testing {
                    platform: *platform,
                    url: url.to_string(),
                }
            }
        }
        (SessionState::Testing { platform, .. }, Event::Tested(report)) => {
            match (report.checkout(), report.step) {
                (Some(checkout), _) => SessionState::AwaitingConfirmation {
                    platform: *platform,
                    checkout,
                },
                (None, Step::TestFailed) => SessionState::Failed {
                    reason: report.message,
                },
                // Clone problems, timeouts and faults: let the user try another URL.
                (None, _) => SessionState::AwaitingRepoUrl {
                    platform: *platform,
                },
            }
        }
        (SessionState::AwaitingConfirmation { checkout, .. }, Event::ConfirmationReceived(c)) => {
            if c.is_confirmed() {
                SessionState::Deploying {
                    checkout: checkout.clone(),
                }
            } else {
                SessionState::Done {
                    completion: Completion::Cancelled,
                }
            }
        }
        (SessionState::Deploying { .. }, Event::Deployed(report)) => {
            match (report.status, report.service_url) {
                (Status::Success, Some(service_url)) => SessionState::Done {
                    completion: Completion::Deployed { service_url },
                },
                _ => SessionState::Failed {
                    reason: report.message,
                },
            }
        }
        (state, event) => bail!(
            "event {} is not valid in state {}",
            event.name(),
            state.name()
        ),
    };
    Ok(next)
}
