//! Free-text confirmation parsing.

use crate::core::types::{Confirmation, Status};

/// Tokens that count as consent when they appear anywhere in the response.
///
/// Matching is by substring, not whole word: "nyet" contains `y` and
/// "no, don't go" contains `go`, and both confirm.
pub const AFFIRMATIVE_TOKENS: [&str; 5] = ["yes", "y", "deploy", "proceed", "go"];

/// Classify a user response as `confirmed` or `cancelled`.
pub fn parse_confirmation(response: &str) -> Confirmation {
    let response = response.to_lowercase();
    if AFFIRMATIVE_TOKENS
        .iter()
        .any(|token| response.contains(token))
    {
        Confirmation {
            status: Status::Confirmed,
            message: "Starting deployment process...".to_string(),
        }
    } else {
        Confirmation {
            status: Status::Cancelled,
            message: "Deployment cancelled. You can start again anytime!".to_string(),
        }
    }
}
