//! Deterministic classification of a free-text platform preference.

use crate::core::types::{Platform, PlatformSelection, Status};

const GCP_KEYWORDS: [&str; 2] = ["gcp", "google"];

/// Classify `choice` into a deployment target.
///
/// Case-insensitive substring match with fixed precedence:
/// GCP (`gcp`/`google`), then `aws`, then `azure`. Anything else is an error
/// result asking for a supported platform. Never fails.
pub fn select_platform(choice: &str) -> PlatformSelection {
    match classify(&choice.to_lowercase()) {
        Some(platform) if platform.is_supported() => PlatformSelection {
            status: Status::Success,
            platform: Some(platform),
            message: "Great! You selected Google Cloud Platform. Now, please provide the GitHub \
                      repository URL you want to deploy."
                .to_string(),
        },
        Some(platform) => PlatformSelection {
            status: Status::Info,
            platform: Some(platform),
            message: format!(
                "{} deployment is coming soon! For this demo, we'll use Google Cloud Platform. \
                 Please provide your GitHub repository URL.",
                platform.display_name()
            ),
        },
        None => PlatformSelection {
            status: Status::Error,
            platform: None,
            message: "Please specify a cloud platform: AWS, Google Cloud (GCP), or Azure"
                .to_string(),
        },
    }
}

fn classify(choice: &str) -> Option<Platform> {
    if GCP_KEYWORDS.iter().any(|keyword| choice.contains(keyword)) {
        Some(Platform::Gcp)
    } else if choice.contains("aws") {
        Some(Platform::Aws)
    } else if choice.contains("azure") {
        Some(Platform::Azure)
    } else {
        None
    }
}
