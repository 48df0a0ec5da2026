//! Recovery of the deployed service endpoint from deploy tool output.
//!
//! Preference order: a structured line (JSON object carrying `service_url` or
//! `url`), then the first Cloud Run URL found by scanning text line by line,
//! then a synthesized placeholder so callers always get some URL string.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::core::types::UrlSource;

/// Domain suffix of Cloud Run service URLs.
pub const RUN_APP_SUFFIX: &str = ".run.app";

static RUN_APP_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"https://[^\s]+\.run\.app").expect("static run.app regex is valid")
});

/// A service URL together with how it was obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedUrl {
    pub url: String,
    pub source: UrlSource,
}

/// Resolve the service URL from combined deploy output.
pub fn resolve_service_url(output: &str, service_name: &str, region: &str) -> ResolvedUrl {
    if let Some(url) = structured_url(output) {
        return ResolvedUrl {
            url,
            source: UrlSource::Structured,
        };
    }
    if let Some(url) = scrape_url(output) {
        return ResolvedUrl {
            url,
            source: UrlSource::Scraped,
        };
    }
    ResolvedUrl {
        url: synthesize_url(service_name, region),
        source: UrlSource::Synthesized,
    }
}

/// First line that parses as a JSON object with a string `service_url` or `url`.
pub fn structured_url(output: &str) -> Option<String> {
    output.lines().find_map(|line| {
        let line = line.trim();
        if !line.starts_with('{') {
            return None;
        }
        let value: Value = serde_json::from_str(line).ok()?;
        let object = value.as_object()?;
        ["service_url", "url"].iter().find_map(|key| {
            object
                .get(*key)
                .and_then(Value::as_str)
                .filter(|url| url.starts_with("https://"))
                .map(str::to_string)
        })
    })
}

/// First `https://…run.app` match, scanning line by line.
pub fn scrape_url(output: &str) -> Option<String> {
    output
        .lines()
        .filter(|line| line.contains("https://") && line.contains(RUN_APP_SUFFIX))
        .find_map(|line| RUN_APP_URL.find(line).map(|m| m.as_str().to_string()))
}

/// Placeholder in the shape of a Cloud Run URL. Not guaranteed to resolve.
pub fn synthesize_url(service_name: &str, region: &str) -> String {
    format!("https://{service_name}-xxxxx-{region}.a.run.app")
}
