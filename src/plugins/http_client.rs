//! Shared HTTP plumbing for platform adapters
//!
//! Every adapter and the staging store share one `reqwest::Client` built here,
//! so the per-call timeout is applied uniformly to every network call.

use crate::core::error::PublishError;
use serde_json::Value;
use std::time::Duration;

/// User agent sent with every request
pub const USER_AGENT: &str = concat!("video-publisher/", env!("CARGO_PKG_VERSION"));

/// Longest response excerpt kept in an error message
const MAX_BODY_EXCERPT: usize = 500;

/// Build the shared HTTP client with a bounded per-request timeout
pub fn build_client(timeout: Duration) -> Result<reqwest::Client, PublishError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| PublishError::ConfigError(format!("Failed to create HTTP client: {}", e)))
}

/// Read a response into its status code and body text
///
/// A body that cannot be read is treated as empty.
pub(crate) async fn read_response(response: reqwest::Response) -> (u16, String) {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    (status, body)
}

/// Parse a response body as JSON
///
/// Returns a short description of the problem for empty or non-JSON bodies,
/// which callers turn into the error of the step that received it.
pub(crate) fn parse_json_body(body: &str) -> Result<Value, String> {
    if body.trim().is_empty() {
        return Err("empty response body".to_string());
    }
    serde_json::from_str(body).map_err(|e| format!("invalid JSON response: {}", e))
}

/// Extract a string field, accepting numeric ids as well
pub(crate) fn string_field(value: &Value, pointer: &str) -> Option<String> {
    match value.pointer(pointer)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Shorten a response body for inclusion in an error message
pub(crate) fn excerpt(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= MAX_BODY_EXCERPT {
        return trimmed.to_string();
    }
    let cut: String = trimmed.chars().take(MAX_BODY_EXCERPT).collect();
    format!("{}...", cut)
}
