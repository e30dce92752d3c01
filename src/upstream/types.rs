//! Upstream request/response types and errors.

use std::time::Duration;
use axum::body::Bytes;
use thiserror::Error;

/// One GET to forward. Cloned for every attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamRequest {
    /// Path plus optional query, always starting with `/`.
    pub path_and_query: String,
    /// Correlation ID forwarded as `x-request-id`.
    pub request_id: String,
}

impl UpstreamRequest {
    pub fn new(path: &str, query: Option<&str>, request_id: impl Into<String>) -> Self {
        let mut path_and_query = String::with_capacity(path.len() + 1);
        if !path.starts_with('/') {
            path_and_query.push('/');
        }
        path_and_query.push_str(path);
        if let Some(query) = query.filter(|q| !q.is_empty()) {
            path_and_query.push('?');
            path_and_query.push_str(query);
        }
        Self {
            path_and_query,
            request_id: request_id.into(),
        }
    }
}

/// A response worth handing back to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Bytes,
}

/// Why an upstream attempt failed. Every variant is retried by the queue.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpstreamError {
    #[error("invalid upstream URI: {0}")]
    InvalidUri(String),

    #[error("upstream transport error: {0}")]
    Transport(String),

    #[error("upstream timed out after {0:?}")]
    Timeout(Duration),

    #[error("upstream returned {0}")]
    Status(u16),

    #[error("failed to read upstream body: {0}")]
    Body(String),
}

/// Statuses the upstream uses to say "not now".
pub fn is_failure_status(status: u16) -> bool {
    status == 429 || (500..600).contains(&status)
}
