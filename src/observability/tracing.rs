//! Request spans.
//!
//! Every inbound request gets a span carrying its request ID, so queue and
//! upstream events logged while serving it can be correlated.

use axum::http::Request;
use tracing::Span;

use crate::http::request::request_id_of;

/// Span factory for `TraceLayer::make_span_with`.
pub fn make_request_span<B>(request: &Request<B>) -> Span {
    tracing::info_span!(
        "request",
        method = %request.method(),
        path = %request.uri().path(),
        request_id = %request_id_of(request.headers()),
    )
}
