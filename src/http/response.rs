//! Response construction.
//!
//! Maps upstream results and queue failures to what the client sees. Upstream
//! responses pass through with their status, content type and body; queue
//! failures become JSON error bodies.

use axum::{
    body::Body,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::resilience::QueueError;
use crate::upstream::{UpstreamError, UpstreamResponse};

/// JSON body for every error the proxy itself produces.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub request_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempts: Option<u32>,
}

/// Turn an upstream response into the client response.
pub fn from_upstream(upstream: UpstreamResponse) -> Response {
    let status = StatusCode::from_u16(upstream.status).unwrap_or(StatusCode::BAD_GATEWAY);
    let mut response = Response::new(Body::from(upstream.body));
    *response.status_mut() = status;
    if let Some(content_type) = upstream
        .content_type
        .and_then(|ct| HeaderValue::from_str(&ct).ok())
    {
        response.headers_mut().insert(header::CONTENT_TYPE, content_type);
    }
    response
}

/// Status code for a queue failure.
///
/// Exhaustion means the upstream stayed unavailable for the whole retry
/// window; anything else is a fault inside the proxy.
pub fn status_for(error: &QueueError<UpstreamError>) -> StatusCode {
    match error {
        QueueError::RetriesExhausted { .. } => StatusCode::SERVICE_UNAVAILABLE,
        QueueError::Admission(_) | QueueError::Abandoned => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Turn a queue failure into a JSON error response.
pub fn from_queue_error(error: &QueueError<UpstreamError>, request_id: String) -> Response {
    let body = ErrorBody {
        error: error.to_string(),
        request_id,
        attempts: error.attempts(),
    };
    (status_for(error), Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Bytes};

    #[tokio::test]
    async fn test_upstream_passthrough() {
        let response = from_upstream(UpstreamResponse {
            status: 404,
            content_type: Some("application/json".into()),
            body: Bytes::from_static(b"{\"missing\":true}"),
        });

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
        let body = to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"{\"missing\":true}");
    }

    #[tokio::test]
    async fn test_exhaustion_is_service_unavailable() {
        let error = QueueError::RetriesExhausted {
            attempts: 4,
            last_error: UpstreamError::Status(503),
        };
        let response = from_queue_error(&error, "req-1".into());
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let body = to_bytes(response.into_body(), 1024).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["request_id"], "req-1");
        assert_eq!(json["attempts"], 4);
    }

    #[test]
    fn test_internal_failures() {
        assert_eq!(
            status_for(&QueueError::Abandoned),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_for(&QueueError::Admission("no runtime".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
