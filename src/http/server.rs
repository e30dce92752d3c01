//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (request ID, tracing, timeout, body limit)
//! - Forward upstream requests through the retry queue
//! - Apply config reloads to the upstream client
//! - Serve until the shutdown signal fires

use axum::{
    body::Body,
    extract::{Path, RawQuery, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::{limit::RequestBodyLimitLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::{ProxyConfig, QueueConfig};
use crate::http::request::{propagate_request_id_layer, request_id_of, set_request_id_layer};
use crate::http::response;
use crate::observability::{metrics, tracing::make_request_span};
use crate::resilience::QueueSnapshot;
use crate::upstream::{upstream_queue, UpstreamClient, UpstreamError, UpstreamQueue, UpstreamRequest};

/// Route label used for metrics on the forwarding endpoint.
const UPSTREAM_ROUTE: &str = "upstream";

/// Errors that prevent the server from starting.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("upstream configuration rejected: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("server I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub queue: UpstreamQueue,
    pub upstream: Arc<UpstreamClient>,
}

/// HTTP server for the queue proxy.
pub struct HttpServer {
    router: Router,
    config: ProxyConfig,
    state: AppState,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: ProxyConfig) -> Result<Self, ServerError> {
        let upstream = Arc::new(UpstreamClient::new(&config.upstream)?);
        let queue = upstream_queue(upstream.clone(), config.queue);
        let state = AppState { queue, upstream };

        let router = Self::build_router(&config, state.clone());
        Ok(Self {
            router,
            config,
            state,
        })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ProxyConfig, state: AppState) -> Router {
        Router::new()
            .route("/api/v1/upstream", get(forward_root))
            .route("/api/v1/upstream/{*path}", get(forward_path))
            .route("/queue/status", get(queue_status))
            .route("/health", get(health))
            .with_state(state)
            .layer(RequestBodyLimitLayer::new(config.security.max_body_size))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(propagate_request_id_layer())
            .layer(TraceLayer::new_for_http().make_span_with(make_request_span::<Body>))
            .layer(set_request_id_layer())
    }

    /// Run the server, accepting connections on the given listener.
    ///
    /// Config updates are applied until shutdown; only upstream settings
    /// take effect live.
    pub async fn run(
        self,
        listener: TcpListener,
        config_updates: mpsc::UnboundedReceiver<ProxyConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let reloader = tokio::spawn(apply_config_updates(
            self.state.clone(),
            self.config.queue,
            config_updates,
            shutdown.resubscribe(),
        ));

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        reloader.abort();
        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// The queue guarding the upstream.
    pub fn queue(&self) -> &UpstreamQueue {
        &self.state.queue
    }
}

async fn apply_config_updates(
    state: AppState,
    active_queue: QueueConfig,
    mut updates: mpsc::UnboundedReceiver<ProxyConfig>,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            update = updates.recv() => {
                let Some(config) = update else { break };
                if let Err(e) = state.upstream.apply(&config.upstream) {
                    tracing::error!(error = %e, "Rejected upstream settings from reload");
                }
                if config.queue != active_queue {
                    tracing::warn!("Queue settings changed; they apply only after a restart");
                }
            }
            _ = shutdown.recv() => break,
        }
    }
}

async fn forward_root(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
) -> Response {
    forward(state, String::new(), query, headers).await
}

async fn forward_path(
    State(state): State<AppState>,
    Path(path): Path<String>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
) -> Response {
    forward(state, path, query, headers).await
}

/// Send one GET through the retry queue and relay the outcome.
async fn forward(
    state: AppState,
    path: String,
    query: Option<String>,
    headers: HeaderMap,
) -> Response {
    let start_time = Instant::now();
    let request_id = request_id_of(&headers);
    let request = UpstreamRequest::new(&path, query.as_deref(), request_id.clone());

    tracing::debug!(path = %request.path_and_query, "Queueing upstream request");

    let response = match state.queue.call(request).await {
        Ok(upstream) => response::from_upstream(upstream),
        Err(e) => {
            tracing::error!(error = %e, "Upstream request failed");
            response::from_queue_error(&e, request_id)
        }
    };

    metrics::record_request(UPSTREAM_ROUTE, response.status().as_u16(), start_time);
    response
}

#[derive(Serialize)]
struct HealthBody {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthBody> {
    Json(HealthBody {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Queue snapshot plus the limits it runs under.
#[derive(Debug, Serialize)]
pub struct QueueStatus {
    pub queue: &'static str,
    #[serde(flatten)]
    pub snapshot: QueueSnapshot,
    pub max_active_calls: usize,
    pub max_retries_per_window: u32,
    pub upstream: String,
}

async fn queue_status(State(state): State<AppState>) -> impl IntoResponse {
    let config = state.queue.config();
    let status = QueueStatus {
        queue: state.queue.name(),
        snapshot: state.queue.snapshot(),
        max_active_calls: config.max_active_calls,
        max_retries_per_window: config.max_retries_per_window,
        upstream: state.upstream.settings().base_url.to_string(),
    };
    (StatusCode::OK, Json(status))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use axum::http::Request;
    use tower::ServiceExt;

    fn test_server() -> HttpServer {
        let mut config = ProxyConfig::default();
        // Nothing listens here; only local routes are exercised.
        config.upstream.base_url = "http://127.0.0.1:9".into();
        HttpServer::new(config).unwrap()
    }

    #[tokio::test]
    async fn test_health_route() {
        let server = test_server();
        let response = server
            .router
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
        let body = to_bytes(response.into_body(), 1024).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn test_queue_status_route() {
        let server = test_server();
        let response = server
            .router
            .oneshot(
                Request::get("/queue/status")
                    .header("x-request-id", "given-id")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-request-id"], "given-id");
        let body = to_bytes(response.into_body(), 4096).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["queue"], "upstream");
        assert_eq!(json["failure_count"], 0);
        assert_eq!(json["max_active_calls"], 5);
        assert_eq!(json["upstream"], "http://127.0.0.1:9/");
    }

    #[test]
    fn test_invalid_upstream_rejected() {
        let mut config = ProxyConfig::default();
        config.upstream.base_url = "::::".into();
        assert!(matches!(HttpServer::new(config), Err(ServerError::Upstream(_))));
    }
}
