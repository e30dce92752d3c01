//! HTTP client for the remote service.
//!
//! # Responsibilities
//! - Build the upstream URI from the live base URL
//! - Forward the request ID
//! - Enforce a per-attempt deadline covering headers and body
//! - Classify 429/5xx as failures so the queue retries them

use std::sync::Arc;
use std::time::Duration;
use arc_swap::ArcSwap;
use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, Uri};
use futures_util::future::BoxFuture;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use url::Url;

use crate::config::{QueueConfig, UpstreamConfig};
use crate::http::request::X_REQUEST_ID;
use crate::resilience::{wrap, RetryQueue};
use crate::upstream::types::{
    is_failure_status, UpstreamError, UpstreamRequest, UpstreamResponse,
};

const USER_AGENT: &str = concat!("queue-proxy/", env!("CARGO_PKG_VERSION"));

/// Settings that may change on config reload.
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamSettings {
    pub base_url: Url,
    pub timeout: Duration,
    pub max_response_bytes: usize,
}

impl TryFrom<&UpstreamConfig> for UpstreamSettings {
    type Error = UpstreamError;

    fn try_from(config: &UpstreamConfig) -> Result<Self, Self::Error> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| UpstreamError::InvalidUri(format!("{}: {}", config.base_url, e)))?;
        Ok(Self {
            base_url,
            timeout: Duration::from_secs(config.timeout_secs),
            max_response_bytes: config.max_response_bytes,
        })
    }
}

/// Client bound to the single upstream service.
pub struct UpstreamClient {
    client: Client<HttpConnector, Body>,
    settings: ArcSwap<UpstreamSettings>,
}

impl UpstreamClient {
    pub fn new(config: &UpstreamConfig) -> Result<Self, UpstreamError> {
        let settings = UpstreamSettings::try_from(config)?;
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Ok(Self {
            client,
            settings: ArcSwap::from_pointee(settings),
        })
    }

    /// Swap in new settings; in-progress attempts keep the old ones.
    pub fn apply(&self, config: &UpstreamConfig) -> Result<(), UpstreamError> {
        let settings = UpstreamSettings::try_from(config)?;
        if **self.settings.load() != settings {
            tracing::info!(
                base_url = %settings.base_url,
                timeout_secs = settings.timeout.as_secs(),
                "Upstream settings updated"
            );
            self.settings.store(Arc::new(settings));
        }
        Ok(())
    }

    pub fn settings(&self) -> Arc<UpstreamSettings> {
        self.settings.load_full()
    }

    /// Perform one GET against the upstream.
    pub async fn fetch(&self, request: UpstreamRequest) -> Result<UpstreamResponse, UpstreamError> {
        let settings = self.settings.load_full();
        let uri = build_uri(&settings.base_url, &request.path_and_query)?;
        let outbound = Request::builder()
            .method(Method::GET)
            .uri(uri)
            .header(X_REQUEST_ID, request.request_id.as_str())
            .header(header::USER_AGENT, USER_AGENT)
            .body(Body::empty())
            .map_err(|e| UpstreamError::InvalidUri(e.to_string()))?;

        match tokio::time::timeout(
            settings.timeout,
            self.exchange(outbound, settings.max_response_bytes),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(UpstreamError::Timeout(settings.timeout)),
        }
    }

    async fn exchange(
        &self,
        outbound: Request<Body>,
        max_response_bytes: usize,
    ) -> Result<UpstreamResponse, UpstreamError> {
        let response: hyper::Response<hyper::body::Incoming> = self
            .client
            .request(outbound)
            .await
            .map_err(|e| UpstreamError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        if is_failure_status(status) {
            return Err(UpstreamError::Status(status));
        }

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = to_bytes(Body::new(response.into_body()), max_response_bytes)
            .await
            .map_err(|e| UpstreamError::Body(e.to_string()))?;

        Ok(UpstreamResponse {
            status,
            content_type,
            body,
        })
    }
}

/// Join the base URL and a path, keeping any path prefix on the base.
pub fn build_uri(base_url: &Url, path_and_query: &str) -> Result<Uri, UpstreamError> {
    let base = base_url.as_str().trim_end_matches('/');
    format!("{base}{path_and_query}")
        .parse::<Uri>()
        .map_err(|e| UpstreamError::InvalidUri(e.to_string()))
}

/// The unit of work the proxy queues: one upstream GET.
pub type FetchFn = Box<
    dyn Fn(UpstreamRequest) -> BoxFuture<'static, Result<UpstreamResponse, UpstreamError>>
        + Send
        + Sync,
>;

/// Retry queue guarding the upstream.
pub type UpstreamQueue = RetryQueue<FetchFn, UpstreamRequest>;

/// Wrap `client.fetch` in a retry queue.
pub fn upstream_queue(client: Arc<UpstreamClient>, config: QueueConfig) -> UpstreamQueue {
    let fetch: FetchFn = Box::new(move |request| {
        let client = client.clone();
        Box::pin(async move { client.fetch(request).await })
    });
    wrap("upstream", config, fetch)
}
