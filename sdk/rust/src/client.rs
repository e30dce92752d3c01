use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Liveness information reported by `/health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
}

/// Snapshot of the proxy's retry queue reported by `/queue/status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueStatus {
    pub queue: String,
    pub next_index: u64,
    pub in_flight: usize,
    pub failure_count: u32,
    pub active_calls: usize,
    pub tracked_records: usize,
    pub max_active_calls: usize,
    pub max_retries_per_window: u32,
    pub upstream: String,
}

/// Upstream response relayed by the proxy.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: StatusCode,
    pub body: String,
}

/// Error body the proxy returns when a queued call fails for good.
#[derive(Debug, Clone, Deserialize)]
pub struct ProxyFailure {
    pub error: String,
    pub request_id: String,
    pub attempts: Option<u32>,
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("proxy gave up after {attempts:?} attempts: {error}")]
    Proxy {
        status: StatusCode,
        error: String,
        attempts: Option<u32>,
    },
}

pub struct ProxyClient {
    client: Client,
    proxy_url: String,
}

impl ProxyClient {
    pub fn new(proxy_url: &str) -> Self {
        Self {
            client: Client::new(),
            proxy_url: proxy_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn health(&self) -> Result<HealthStatus, ClientError> {
        let resp = self
            .client
            .get(format!("{}/health", self.proxy_url))
            .send()
            .await?
            .error_for_status()?;
        Ok(resp.json().await?)
    }

    pub async fn queue_status(&self) -> Result<QueueStatus, ClientError> {
        let resp = self
            .client
            .get(format!("{}/queue/status", self.proxy_url))
            .send()
            .await?
            .error_for_status()?;
        Ok(resp.json().await?)
    }

    /// Fetch an upstream path through the proxy's retry queue.
    ///
    /// Upstream statuses are relayed as-is; only failures produced by the
    /// proxy itself become `ClientError::Proxy`.
    pub async fn fetch(&self, path: &str) -> Result<FetchResponse, ClientError> {
        let resp = self
            .client
            .get(format!(
                "{}/api/v1/upstream/{}",
                self.proxy_url,
                path.trim_start_matches('/')
            ))
            .send()
            .await?;

        let status = resp.status();
        let is_proxy_failure = matches!(
            status,
            StatusCode::SERVICE_UNAVAILABLE | StatusCode::INTERNAL_SERVER_ERROR
        );
        let body = resp.text().await?;

        if is_proxy_failure {
            if let Ok(failure) = serde_json::from_str::<ProxyFailure>(&body) {
                return Err(ClientError::Proxy {
                    status,
                    error: failure.error,
                    attempts: failure.attempts,
                });
            }
        }

        Ok(FetchResponse { status, body })
    }
}
