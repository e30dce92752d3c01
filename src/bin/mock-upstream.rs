//! Unreliable stand-in for the remote service.
//!
//! Serves at most `--max-in-flight` requests at a time and answers the rest
//! with 429, which is exactly the behavior the retry queue exists to absorb.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use axum::{
    extract::{OriginalUri, State},
    http::StatusCode,
    response::IntoResponse,
    Json, Router,
};
use clap::Parser;
use serde_json::json;

#[derive(Parser, Clone)]
#[command(name = "mock-upstream")]
#[command(about = "Throttling mock of the remote service", long_about = None)]
struct Args {
    #[arg(short, long, default_value = "127.0.0.1:4000")]
    bind: SocketAddr,

    /// Concurrent requests served before answering 429
    #[arg(long, default_value_t = 5)]
    max_in_flight: usize,

    #[arg(long, default_value_t = 10)]
    min_latency_ms: u64,

    #[arg(long, default_value_t = 50)]
    max_latency_ms: u64,

    /// Fraction of admitted requests answered with 500
    #[arg(long, default_value_t = 0.0)]
    failure_rate: f64,
}

#[derive(Clone)]
struct MockState {
    args: Args,
    in_flight: Arc<AtomicUsize>,
    served: Arc<AtomicUsize>,
    throttled: Arc<AtomicUsize>,
}

/// Decrements the in-flight count however the handler exits.
struct InFlight(Arc<AtomicUsize>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

async fn handle(State(state): State<MockState>, OriginalUri(uri): OriginalUri) -> impl IntoResponse {
    let current = state.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
    let _guard = InFlight(state.in_flight.clone());

    if current > state.args.max_in_flight {
        let throttled = state.throttled.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::debug!(in_flight = current, throttled, "Throttling request");
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({ "error": "too many requests" })),
        );
    }

    let (low, high) = (
        state.args.min_latency_ms.min(state.args.max_latency_ms),
        state.args.max_latency_ms.max(state.args.min_latency_ms),
    );
    tokio::time::sleep(Duration::from_millis(fastrand::u64(low..=high))).await;

    if fastrand::f64() < state.args.failure_rate {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "random failure" })),
        );
    }

    let served = state.served.fetch_add(1, Ordering::SeqCst) + 1;
    (
        StatusCode::OK,
        Json(json!({ "path": uri.path(), "served": served })),
    )
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mock_upstream=info".into()),
        )
        .init();

    let args = Args::parse();
    let state = MockState {
        args: args.clone(),
        in_flight: Arc::default(),
        served: Arc::default(),
        throttled: Arc::default(),
    };
    let app = Router::new().fallback(handle).with_state(state);

    let listener = tokio::net::TcpListener::bind(args.bind).await?;
    tracing::info!(
        address = %args.bind,
        max_in_flight = args.max_in_flight,
        "Mock upstream listening"
    );
    axum::serve(listener, app).await?;
    Ok(())
}
