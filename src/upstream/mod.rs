//! Upstream subsystem: the unreliable remote service behind the proxy.
//!
//! # Data Flow
//! ```text
//! handler
//!     → UpstreamQueue (resilience::RetryQueue around client.fetch)
//!     → client.rs (GET base_url + path, deadline, status classification)
//!     → UpstreamResponse | UpstreamError (retried by the queue)
//! ```

pub mod client;
pub mod types;

pub use client::{upstream_queue, UpstreamClient, UpstreamQueue, UpstreamSettings};
pub use types::{UpstreamError, UpstreamRequest, UpstreamResponse};
