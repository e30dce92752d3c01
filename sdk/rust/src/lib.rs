//! Rust client for the queue proxy.

pub mod client;

pub use client::{ClientError, FetchResponse, HealthStatus, ProxyClient, QueueStatus};
