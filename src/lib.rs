//! Queue proxy library.
//!
//! The interesting part is [`resilience`], a generic retry queue usable with
//! any async unit of work; the rest is the proxy around it.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod upstream;

pub use config::schema::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use resilience::{wrap, QueueError, RetryQueue, UnitOfWork};
