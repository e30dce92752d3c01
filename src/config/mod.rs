//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated, immutable)
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → sent to the server, which swaps upstream settings atomically
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal configs
//! - Queue tuning is fixed per queue; only upstream settings reload live

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use schema::{
    ListenerConfig, LogFormat, ObservabilityConfig, ProxyConfig, QueueConfig,
    SecurityConfig, TimeoutConfig, UpstreamConfig,
};
