//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Apply CLI overrides → Validate → Logging/metrics
//!     → Config watcher → Server → Bind listener
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Drain connections → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! Queued calls still waiting when the server stops are dropped with the
//! runtime; their callers see `QueueError::Abandoned`.

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
