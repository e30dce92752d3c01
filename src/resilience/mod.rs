//! Resilience subsystem: the admission-controlled retry queue.
//!
//! # Data Flow
//! ```text
//! caller
//!     → queue.rs (register call record, spawn scheduler task)
//!     → scheduler.rs (wait backoff.rs delay + admission.rs penalty)
//!     → executor.rs (run unit of work)
//!         ok  → resolve caller, decay failure count
//!         err → scheduler.rs (retry, or reject with RetriesExhausted)
//! ```
//!
//! # Design Decisions
//! - One `QueueState` per wrapped unit of work, never shared between queues
//! - Saturation adds delay, it never blocks intake
//! - Backoff follows the queue-wide failure count, capped at tier 3 by default
//! - State mutations are short synchronous steps under one mutex

pub mod admission;
pub mod backoff;
pub mod error;
mod executor;
pub mod queue;
mod scheduler;
pub mod state;

pub use error::QueueError;
pub use queue::{wrap, RetryQueue, UnitOfWork};
pub use state::{CallIndex, QueueSnapshot};
