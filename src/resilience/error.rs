//! Errors a queued call can settle with.

use thiserror::Error;

/// Terminal failure of a queued call.
///
/// Transient unit-of-work errors never show up here; they are retried
/// inside the queue until the call succeeds or exhausts its retries.
#[derive(Debug, Error)]
pub enum QueueError<E> {
    /// The call failed more often than the retry cap allows.
    #[error("max retries exceeded after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: E },

    /// The call could not be registered with the queue.
    #[error("call rejected at admission: {0}")]
    Admission(String),

    /// The queue dropped the call before settling it (e.g. runtime shutdown).
    #[error("queued call was abandoned before it settled")]
    Abandoned,
}

impl<E> QueueError<E> {
    /// Attempts made before giving up, if the call was exhausted.
    pub fn attempts(&self) -> Option<u32> {
        match self {
            QueueError::RetriesExhausted { attempts, .. } => Some(*attempts),
            _ => None,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self, QueueError::RetriesExhausted { .. })
    }
}
