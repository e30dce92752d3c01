//! Backoff scheduling.
//!
//! Each queued call runs as its own task driving this loop:
//!
//! ```text
//! Pending ──wait(backoff + penalty)──▶ Attempting ──ok──▶ Succeeded
//!    ▲                                     │
//!    └──────── retry_count <= cap ◀──err───┤
//!                                          └──err, retry_count > cap──▶ RetriesExhausted
//! ```

use std::sync::Arc;

use crate::observability::metrics;
use crate::resilience::backoff::next_delay;
use crate::resilience::error::QueueError;
use crate::resilience::executor::{self, Attempt};
use crate::resilience::queue::{Resolver, Shared, UnitOfWork};
use crate::resilience::state::{CallIndex, FailureOutcome};

/// Drops the call record if the task is torn down before the call settles.
struct Unsettled<'a, W, A> {
    shared: &'a Shared<W, A>,
    index: CallIndex,
    armed: bool,
}

impl<W, A> Drop for Unsettled<'_, W, A> {
    // Also runs while unwinding from a panicking unit of work.
    fn drop(&mut self) {
        if self.armed {
            self.shared.abandon(self.index);
        }
    }
}

/// Hand the final result to the caller, if it is still listening.
fn settle<T, E>(
    queue: &'static str,
    index: CallIndex,
    resolver: Resolver<T, E>,
    result: QueueError<E>,
) {
    if resolver.send(Err(result)).is_err() {
        tracing::debug!(
            queue,
            call_index = index,
            "Caller went away before the result arrived"
        );
    }
}

/// Drive call `index` until it succeeds or exhausts its retries.
pub(crate) async fn schedule<W, A>(
    shared: Arc<Shared<W, A>>,
    index: CallIndex,
    mut resolver: Resolver<W::Output, W::Error>,
) where
    W: UnitOfWork<A>,
    A: Clone + Send + 'static,
{
    let max_retries = shared.config.max_retries_per_window;
    let mut guard = Unsettled {
        shared: &shared,
        index,
        armed: true,
    };

    loop {
        let delay = shared.with_state(|state| next_delay(state, &shared.config));
        tracing::trace!(
            queue = shared.name,
            call_index = index,
            delay_ms = delay.as_millis() as u64,
            "Attempt scheduled"
        );
        tokio::time::sleep(delay).await;

        let (error, returned) = match executor::attempt(&shared, index, resolver).await {
            Attempt::Resolved => {
                guard.armed = false;
                return;
            }
            Attempt::Vanished { resolver } => {
                tracing::error!(
                    queue = shared.name,
                    call_index = index,
                    "Call record missing, abandoning call"
                );
                settle(shared.name, index, resolver, QueueError::Abandoned);
                return;
            }
            Attempt::Failed { error, resolver } => (error, resolver),
        };
        resolver = returned;

        match shared.with_state(|state| state.record_failure(index, max_retries)) {
            FailureOutcome::Retry { retry_count, failure_count } => {
                metrics::record_failure_count(shared.name, failure_count);
                tracing::warn!(
                    queue = shared.name,
                    call_index = index,
                    retry_count,
                    failure_count,
                    error = %error,
                    "Attempt failed, backing off"
                );
            }
            FailureOutcome::Exhausted { attempts } => {
                metrics::record_exhausted(shared.name);
                tracing::error!(
                    queue = shared.name,
                    call_index = index,
                    attempts,
                    error = %error,
                    "Max retries exceeded"
                );
                guard.armed = false;
                settle(
                    shared.name,
                    index,
                    resolver,
                    QueueError::RetriesExhausted {
                        attempts,
                        last_error: error,
                    },
                );
                return;
            }
            FailureOutcome::Unknown => {
                tracing::error!(
                    queue = shared.name,
                    call_index = index,
                    "Failed call has no record, abandoning call"
                );
                settle(shared.name, index, resolver, QueueError::Abandoned);
                return;
            }
        }
    }
}
