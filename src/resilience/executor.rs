//! Attempt execution.

use crate::observability::metrics;
use crate::resilience::queue::{Resolver, Shared, UnitOfWork};
use crate::resilience::state::CallIndex;

/// Result of a single attempt, as seen by the scheduler.
pub(crate) enum Attempt<T, E> {
    /// The caller has been resolved; nothing left to do.
    Resolved,
    /// The unit of work failed. The resolver goes back to the scheduler.
    Failed { error: E, resolver: Resolver<T, E> },
    /// The call record disappeared before the attempt could start.
    Vanished { resolver: Resolver<T, E> },
}

/// Run one attempt of call `index`.
///
/// Success settles the caller's future here. Failure leaves it pending; only
/// the scheduler decides between another try and exhaustion.
pub(crate) async fn attempt<W, A>(
    shared: &Shared<W, A>,
    index: CallIndex,
    resolver: Resolver<W::Output, W::Error>,
) -> Attempt<W::Output, W::Error>
where
    W: UnitOfWork<A>,
    A: Clone + Send + 'static,
{
    let started = shared.with_state(|state| {
        let args = state.begin_attempt(index)?;
        Some((args, state.active_count()))
    });
    let Some((args, active)) = started else {
        return Attempt::Vanished { resolver };
    };
    metrics::record_active_calls(shared.name, active);

    match shared.work.run(args).await {
        Ok(output) => {
            let (completed, active) =
                shared.with_state(|state| (state.complete_success(index), state.active_count()));
            metrics::record_attempt(shared.name, "success");
            metrics::record_active_calls(shared.name, active);

            if let Some(completed) = completed {
                metrics::record_failure_count(shared.name, completed.failure_count);
                metrics::record_call_duration(shared.name, completed.submitted_at.elapsed());
                tracing::debug!(
                    queue = shared.name,
                    call_index = index,
                    retry_count = completed.retry_count,
                    failure_count = completed.failure_count,
                    "Queued call succeeded"
                );
            }

            if resolver.send(Ok(output)).is_err() {
                tracing::debug!(
                    queue = shared.name,
                    call_index = index,
                    "Caller went away before the result arrived"
                );
            }
            Attempt::Resolved
        }
        Err(error) => {
            metrics::record_attempt(shared.name, "failure");
            Attempt::Failed { error, resolver }
        }
    }
}
