//! Admission evaluation.
//!
//! Saturation never blocks a call. It only adds a fixed penalty to the next
//! backoff wait, which smooths bursts without capping concurrency outright.

use std::time::Duration;

use crate::config::QueueConfig;
use crate::resilience::state::QueueState;

/// True once the active-call set has reached the configured ceiling.
pub fn is_saturated<A>(state: &QueueState<A>, config: &QueueConfig) -> bool {
    state.active_count() >= config.max_active_calls
}

/// Penalty to add to the next wait for a pending attempt.
pub fn admission_penalty<A>(state: &QueueState<A>, config: &QueueConfig) -> Duration {
    if is_saturated(state, config) {
        config.saturation_penalty()
    } else {
        Duration::ZERO
    }
}
