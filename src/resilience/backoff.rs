//! Capped exponential backoff.
//!
//! The delay grows with the queue-wide failure counter rather than with the
//! attempt number of a single call, so one struggling upstream slows every
//! caller of the same queue.

use std::time::Duration;

use crate::config::QueueConfig;
use crate::resilience::admission::admission_penalty;
use crate::resilience::state::QueueState;

/// Backoff for the given failure count: `unit * 2^min(failures, cap_tier)`.
pub fn backoff_delay(failure_count: u32, config: &QueueConfig) -> Duration {
    let tier = failure_count.min(config.backoff_cap_tier);
    let factor = 2u32.saturating_pow(tier);
    config.backoff_unit().saturating_mul(factor)
}

/// Full wait before the next attempt: backoff plus any admission penalty.
pub fn next_delay<A>(state: &QueueState<A>, config: &QueueConfig) -> Duration {
    backoff_delay(state.failure_count(), config) + admission_penalty(state, config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_tiers() {
        let config = QueueConfig::default();
        let delays: Vec<u128> = (0..6)
            .map(|failures| backoff_delay(failures, &config).as_millis())
            .collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 8, 8]);
    }

    #[test]
    fn test_backoff_monotonic_and_bounded() {
        let config = QueueConfig::default();
        let mut previous = Duration::ZERO;
        for failures in 0..1_000 {
            let delay = backoff_delay(failures, &config);
            assert!(delay >= previous);
            previous = delay;
        }
        assert_eq!(backoff_delay(u32::MAX, &config), Duration::from_millis(8));
    }

    #[test]
    fn test_backoff_scales_with_unit() {
        let config = QueueConfig {
            backoff_unit_ms: 50,
            backoff_cap_tier: 5,
            ..QueueConfig::default()
        };
        assert_eq!(backoff_delay(2, &config), Duration::from_millis(200));
        assert_eq!(backoff_delay(30, &config), Duration::from_millis(1_600));
    }

    #[test]
    fn test_next_delay_upper_bound() {
        let config = QueueConfig::default();
        let mut state = QueueState::new();
        for _ in 0..10 {
            let index = state.register(());
            state.begin_attempt(index);
        }
        let failing = state.register(());
        for _ in 0..20 {
            state.record_failure(failing, 300);
        }

        assert_eq!(next_delay(&state, &config), Duration::from_millis(108));
    }
}
