//! Call record store.
//!
//! One `QueueState` exists per wrapped unit of work. Every method here is a
//! single synchronous step; callers hold the queue mutex for exactly one call
//! and never across an `.await`.

use std::collections::{HashMap, HashSet};
use serde::Serialize;
use tokio::time::Instant;

/// Index assigned to a queued call. Never reused within one queue.
pub type CallIndex = u64;

/// Everything the queue remembers about one outstanding call.
#[derive(Debug, Clone)]
pub struct CallRecord<A> {
    /// Arguments replayed on every attempt.
    pub args: A,
    /// When the facade accepted the call.
    pub submitted_at: Instant,
    /// Failed attempts so far.
    pub retry_count: u32,
}

/// What the scheduler must do after a failed attempt.
#[derive(Debug, PartialEq, Eq)]
pub enum FailureOutcome {
    /// Back off and try again.
    Retry { retry_count: u32, failure_count: u32 },
    /// The retry cap was passed; the record is gone.
    Exhausted { attempts: u32 },
    /// No record for this index.
    Unknown,
}

/// A finished call, handed back on success.
#[derive(Debug)]
pub struct Completed {
    pub retry_count: u32,
    pub submitted_at: Instant,
    pub failure_count: u32,
}

/// Shared per-queue state.
#[derive(Debug)]
pub struct QueueState<A> {
    /// Strictly increasing index allocator.
    next_index: CallIndex,
    /// Calls registered and not yet settled.
    in_flight: usize,
    /// Shared penalty signal driving the backoff tier.
    failure_count: u32,
    /// Indices currently inside an attempt.
    active_calls: HashSet<CallIndex>,
    call_records: HashMap<CallIndex, CallRecord<A>>,
}

impl<A> Default for QueueState<A> {
    fn default() -> Self {
        Self {
            next_index: 0,
            in_flight: 0,
            failure_count: 0,
            active_calls: HashSet::new(),
            call_records: HashMap::new(),
        }
    }
}

impl<A: Clone> QueueState<A> {
    /// Store a fresh record and return its index.
    pub fn register(&mut self, args: A) -> CallIndex {
        let index = self.next_index;
        self.call_records.insert(
            index,
            CallRecord {
                args,
                submitted_at: Instant::now(),
                retry_count: 0,
            },
        );
        self.next_index += 1;
        self.in_flight += 1;
        index
    }

    /// Mark `index` active and hand out a copy of its arguments.
    pub fn begin_attempt(&mut self, index: CallIndex) -> Option<A> {
        let args = self.call_records.get(&index)?.args.clone();
        self.active_calls.insert(index);
        Some(args)
    }
}

impl<A> QueueState<A> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Settle a successful call.
    ///
    /// The failure counter only decays when this call had failed before.
    pub fn complete_success(&mut self, index: CallIndex) -> Option<Completed> {
        self.active_calls.remove(&index);
        let record = self.call_records.remove(&index)?;
        self.in_flight = self.in_flight.saturating_sub(1);
        if record.retry_count > 0 {
            self.failure_count = self.failure_count.saturating_sub(1);
        }
        Some(Completed {
            retry_count: record.retry_count,
            submitted_at: record.submitted_at,
            failure_count: self.failure_count,
        })
    }

    /// Account for a failed attempt of `index`.
    pub fn record_failure(&mut self, index: CallIndex, max_retries: u32) -> FailureOutcome {
        self.active_calls.remove(&index);
        let Some(record) = self.call_records.get_mut(&index) else {
            return FailureOutcome::Unknown;
        };

        self.failure_count = self.failure_count.saturating_add(1);
        record.retry_count += 1;
        let retry_count = record.retry_count;

        if retry_count > max_retries {
            self.call_records.remove(&index);
            self.in_flight = self.in_flight.saturating_sub(1);
            FailureOutcome::Exhausted { attempts: retry_count }
        } else {
            FailureOutcome::Retry {
                retry_count,
                failure_count: self.failure_count,
            }
        }
    }

    /// Drop a record without touching the failure counter.
    pub fn abandon(&mut self, index: CallIndex) {
        self.active_calls.remove(&index);
        if self.call_records.remove(&index).is_some() {
            self.in_flight = self.in_flight.saturating_sub(1);
        }
    }

    pub fn failure_count(&self) -> u32 {
        self.failure_count
    }

    pub fn active_count(&self) -> usize {
        self.active_calls.len()
    }

    pub fn retry_count(&self, index: CallIndex) -> Option<u32> {
        self.call_records.get(&index).map(|r| r.retry_count)
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            next_index: self.next_index,
            in_flight: self.in_flight,
            failure_count: self.failure_count,
            active_calls: self.active_calls.len(),
            tracked_records: self.call_records.len(),
        }
    }
}

/// Point-in-time view of a queue, for status endpoints and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QueueSnapshot {
    pub next_index: CallIndex,
    pub in_flight: usize,
    pub failure_count: u32,
    pub active_calls: usize,
    pub tracked_records: usize,
}
