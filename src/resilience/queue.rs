//! Queue facade.
//!
//! `wrap` turns any asynchronous unit of work into a [`RetryQueue`] whose
//! `call` is awaited exactly like the original function. All calls made
//! through one queue share a single [`QueueState`].

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::runtime::Handle;
use tokio::sync::oneshot;

use crate::config::QueueConfig;
use crate::resilience::error::QueueError;
use crate::resilience::scheduler;
use crate::resilience::state::{CallIndex, QueueSnapshot, QueueState};

/// Settles the caller's future exactly once.
pub(crate) type Resolver<T, E> = oneshot::Sender<Result<T, QueueError<E>>>;

/// An asynchronous operation the queue can protect.
///
/// Implemented for every `Fn(A) -> impl Future<Output = Result<T, E>>`, so
/// plain async closures can be wrapped directly.
pub trait UnitOfWork<A>: Send + Sync + 'static {
    type Output: Send + 'static;
    type Error: fmt::Display + Send + 'static;
    type Future: Future<Output = Result<Self::Output, Self::Error>> + Send + 'static;

    fn run(&self, args: A) -> Self::Future;
}

impl<F, Fut, A, T, E> UnitOfWork<A> for F
where
    F: Fn(A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: fmt::Display + Send + 'static,
{
    type Output = T;
    type Error = E;
    type Future = Fut;

    fn run(&self, args: A) -> Fut {
        self(args)
    }
}

/// State shared by the facade and every call task of one queue.
pub(crate) struct Shared<W, A> {
    pub(crate) name: &'static str,
    pub(crate) config: QueueConfig,
    pub(crate) work: W,
    state: Mutex<QueueState<A>>,
}

impl<W, A> Shared<W, A> {
    /// Run one synchronous step against the queue state.
    pub(crate) fn with_state<R>(&self, step: impl FnOnce(&mut QueueState<A>) -> R) -> R {
        let mut state = self.state.lock().expect("queue state mutex poisoned");
        step(&mut state)
    }

    /// Forget call `index`. Safe to call from `Drop`, even while unwinding.
    pub(crate) fn abandon(&self, index: CallIndex) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.abandon(index);
    }
}

/// A unit of work wrapped with admission control, backoff and retries.
///
/// Cloning is cheap; clones share the same queue state.
pub struct RetryQueue<W, A> {
    shared: Arc<Shared<W, A>>,
}

impl<W, A> Clone for RetryQueue<W, A> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

/// Wrap `work` in a fresh queue.
pub fn wrap<W, A>(name: &'static str, config: QueueConfig, work: W) -> RetryQueue<W, A>
where
    W: UnitOfWork<A>,
    A: Clone + Send + 'static,
{
    RetryQueue::new(name, config, work)
}

impl<W, A> RetryQueue<W, A>
where
    W: UnitOfWork<A>,
    A: Clone + Send + 'static,
{
    pub fn new(name: &'static str, config: QueueConfig, work: W) -> Self {
        tracing::debug!(
            queue = name,
            max_active_calls = config.max_active_calls,
            max_retries = config.max_retries_per_window,
            "Retry queue created"
        );
        Self {
            shared: Arc::new(Shared {
                name,
                config,
                work,
                state: Mutex::new(QueueState::new()),
            }),
        }
    }

    /// Queue a call.
    ///
    /// The call is registered and its scheduler started before this returns,
    /// so it runs to completion even if the returned future is never polled.
    pub fn call(
        &self,
        args: A,
    ) -> impl Future<Output = Result<W::Output, QueueError<W::Error>>> + Send + 'static {
        let admitted = self.admit(args);
        async move {
            admitted?.await.unwrap_or(Err(QueueError::Abandoned))
        }
    }

    fn admit(
        &self,
        args: A,
    ) -> Result<oneshot::Receiver<Result<W::Output, QueueError<W::Error>>>, QueueError<W::Error>>
    {
        let runtime = Handle::try_current().map_err(|e| {
            tracing::error!(queue = self.shared.name, error = %e, "Admission failed");
            QueueError::Admission(e.to_string())
        })?;

        let index = self.shared.with_state(|state| state.register(args));
        let (resolver, settled) = oneshot::channel();
        tracing::trace!(queue = self.shared.name, call_index = index, "Call admitted");

        runtime.spawn(scheduler::schedule(self.shared.clone(), index, resolver));
        Ok(settled)
    }
}

impl<W, A> RetryQueue<W, A> {
    pub fn name(&self) -> &'static str {
        self.shared.name
    }

    pub fn config(&self) -> &QueueConfig {
        &self.shared.config
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        self.shared.with_state(|state| state.snapshot())
    }
}
