//! Public entry point: [`Dispatcher`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::capability::{check_predicate, Compute, LoadListener, Predicate};
use crate::config::DispatcherConfig;
use crate::error::{DispatcherError, LoadError};
use crate::owner::OwnerExecutor;
use crate::scheduler::{spawn_worker, EnqueueError, Request, RequestQueue};
use crate::shutdown::{ShutdownResult, ShutdownState, WorkerLifecycle};
use crate::telemetry::{self, DispatchStats, StatsSnapshot};

/// Coalescing background loader bound to one owner context.
///
/// Owns a bounded queue and one worker thread. Call [`shutdown`] when done:
/// a dispatcher dropped without it leaves its worker thread parked until
/// process exit, together with whatever the queued capabilities captured.
///
/// [`shutdown`]: Dispatcher::shutdown
pub struct Dispatcher<T> {
    owner: Arc<dyn OwnerExecutor>,
    queue: Arc<RequestQueue<T>>,
    stats: Arc<DispatchStats>,
    lifecycle: WorkerLifecycle,
    shutdown_timeout: Duration,
    next_id: AtomicU64,
}

impl<T: Send + 'static> Dispatcher<T> {
    /// Start a dispatcher with the default configuration.
    pub fn new(owner: Arc<dyn OwnerExecutor>) -> Result<Self, DispatcherError> {
        Self::with_config(owner, DispatcherConfig::default())
    }

    pub fn with_config(
        owner: Arc<dyn OwnerExecutor>,
        config: DispatcherConfig,
    ) -> Result<Self, DispatcherError> {
        config.validate()?;
        telemetry::init_metrics();

        let queue = Arc::new(RequestQueue::new(config.queue_capacity));
        let stats = Arc::new(DispatchStats::new());
        let token = CancellationToken::new();
        let worker = spawn_worker(&config.worker_name, queue.clone(), stats.clone(), token.clone())?;

        tracing::debug!(
            capacity = config.queue_capacity,
            worker = %config.worker_name,
            "dispatcher: created",
        );
        Ok(Self {
            owner,
            queue,
            stats,
            lifecycle: WorkerLifecycle::new(token, worker),
            shutdown_timeout: config.shutdown_timeout,
            next_id: AtomicU64::new(1),
        })
    }

    /// Request a value. Must be called on the owner context.
    ///
    /// Never blocks. If the predicate already has the value, `listener`
    /// is called before this returns. Failures up to and including enqueue
    /// (predicate error, full queue, shut down) are also reported
    /// synchronously. Everything else arrives later through the owner
    /// executor, exactly once, unless the dispatcher is shut down first.
    pub fn load<C, P, L>(&self, compute: C, mut predicate: P, listener: L)
    where
        C: Compute<T>,
        P: Predicate<T>,
        L: LoadListener<T>,
    {
        debug_assert!(
            self.owner.is_owner_thread(),
            "Dispatcher::load called off the owner context"
        );
        self.stats.submitted();

        match check_predicate(&mut predicate) {
            Ok(Some(value)) => {
                self.stats.served_immediately();
                telemetry::record_outcome("immediate");
                listener.on_success(value);
                return;
            }
            Err(e) => {
                self.reject(&listener, LoadError::PredicateFailed(e));
                return;
            }
            Ok(None) => {}
        }

        if self.lifecycle.is_signalled() {
            self.reject(&listener, LoadError::ShutDown);
            return;
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = Request::new(
            id,
            Box::new(compute),
            Box::new(predicate),
            Box::new(listener),
            self.owner.clone(),
        );

        match self.queue.try_enqueue(request) {
            Ok(position) => {
                self.stats.enqueued();
                telemetry::record_queue_depth(self.queue.len());
                tracing::debug!(request_id = id, position, "dispatcher: request enqueued");
            }
            Err(EnqueueError::Full(rejected)) => {
                let capacity = self.queue.capacity();
                tracing::warn!(request_id = id, capacity, "dispatcher: request queue full");
                let listener = rejected.into_listener();
                self.reject(listener.as_ref(), LoadError::CapacityExceeded { capacity });
            }
            // shutdown() from another thread landed after the check above
            // and the worker has already closed the queue.
            Err(EnqueueError::Closed(rejected)) => {
                let listener = rejected.into_listener();
                self.reject(listener.as_ref(), LoadError::ShutDown);
            }
        }
    }

    fn reject(&self, listener: &dyn LoadListener<T>, error: LoadError) {
        self.stats.rejected();
        telemetry::record_outcome("rejected");
        tracing::debug!(error = %error, "dispatcher: load rejected");
        listener.on_failure(error);
    }
}

impl<T> Dispatcher<T> {
    /// Signal the worker to stop after its current request.
    ///
    /// Queued requests are not drained and their listeners are never
    /// called. A re-check in flight is abandoned; a `compute()` in flight
    /// runs to completion and is delivered. Idempotent; returns immediately.
    pub fn shutdown(&self) {
        if self.lifecycle.signal() {
            tracing::info!(pending = self.queue.len(), "dispatcher: shutdown requested");
        }
    }

    /// Block until the worker thread exits, up to `timeout`.
    ///
    /// The worker only keeps running after [`shutdown`](Self::shutdown)
    /// while a `compute()` is in progress, so calling this on the owner
    /// context is safe.
    pub fn await_termination(&self, timeout: Duration) -> ShutdownResult {
        self.lifecycle.await_termination(timeout)
    }

    /// [`shutdown`](Self::shutdown), then wait up to the configured
    /// `shutdown_timeout` for the worker to exit.
    pub fn shutdown_and_wait(&self) -> ShutdownResult {
        self.shutdown();
        let result = self.lifecycle.await_termination(self.shutdown_timeout);
        if result == ShutdownResult::Timeout {
            tracing::warn!(
                timeout_ms = self.shutdown_timeout.as_millis() as u64,
                "dispatcher: worker still running after shutdown timeout",
            );
        }
        result
    }

    pub fn state(&self) -> ShutdownState {
        self.lifecycle.state()
    }

    pub fn is_shut_down(&self) -> bool {
        self.lifecycle.is_signalled()
    }

    /// Requests waiting for the worker.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }
}

impl<T> std::fmt::Debug for Dispatcher<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("pending", &self.queue.len())
            .field("capacity", &self.queue.capacity())
            .field("state", &self.lifecycle.state())
            .finish()
    }
}
