//! Worker lifecycle: stop signal, state, and await-termination.
//!
//! Stopping is cooperative. The worker checks the token before taking each
//! request and while waiting on the owner context; a `compute()` that is
//! already running is allowed to finish.

use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

/// Lifecycle state of a dispatcher's worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownState {
    Running,
    /// Stop requested; the worker thread has not exited yet.
    Stopping,
    Stopped,
}

/// Result of waiting for the worker to exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownResult {
    Complete,
    Timeout,
}

/// Owned handle to the worker thread.
///
/// `exited` disconnects when the thread's end of the channel is dropped,
/// which happens as the thread returns (or unwinds).
pub(crate) struct WorkerHandle {
    pub(crate) thread: JoinHandle<()>,
    pub(crate) exited: Receiver<()>,
}

/// Stop signal plus the worker it controls.
///
/// The join handle and the exit receiver sit behind separate locks so
/// [`state`](Self::state) never waits behind a blocked
/// [`await_termination`](Self::await_termination).
pub(crate) struct WorkerLifecycle {
    token: CancellationToken,
    thread: Mutex<Option<JoinHandle<()>>>,
    exited: Mutex<Receiver<()>>,
}

impl WorkerLifecycle {
    pub(crate) fn new(token: CancellationToken, worker: WorkerHandle) -> Self {
        Self {
            token,
            thread: Mutex::new(Some(worker.thread)),
            exited: Mutex::new(worker.exited),
        }
    }

    /// Request a stop. Returns true on the first call only.
    pub(crate) fn signal(&self) -> bool {
        if self.token.is_cancelled() {
            return false;
        }
        self.token.cancel();
        true
    }

    pub(crate) fn is_signalled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub(crate) fn state(&self) -> ShutdownState {
        let finished = match self.thread.lock().as_ref() {
            Some(thread) => thread.is_finished(),
            None => true,
        };
        match (self.token.is_cancelled(), finished) {
            (_, true) => ShutdownState::Stopped,
            (false, false) => ShutdownState::Running,
            (true, false) => ShutdownState::Stopping,
        }
    }

    /// Block until the worker thread exits or `timeout` elapses.
    ///
    /// Joins the thread once it has exited; later calls return `Complete`
    /// immediately.
    pub(crate) fn await_termination(&self, timeout: Duration) -> ShutdownResult {
        if self.thread.lock().is_none() {
            return ShutdownResult::Complete;
        }

        match self.exited.lock().recv_timeout(timeout) {
            Err(RecvTimeoutError::Timeout) => return ShutdownResult::Timeout,
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {}
        }

        let thread = self.thread.lock().take();
        if let Some(thread) = thread {
            if thread.join().is_err() {
                tracing::error!("worker thread panicked");
            }
        }
        ShutdownResult::Complete
    }
}
