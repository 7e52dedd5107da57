//! Queued load request.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::capability::{Compute, LoadListener, Predicate};
use crate::owner::OwnerExecutor;

/// One `load()` call waiting for the worker.
///
/// Built on the owner context, consumed by exactly one worker pass.
pub struct Request<T> {
    pub(crate) id: u64,
    pub(crate) compute: Box<dyn Compute<T>>,
    pub(crate) predicate: Box<dyn Predicate<T>>,
    pub(crate) listener: Box<dyn LoadListener<T>>,
    pub(crate) owner: Arc<dyn OwnerExecutor>,
    pub(crate) enqueued_at: Instant,
}

impl<T> std::fmt::Debug for Request<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Request")
            .field("id", &self.id)
            .field("age", &self.age())
            .finish()
    }
}

impl<T> Request<T> {
    pub fn new(
        id: u64,
        compute: Box<dyn Compute<T>>,
        predicate: Box<dyn Predicate<T>>,
        listener: Box<dyn LoadListener<T>>,
        owner: Arc<dyn OwnerExecutor>,
    ) -> Self {
        Self {
            id,
            compute,
            predicate,
            listener,
            owner,
            enqueued_at: Instant::now(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Time since the request was created.
    pub fn age(&self) -> Duration {
        self.enqueued_at.elapsed()
    }

    /// Give the listener back, discarding everything else.
    pub(crate) fn into_listener(self) -> Box<dyn LoadListener<T>> {
        self.listener
    }
}
