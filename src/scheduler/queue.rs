//! Bounded FIFO of pending load requests.

use std::collections::VecDeque;

use parking_lot::Mutex;
use tokio::sync::Notify;

use super::request::Request;

/// Default number of requests that may wait for the worker.
pub const DEFAULT_QUEUE_CAPACITY: usize = 16;

/// Why a request was handed back by [`RequestQueue::try_enqueue`].
#[derive(Debug)]
pub enum EnqueueError<T> {
    /// `capacity` requests are already waiting.
    Full(Request<T>),
    /// The worker has exited and will never dequeue again.
    Closed(Request<T>),
}

impl<T> EnqueueError<T> {
    pub fn into_request(self) -> Request<T> {
        match self {
            Self::Full(request) | Self::Closed(request) => request,
        }
    }
}

struct State<T> {
    waiting: VecDeque<Request<T>>,
    closed: bool,
}

/// Thread-safe bounded request queue.
///
/// Only requests that have not been dequeued count against capacity; the
/// one the worker is processing has already left the queue.
///
/// Producers never block: a full or closed queue hands the request straight
/// back. The single consumer waits on a [`Notify`] instead of polling.
pub struct RequestQueue<T> {
    state: Mutex<State<T>>,
    capacity: usize,
    /// Wakes the worker when a request is enqueued.
    notify: Notify,
}

impl<T> RequestQueue<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(State {
                waiting: VecDeque::with_capacity(capacity),
                closed: false,
            }),
            capacity,
            notify: Notify::new(),
        }
    }

    /// Append a request. Returns its position, or the request itself when
    /// the queue is full or closed.
    pub fn try_enqueue(&self, request: Request<T>) -> Result<usize, EnqueueError<T>> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(EnqueueError::Closed(request));
        }
        if state.waiting.len() >= self.capacity {
            return Err(EnqueueError::Full(request));
        }
        let position = state.waiting.len();
        state.waiting.push_back(request);
        drop(state);

        self.notify.notify_one();
        Ok(position)
    }

    /// Pop the oldest request, if any.
    pub fn dequeue(&self) -> Option<Request<T>> {
        self.state.lock().waiting.pop_front()
    }

    /// Wait for a request then dequeue it.
    pub async fn wait_and_dequeue(&self) -> Request<T> {
        loop {
            if let Some(request) = self.dequeue() {
                return request;
            }
            self.notify.notified().await;
        }
    }

    /// Refuse further requests and drop every pending one without running
    /// it. Returns how many were dropped.
    pub fn close(&self) -> usize {
        let pending = {
            let mut state = self.state.lock();
            state.closed = true;
            std::mem::take(&mut state.waiting)
        };
        pending.len()
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    pub fn len(&self) -> usize {
        self.state.lock().waiting.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().waiting.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
