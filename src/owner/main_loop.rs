//! A minimal serial task loop for hosts without their own event loop.
//!
//! The thread that creates a [`MainLoop`] is its owner context; posted
//! tasks run only while that thread drives the loop.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use super::{OwnerExecutor, OwnerTask};
use crate::error::ExecutorClosed;

/// Serial executor driven by the thread that owns it.
pub struct MainLoop {
    tx: Sender<OwnerTask>,
    rx: Receiver<OwnerTask>,
    owner: ThreadId,
}

/// Cloneable posting side of a [`MainLoop`].
#[derive(Clone)]
pub struct MainLoopHandle {
    tx: Sender<OwnerTask>,
    owner: ThreadId,
}

impl MainLoop {
    /// Create a loop owned by the current thread.
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        Self { tx, rx, owner: thread::current().id() }
    }

    pub fn handle(&self) -> MainLoopHandle {
        MainLoopHandle { tx: self.tx.clone(), owner: self.owner }
    }

    /// Run every task already posted, without waiting. Returns the count run.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        loop {
            match self.rx.try_recv() {
                Ok(task) => {
                    task();
                    ran += 1;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => return ran,
            }
        }
    }

    /// Run tasks until `done` returns true or `timeout` elapses.
    ///
    /// `done` is checked before waiting and after every task. Returns
    /// whether the condition was met.
    pub fn run_until<F>(&self, timeout: Duration, mut done: F) -> bool
    where
        F: FnMut() -> bool,
    {
        let deadline = Instant::now() + timeout;
        loop {
            if done() {
                return true;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            match self.rx.recv_timeout(remaining) {
                Ok(task) => task(),
                Err(RecvTimeoutError::Timeout) => return done(),
                Err(RecvTimeoutError::Disconnected) => return done(),
            }
        }
    }

    /// Keep running tasks for `duration`. Returns the count run.
    pub fn run_for(&self, duration: Duration) -> usize {
        let deadline = Instant::now() + duration;
        let mut ran = 0;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return ran;
            }
            match self.rx.recv_timeout(remaining) {
                Ok(task) => {
                    task();
                    ran += 1;
                }
                Err(_) => return ran,
            }
        }
    }
}

impl Default for MainLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl OwnerExecutor for MainLoopHandle {
    fn post(&self, task: OwnerTask) -> Result<(), ExecutorClosed> {
        self.tx.send(task).map_err(|_| ExecutorClosed)
    }

    fn is_owner_thread(&self) -> bool {
        thread::current().id() == self.owner
    }
}

impl std::fmt::Debug for MainLoopHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MainLoopHandle").field("owner", &self.owner).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[test]
    fn tasks_run_in_post_order() {
        let main_loop = MainLoop::new();
        let handle = main_loop.handle();
        let order = Arc::new(Mutex::new(Vec::new()));

        for i in 0..5 {
            let order = order.clone();
            handle.post(Box::new(move || order.lock().push(i))).unwrap();
        }

        assert_eq!(main_loop.run_pending(), 5);
        assert_eq!(*order.lock(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn posts_from_other_threads_run_on_owner() {
        let main_loop = MainLoop::new();
        let handle = main_loop.handle();
        let ran_on = Arc::new(Mutex::new(None));

        let sink = ran_on.clone();
        let poster = thread::spawn(move || {
            assert!(!handle.is_owner_thread());
            handle
                .post(Box::new(move || *sink.lock() = Some(thread::current().id())))
                .unwrap();
        });
        poster.join().unwrap();

        assert!(main_loop.run_until(Duration::from_secs(2), || ran_on.lock().is_some()));
        assert_eq!(*ran_on.lock(), Some(thread::current().id()));
    }

    #[test]
    fn run_until_times_out() {
        let main_loop = MainLoop::new();
        let start = Instant::now();
        assert!(!main_loop.run_until(Duration::from_millis(20), || false));
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn post_fails_after_loop_dropped() {
        let main_loop = MainLoop::new();
        let handle = main_loop.handle();
        assert!(handle.is_owner_thread());
        drop(main_loop);
        assert_eq!(handle.post(Box::new(|| {})), Err(ExecutorClosed));
    }
}
