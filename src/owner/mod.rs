//! The owner context: the single serial executor that `load()` is called
//! from and that every listener delivery runs on.
//!
//! The worker never touches caller state directly. It posts tasks here and,
//! for the predicate re-check, waits for the posted task to answer.

mod main_loop;

pub use main_loop::{MainLoop, MainLoopHandle};

use crate::error::ExecutorClosed;

/// Unit of work posted to the owner context.
pub type OwnerTask = Box<dyn FnOnce() + Send + 'static>;

/// A serial task channel owned by some other part of the application
/// (a UI dispatcher, an event loop, a test harness).
///
/// Implementations must run posted tasks one at a time, in post order, on a
/// single thread. `post` must not block and must not run the task inline.
pub trait OwnerExecutor: Send + Sync + 'static {
    fn post(&self, task: OwnerTask) -> Result<(), ExecutorClosed>;

    /// Whether the calling thread is the one that runs posted tasks.
    ///
    /// Used only for debug assertions; executors that cannot tell may keep
    /// the default.
    fn is_owner_thread(&self) -> bool {
        true
    }
}
