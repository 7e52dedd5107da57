//! Predicated Loader
//!
//! Lets many callers on one serial "owner" context ask for the same
//! expensive value without blocking that context and without computing it
//! more than once.
//!
//! # How it works
//!
//! - `load()` first asks the caller's predicate whether the value already
//!   exists. If so the listener is called immediately.
//! - Otherwise the request joins a bounded queue drained by one dedicated
//!   worker thread.
//! - Before computing, the worker asks the owner context to evaluate the
//!   predicate again. A listener that ran for an earlier request has usually
//!   stored the value by then, so later requests are answered without
//!   computing.
//! - Results are always delivered on the owner context.
//!
//! Deduplication is only as good as the caller's predicate: the listener
//! must record the value before or during `on_success`, somewhere the
//! predicate reads on the owner context.
//!
//! # Example
//!
//! ```
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//! use std::time::Duration;
//! use parking_lot::Mutex;
//! use predicated_loader::{listener_fn, BoxError, Dispatcher, LoadError, MainLoop};
//!
//! let main_loop = MainLoop::new();
//! let loader = Dispatcher::<u64>::new(Arc::new(main_loop.handle())).unwrap();
//! let hash: Arc<Mutex<Option<u64>>> = Arc::new(Mutex::new(None));
//! let answered = Arc::new(AtomicUsize::new(0));
//!
//! for _ in 0..3 {
//!     let (read, write, answered) = (hash.clone(), hash.clone(), answered.clone());
//!     loader.load(
//!         || -> Result<u64, BoxError> { Ok(0xfeed) },
//!         move || -> Result<Option<u64>, BoxError> { Ok(*read.lock()) },
//!         listener_fn(
//!             move |v: u64| {
//!                 *write.lock() = Some(v);
//!                 answered.fetch_add(1, Ordering::SeqCst);
//!             },
//!             |_e: LoadError| {},
//!         ),
//!     );
//! }
//!
//! main_loop.run_until(Duration::from_secs(5), || answered.load(Ordering::SeqCst) == 3);
//! assert_eq!(*hash.lock(), Some(0xfeed));
//! assert_eq!(loader.stats().computed, 1);
//!
//! loader.shutdown();
//! loader.await_termination(Duration::from_secs(5));
//! ```

pub mod capability;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod owner;
pub mod scheduler;
pub mod shutdown;
pub mod telemetry;

pub use capability::{listener_fn, Compute, FnListener, LoadListener, Predicate};
pub use config::DispatcherConfig;
pub use dispatcher::Dispatcher;
pub use error::{BoxError, DispatcherError, ExecutorClosed, LoadError, Panicked};
pub use owner::{MainLoop, MainLoopHandle, OwnerExecutor, OwnerTask};
pub use shutdown::{ShutdownResult, ShutdownState};
pub use telemetry::StatsSnapshot;
