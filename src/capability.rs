//! Caller-supplied capabilities: what to compute, how to tell it is already
//! done, and who to tell when it finishes.
//!
//! Each concern is its own trait. Closures implement [`Compute`] and
//! [`Predicate`] directly; [`listener_fn`] turns a pair of closures into a
//! [`LoadListener`].

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use crate::error::{BoxError, LoadError, Panicked};

/// The expensive operation. Runs at most once, on the worker thread.
pub trait Compute<T>: Send + 'static {
    fn compute(self: Box<Self>) -> Result<T, BoxError>;
}

impl<T, F> Compute<T> for F
where
    F: FnOnce() -> Result<T, BoxError> + Send + 'static,
{
    fn compute(self: Box<Self>) -> Result<T, BoxError> {
        (*self)()
    }
}

/// Reports whether the value already exists.
///
/// Always evaluated on the owner context. `Ok(None)` means "not computed
/// yet". The state it reads belongs to the caller, and the caller's listener
/// is expected to update it on success; that update is what lets later
/// requests skip the computation.
pub trait Predicate<T>: Send + 'static {
    fn check(&mut self) -> Result<Option<T>, BoxError>;
}

impl<T, F> Predicate<T> for F
where
    F: FnMut() -> Result<Option<T>, BoxError> + Send + 'static,
{
    fn check(&mut self) -> Result<Option<T>, BoxError> {
        self()
    }
}

/// Receives the terminal outcome of one `load()` call, on the owner context.
pub trait LoadListener<T>: Send + 'static {
    fn on_success(&self, value: T);
    fn on_failure(&self, error: LoadError);
}

impl<T, L> LoadListener<T> for Arc<L>
where
    L: LoadListener<T> + Sync + ?Sized,
{
    fn on_success(&self, value: T) {
        (**self).on_success(value)
    }

    fn on_failure(&self, error: LoadError) {
        (**self).on_failure(error)
    }
}

/// Listener assembled from two closures. See [`listener_fn`].
pub struct FnListener<S, F> {
    on_success: S,
    on_failure: F,
}

impl<T, S, F> LoadListener<T> for FnListener<S, F>
where
    S: Fn(T) + Send + 'static,
    F: Fn(LoadError) + Send + 'static,
{
    fn on_success(&self, value: T) {
        (self.on_success)(value)
    }

    fn on_failure(&self, error: LoadError) {
        (self.on_failure)(error)
    }
}

/// Build a [`LoadListener`] from a success and a failure callback.
pub fn listener_fn<T, S, F>(on_success: S, on_failure: F) -> FnListener<S, F>
where
    S: Fn(T) + Send + 'static,
    F: Fn(LoadError) + Send + 'static,
{
    FnListener { on_success, on_failure }
}

/// Evaluate a predicate, turning a panic into an error.
pub(crate) fn check_predicate<T: 'static>(predicate: &mut dyn Predicate<T>) -> Result<Option<T>, BoxError> {
    match catch_unwind(AssertUnwindSafe(|| predicate.check())) {
        Ok(result) => result,
        Err(payload) => Err(Box::new(Panicked::from_payload(&payload))),
    }
}

/// Run a compute, turning a panic into an error.
pub(crate) fn run_compute<T: 'static>(compute: Box<dyn Compute<T>>) -> Result<T, BoxError> {
    match catch_unwind(AssertUnwindSafe(move || compute.compute())) {
        Ok(result) => result,
        Err(payload) => Err(Box::new(Panicked::from_payload(&payload))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn closure_predicate_reads_captured_state() {
        let state = Arc::new(Mutex::new(None::<u32>));
        let seen = state.clone();
        let mut predicate = move || -> Result<Option<u32>, BoxError> { Ok(*seen.lock()) };

        assert_eq!(check_predicate::<u32>(&mut predicate).unwrap(), None);
        *state.lock() = Some(9);
        assert_eq!(check_predicate::<u32>(&mut predicate).unwrap(), Some(9));
    }

    #[test]
    fn panicking_compute_becomes_error() {
        let compute: Box<dyn Compute<u32>> =
            Box::new(|| -> Result<u32, BoxError> { panic!("exploded") });
        let err = run_compute(compute).unwrap_err();
        let panicked = err.downcast_ref::<Panicked>().unwrap();
        assert_eq!(panicked.message, "exploded");
    }

    #[test]
    fn panicking_predicate_becomes_error() {
        let mut predicate = || -> Result<Option<u32>, BoxError> { panic!("bad state") };
        let err = check_predicate::<u32>(&mut predicate).unwrap_err();
        assert!(err.to_string().contains("bad state"));
    }

    #[test]
    fn shared_listener_through_arc() {
        let hits = Arc::new(Mutex::new(Vec::new()));
        let sink = hits.clone();
        let listener = Arc::new(listener_fn(
            move |v: u32| sink.lock().push(v),
            |_e: LoadError| {},
        ));

        LoadListener::<u32>::on_success(&*listener, 1);
        LoadListener::<u32>::on_success(&listener.clone(), 2);
        assert_eq!(*hits.lock(), vec![1, 2]);
    }
}
