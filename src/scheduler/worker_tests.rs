//! Tests for the worker dequeue / re-check / compute loop.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use super::*;
use crate::capability::listener_fn;
use crate::scheduler::EnqueueError;
use crate::owner::{MainLoop, OwnerExecutor};
use crate::shutdown::{ShutdownResult, WorkerLifecycle};

const WAIT: Duration = Duration::from_secs(5);

type Outcomes = Arc<Mutex<Vec<Result<u32, String>>>>;

struct Harness {
    main_loop: MainLoop,
    queue: Arc<RequestQueue<u32>>,
    stats: Arc<DispatchStats>,
    lifecycle: WorkerLifecycle,
    outcomes: Outcomes,
    next_id: u64,
}

impl Harness {
    fn new(capacity: usize) -> Self {
        let main_loop = MainLoop::new();
        let queue = Arc::new(RequestQueue::new(capacity));
        let stats = Arc::new(DispatchStats::new());
        let token = CancellationToken::new();
        let worker = spawn_worker("worker-test", queue.clone(), stats.clone(), token.clone())
            .unwrap();
        Self {
            main_loop,
            queue,
            stats,
            lifecycle: WorkerLifecycle::new(token, worker),
            outcomes: Arc::new(Mutex::new(Vec::new())),
            next_id: 1,
        }
    }

    fn submit<C, P>(&mut self, compute: C, predicate: P)
    where
        C: FnOnce() -> Result<u32, BoxError> + Send + 'static,
        P: FnMut() -> Result<Option<u32>, BoxError> + Send + 'static,
    {
        let owner: Arc<dyn OwnerExecutor> = Arc::new(self.main_loop.handle());
        self.submit_to(owner, compute, predicate);
    }

    fn submit_to<C, P>(&mut self, owner: Arc<dyn OwnerExecutor>, compute: C, predicate: P)
    where
        C: FnOnce() -> Result<u32, BoxError> + Send + 'static,
        P: FnMut() -> Result<Option<u32>, BoxError> + Send + 'static,
    {
        let ok = self.outcomes.clone();
        let err = self.outcomes.clone();
        let request = Request::new(
            self.next_id,
            Box::new(compute),
            Box::new(predicate),
            Box::new(listener_fn(
                move |v: u32| ok.lock().push(Ok(v)),
                move |e: LoadError| err.lock().push(Err(e.to_string())),
            )),
            owner,
        );
        self.next_id += 1;
        self.queue.try_enqueue(request).unwrap();
    }

    fn wait_for_outcomes(&self, n: usize) -> bool {
        let outcomes = self.outcomes.clone();
        self.main_loop.run_until(WAIT, || outcomes.lock().len() >= n)
    }

    fn stop(&self) {
        self.lifecycle.signal();
        assert_eq!(self.lifecycle.await_termination(WAIT), ShutdownResult::Complete);
    }
}

#[test]
fn worker_computes_and_delivers_on_owner() {
    let mut h = Harness::new(4);
    let owner_thread = std::thread::current().id();
    let compute_thread = Arc::new(Mutex::new(None));

    let seen = compute_thread.clone();
    h.submit(
        move || {
            *seen.lock() = Some(std::thread::current().id());
            Ok(7)
        },
        || Ok(None),
    );

    assert!(h.wait_for_outcomes(1));
    assert_eq!(*h.outcomes.lock(), vec![Ok(7)]);
    assert_ne!(*compute_thread.lock(), Some(owner_thread));

    h.stop();
    let stats = h.stats.snapshot();
    assert_eq!(stats.computed, 1);
    assert_eq!(stats.delivered, 1);
}

#[test]
fn recheck_skips_compute_when_value_appeared() {
    let mut h = Harness::new(4);
    let computed = Arc::new(AtomicUsize::new(0));

    // The predicate already reports a value by the time the worker asks.
    let counter = computed.clone();
    h.submit(
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(1)
        },
        || Ok(Some(99)),
    );

    assert!(h.wait_for_outcomes(1));
    assert_eq!(*h.outcomes.lock(), vec![Ok(99)]);
    assert_eq!(computed.load(Ordering::SeqCst), 0);

    h.stop();
    assert_eq!(h.stats.snapshot().coalesced, 1);
}

#[test]
fn recheck_observes_previous_listener_update() {
    let mut h = Harness::new(8);
    let computed = Arc::new(AtomicUsize::new(0));

    // Shared "already loaded" slot, written by listeners on the owner thread.
    let slot: Arc<Mutex<Option<u32>>> = Arc::new(Mutex::new(None));

    for _ in 0..3 {
        let counter = computed.clone();
        let read = slot.clone();
        let write = slot.clone();
        let outcomes = h.outcomes.clone();
        let owner: Arc<dyn OwnerExecutor> = Arc::new(h.main_loop.handle());
        let request = Request::new(
            h.next_id,
            Box::new(move || -> Result<u32, BoxError> {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(42)
            }),
            Box::new(move || -> Result<Option<u32>, BoxError> { Ok(*read.lock()) }),
            Box::new(listener_fn(
                move |v: u32| {
                    *write.lock() = Some(v);
                    outcomes.lock().push(Ok(v));
                },
                |_e: LoadError| {},
            )),
            owner,
        );
        h.next_id += 1;
        h.queue.try_enqueue(request).unwrap();
    }

    assert!(h.wait_for_outcomes(3));
    assert_eq!(*h.outcomes.lock(), vec![Ok(42), Ok(42), Ok(42)]);
    assert_eq!(computed.load(Ordering::SeqCst), 1);

    h.stop();
    let stats = h.stats.snapshot();
    assert_eq!(stats.computed, 1);
    assert_eq!(stats.coalesced, 2);
}

#[test]
fn compute_failure_is_delivered_and_worker_continues() {
    let mut h = Harness::new(4);

    h.submit(|| Err("backend offline".into()), || Ok(None));
    h.submit(|| Ok(5), || Ok(None));

    assert!(h.wait_for_outcomes(2));
    let outcomes = h.outcomes.lock().clone();
    assert!(matches!(&outcomes[0], Err(msg) if msg.contains("backend offline")));
    assert_eq!(outcomes[1], Ok(5));

    h.stop();
    assert_eq!(h.stats.snapshot().compute_failures, 1);
}

#[test]
fn predicate_failure_during_recheck_is_delivered() {
    let mut h = Harness::new(4);
    h.submit(|| Ok(1), || Err("corrupt state".into()));

    assert!(h.wait_for_outcomes(1));
    let outcomes = h.outcomes.lock().clone();
    assert!(matches!(&outcomes[0], Err(msg) if msg.contains("predicate evaluation failed")));

    h.stop();
    assert_eq!(h.stats.snapshot().predicate_failures, 1);
}

#[test]
fn closed_owner_drops_request_and_worker_continues() {
    let mut h = Harness::new(4);

    let gone = MainLoop::new();
    let dead_owner: Arc<dyn OwnerExecutor> = Arc::new(gone.handle());
    drop(gone);

    h.submit_to(dead_owner, || Ok(1), || Ok(None));
    h.submit(|| Ok(2), || Ok(None));

    assert!(h.wait_for_outcomes(1));
    assert_eq!(*h.outcomes.lock(), vec![Ok(2)]);

    h.stop();
    assert_eq!(h.stats.snapshot().undelivered, 1);
}

#[test]
fn shutdown_leaves_queued_request_undelivered() {
    let mut h = Harness::new(4);
    let (started_tx, started_rx) = std::sync::mpsc::channel::<()>();
    let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();

    h.submit(
        move || {
            let _ = started_tx.send(());
            let _ = release_rx.recv();
            Ok(1)
        },
        || Ok(None),
    );
    // Drive the first re-check until compute is running.
    assert!(h.main_loop.run_until(WAIT, || started_rx.try_recv().is_ok()));

    h.submit(|| Ok(2), || Ok(None));
    h.lifecycle.signal();
    release_tx.send(()).unwrap();

    // The in-progress compute still delivers.
    assert!(h.wait_for_outcomes(1));
    assert_eq!(h.lifecycle.await_termination(WAIT), ShutdownResult::Complete);
    h.main_loop.run_for(Duration::from_millis(50));

    assert_eq!(*h.outcomes.lock(), vec![Ok(1)]);
    assert!(h.queue.is_empty());
    assert_eq!(h.stats.snapshot().dropped_on_shutdown, 1);
}

#[test]
fn exited_worker_refuses_late_requests() {
    let mut h = Harness::new(4);
    h.stop();
    assert!(h.queue.is_closed());

    let owner: Arc<dyn OwnerExecutor> = Arc::new(h.main_loop.handle());
    let late = Request::new(
        h.next_id,
        Box::new(|| -> Result<u32, BoxError> { Ok(1) }),
        Box::new(|| -> Result<Option<u32>, BoxError> { Ok(None) }),
        Box::new(listener_fn(|_v: u32| {}, |_e: LoadError| {})),
        owner,
    );
    assert!(matches!(h.queue.try_enqueue(late), Err(EnqueueError::Closed(_))));
    assert!(h.queue.is_empty());
}
