//! Single worker loop: dequeue, re-check on the owner context, compute,
//! deliver.
//!
//! The worker owns a dedicated OS thread running a current-thread Tokio
//! runtime. It suspends in two places only: waiting for the next request,
//! and waiting for the owner context to answer a predicate re-check. Both
//! waits race the shutdown token.

use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use tokio::runtime::Runtime;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use super::queue::RequestQueue;
use super::request::Request;
use crate::capability::{check_predicate, run_compute, LoadListener, Predicate};
use crate::error::{BoxError, DispatcherError, LoadError};
use crate::owner::OwnerExecutor;
use crate::shutdown::WorkerHandle;
use crate::telemetry::{self, DispatchStats, RequestSpan, SpanExt};

/// What the worker should do after a request.
enum Flow {
    Continue,
    Stop,
}

/// The owner context could not answer: its executor is closed or it
/// dropped the re-check task without running it.
struct OwnerUnavailable;

/// Build the runtime and spawn the worker thread.
pub(crate) fn spawn_worker<T: Send + 'static>(
    name: &str,
    queue: Arc<RequestQueue<T>>,
    stats: Arc<DispatchStats>,
    shutdown: CancellationToken,
) -> Result<WorkerHandle, DispatcherError> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .map_err(DispatcherError::Runtime)?;
    let (exited_tx, exited) = mpsc::channel::<()>();

    let thread = thread::Builder::new()
        .name(name.to_string())
        .spawn(move || {
            // Disconnects `exited` when this thread returns or unwinds.
            let _exited = exited_tx;
            run(runtime, queue, stats, shutdown);
        })
        .map_err(DispatcherError::Spawn)?;

    Ok(WorkerHandle { thread, exited })
}

fn run<T: Send + 'static>(
    runtime: Runtime,
    queue: Arc<RequestQueue<T>>,
    stats: Arc<DispatchStats>,
    shutdown: CancellationToken,
) {
    tracing::info!(capacity = queue.capacity(), "worker: started");
    runtime.block_on(worker_loop(&queue, &stats, &shutdown));

    let dropped = queue.close();
    if dropped > 0 {
        tracing::debug!(dropped, "worker: dropping requests still queued at shutdown");
        stats.dropped_on_shutdown(dropped as u64);
    }
    telemetry::record_queue_depth(0);
    tracing::info!("worker: stopped");
}

async fn worker_loop<T: Send + 'static>(
    queue: &RequestQueue<T>,
    stats: &DispatchStats,
    shutdown: &CancellationToken,
) {
    loop {
        let request = tokio::select! {
            biased;
            () = shutdown.cancelled() => {
                tracing::info!("worker: shutdown signal received");
                break;
            }
            request = queue.wait_and_dequeue() => request,
        };
        telemetry::record_queue_depth(queue.len());

        let span = RequestSpan::new(request.id);
        let flow = process_request(request, stats, shutdown)
            .instrument(span)
            .await;
        if let Flow::Stop = flow {
            break;
        }
    }
}

async fn process_request<T: Send + 'static>(
    request: Request<T>,
    stats: &DispatchStats,
    shutdown: &CancellationToken,
) -> Flow {
    let span = tracing::Span::current();
    let queue_wait_ms = request.age().as_secs_f64() * 1000.0;
    span.record("queue_wait_ms", queue_wait_ms);
    telemetry::record_queue_wait(queue_wait_ms);

    let Request { id, compute, predicate, listener, owner, .. } = request;

    let recheck = tokio::select! {
        biased;
        () = shutdown.cancelled() => {
            tracing::debug!(request_id = id, "worker: shutdown during owner re-check, request dropped");
            stats.dropped_on_shutdown(1);
            return Flow::Stop;
        }
        recheck = round_trip(owner.as_ref(), predicate) => recheck,
    };

    let outcome = match recheck {
        Err(OwnerUnavailable) => {
            tracing::warn!(request_id = id, "worker: owner executor unavailable, request dropped");
            stats.undelivered();
            telemetry::record_outcome("undelivered");
            return Flow::Continue;
        }
        Ok(Err(e)) => {
            span.record("path", "predicate_failed");
            stats.predicate_failures();
            telemetry::record_outcome("predicate_failed");
            Err(LoadError::PredicateFailed(e))
        }
        Ok(Ok(Some(value))) => {
            span.record("path", "coalesced");
            stats.coalesced();
            telemetry::record_outcome("coalesced");
            Ok(value)
        }
        Ok(Ok(None)) => {
            span.record("path", "computed");
            let start = Instant::now();
            let result = run_compute(compute);
            let compute_ms = start.elapsed().as_secs_f64() * 1000.0;
            span.record("compute_ms", compute_ms);
            telemetry::record_compute_latency(compute_ms);
            match result {
                Ok(value) => {
                    stats.computed();
                    telemetry::record_outcome("computed");
                    Ok(value)
                }
                Err(e) => {
                    stats.compute_failures();
                    telemetry::record_outcome("compute_failed");
                    Err(LoadError::ComputeFailed(e))
                }
            }
        }
    };

    span.record_result(&outcome);
    if deliver(owner.as_ref(), listener, outcome) {
        stats.delivered();
    } else {
        tracing::warn!(request_id = id, "worker: owner executor closed before delivery");
        stats.undelivered();
    }
    Flow::Continue
}

/// Evaluate the predicate on the owner context and wait for the answer.
///
/// The owner side never waits on the worker, so this cannot deadlock as
/// long as the owner keeps running its executor.
async fn round_trip<T: Send + 'static>(
    owner: &dyn OwnerExecutor,
    mut predicate: Box<dyn Predicate<T>>,
) -> Result<Result<Option<T>, BoxError>, OwnerUnavailable> {
    let (tx, rx) = oneshot::channel();
    owner
        .post(Box::new(move || {
            // The worker may have stopped waiting; the answer is then unused.
            let _ = tx.send(check_predicate(predicate.as_mut()));
        }))
        .map_err(|_| OwnerUnavailable)?;
    rx.await.map_err(|_| OwnerUnavailable)
}

/// Post the terminal outcome to the owner context.
fn deliver<T: Send + 'static>(
    owner: &dyn OwnerExecutor,
    listener: Box<dyn LoadListener<T>>,
    outcome: Result<T, LoadError>,
) -> bool {
    owner
        .post(Box::new(move || match outcome {
            Ok(value) => listener.on_success(value),
            Err(error) => listener.on_failure(error),
        }))
        .is_ok()
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
