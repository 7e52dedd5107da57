//! `metrics` facade recording. A no-op unless the host installs a recorder.

use std::sync::Once;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};

const REQUESTS_TOTAL: &str = "predicated_loader_requests_total";
const QUEUE_DEPTH: &str = "predicated_loader_queue_depth";
const COMPUTE_MS: &str = "predicated_loader_compute_ms";
const QUEUE_WAIT_MS: &str = "predicated_loader_queue_wait_ms";

static DESCRIBE: Once = Once::new();

/// Register metric descriptions with the installed recorder. Idempotent.
pub fn init_metrics() {
    DESCRIBE.call_once(|| {
        describe_counter!(REQUESTS_TOTAL, Unit::Count, "Load requests by terminal outcome");
        describe_gauge!(QUEUE_DEPTH, Unit::Count, "Requests waiting for the worker");
        describe_histogram!(COMPUTE_MS, Unit::Milliseconds, "Time spent inside compute()");
        describe_histogram!(QUEUE_WAIT_MS, Unit::Milliseconds, "Time between load() and dequeue");
    });
}

/// Count one request outcome (`immediate`, `rejected`, `coalesced`, ...).
pub fn record_outcome(outcome: &'static str) {
    counter!(REQUESTS_TOTAL, "outcome" => outcome).increment(1);
}

pub fn record_queue_depth(depth: usize) {
    gauge!(QUEUE_DEPTH).set(depth as f64);
}

pub fn record_compute_latency(ms: f64) {
    histogram!(COMPUTE_MS).record(ms);
}

pub fn record_queue_wait(ms: f64) {
    histogram!(QUEUE_WAIT_MS).record(ms);
}
