//! Per-dispatcher outcome counters.
//!
//! Complements the `metrics` facade: these values belong to one
//! [`Dispatcher`](crate::Dispatcher) and can be read back without a recorder.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Counters a dispatcher and its worker update as requests move through.
#[derive(Debug, Default)]
pub struct DispatchStats {
    submitted: AtomicU64,
    served_immediately: AtomicU64,
    rejected: AtomicU64,
    enqueued: AtomicU64,
    coalesced: AtomicU64,
    computed: AtomicU64,
    compute_failures: AtomicU64,
    predicate_failures: AtomicU64,
    delivered: AtomicU64,
    undelivered: AtomicU64,
    dropped_on_shutdown: AtomicU64,
}

/// Point-in-time copy of [`DispatchStats`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    /// `load()` calls.
    pub submitted: u64,
    /// Answered by the predicate inside `load()`.
    pub served_immediately: u64,
    /// Failed synchronously: queue full, shut down, or predicate error.
    pub rejected: u64,
    pub enqueued: u64,
    /// Answered by the worker's re-check without computing.
    pub coalesced: u64,
    /// `compute()` calls that returned a value.
    pub computed: u64,
    pub compute_failures: u64,
    /// Predicate errors seen by the worker's re-check.
    pub predicate_failures: u64,
    /// Outcomes posted to the owner executor.
    pub delivered: u64,
    /// Outcomes lost because the owner executor was closed.
    pub undelivered: u64,
    /// Requests abandoned because the worker stopped.
    pub dropped_on_shutdown: u64,
}

macro_rules! bump {
    ($($name:ident),* $(,)?) => {
        $(
            pub(crate) fn $name(&self) {
                self.$name.fetch_add(1, Ordering::Relaxed);
            }
        )*
    };
}

impl DispatchStats {
    pub fn new() -> Self {
        Self::default()
    }

    bump!(
        submitted,
        served_immediately,
        rejected,
        enqueued,
        coalesced,
        computed,
        compute_failures,
        predicate_failures,
        delivered,
        undelivered,
    );

    pub(crate) fn dropped_on_shutdown(&self, count: u64) {
        self.dropped_on_shutdown.fetch_add(count, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            submitted: self.submitted.load(Ordering::Relaxed),
            served_immediately: self.served_immediately.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            enqueued: self.enqueued.load(Ordering::Relaxed),
            coalesced: self.coalesced.load(Ordering::Relaxed),
            computed: self.computed.load(Ordering::Relaxed),
            compute_failures: self.compute_failures.load(Ordering::Relaxed),
            predicate_failures: self.predicate_failures.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            undelivered: self.undelivered.load(Ordering::Relaxed),
            dropped_on_shutdown: self.dropped_on_shutdown.load(Ordering::Relaxed),
        }
    }
}

impl StatsSnapshot {
    /// Requests that reached a listener or were lost, i.e. left the system.
    pub fn settled(&self) -> u64 {
        self.served_immediately + self.rejected + self.delivered + self.undelivered + self.dropped_on_shutdown
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}
