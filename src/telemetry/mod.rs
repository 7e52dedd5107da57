//! Telemetry: structured logging, request spans, metrics facade and
//! per-dispatcher statistics.

mod logging;
mod metrics;
mod spans;
mod stats;

pub use self::logging::{init_logging, LogConfig, LogError, LogFormat};
pub use self::metrics::{
    init_metrics, record_compute_latency, record_outcome, record_queue_depth, record_queue_wait,
};
pub use self::spans::{RequestSpan, SpanExt};
pub use self::stats::{DispatchStats, StatsSnapshot};
