//! Span helpers for request processing.

use tracing::{info_span, Span};

/// Extension trait for recording outcomes on a span.
pub trait SpanExt {
    /// Record `status` and, on error, `error.message`.
    fn record_result<T, E>(&self, result: &Result<T, E>)
    where
        E: std::fmt::Display;
}

impl SpanExt for Span {
    fn record_result<T, E>(&self, result: &Result<T, E>)
    where
        E: std::fmt::Display,
    {
        match result {
            Ok(_) => {
                self.record("status", "ok");
            }
            Err(e) => {
                self.record("status", "error");
                self.record("error.message", e.to_string().as_str());
            }
        }
    }
}

/// Factory for the per-request worker span.
pub struct RequestSpan;

impl RequestSpan {
    /// Span covering one worker pass over a request.
    ///
    /// `status`, `error.message`, `path`, `queue_wait_ms` and `compute_ms`
    /// start empty and are filled in as the request progresses.
    pub fn new(request_id: u64) -> Span {
        info_span!(
            "load_request",
            request_id = request_id,
            status = tracing::field::Empty,
            error.message = tracing::field::Empty,
            path = tracing::field::Empty,
            queue_wait_ms = tracing::field::Empty,
            compute_ms = tracing::field::Empty,
        )
    }
}
