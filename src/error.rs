//! Error types for the predicated loader.
//!
//! Everything a caller can observe about a failed `load()` arrives as a
//! [`LoadError`] through the listener. Construction failures surface as
//! [`DispatcherError`].

use std::any::Any;

use thiserror::Error;

/// Boxed error returned by compute and predicate capabilities.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Terminal failure delivered to a [`LoadListener`](crate::LoadListener).
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("request queue full ({capacity} requests)")]
    CapacityExceeded { capacity: usize },

    #[error("predicate evaluation failed: {0}")]
    PredicateFailed(#[source] BoxError),

    #[error("compute failed: {0}")]
    ComputeFailed(#[source] BoxError),

    #[error("dispatcher has been shut down")]
    ShutDown,
}

impl LoadError {
    /// Returns true if the request never left the owner context.
    pub fn is_synchronous(&self) -> bool {
        matches!(self, Self::CapacityExceeded { .. } | Self::ShutDown)
    }

    /// The caller-supplied error carried by this failure, if any.
    pub fn inner(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        match self {
            Self::PredicateFailed(e) | Self::ComputeFailed(e) => Some(e.as_ref()),
            Self::CapacityExceeded { .. } | Self::ShutDown => None,
        }
    }
}

/// A compute or predicate panicked instead of returning.
#[derive(Debug, Error)]
#[error("panicked: {message}")]
pub struct Panicked {
    pub message: String,
}

impl Panicked {
    pub(crate) fn from_payload(payload: &Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic".to_string()
        };
        Self { message }
    }
}

/// Errors raised while constructing a [`Dispatcher`](crate::Dispatcher).
#[derive(Debug, Error)]
pub enum DispatcherError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to build worker runtime: {0}")]
    Runtime(#[source] std::io::Error),

    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[source] std::io::Error),
}

/// The owner executor no longer accepts tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("owner executor is closed")]
pub struct ExecutorClosed;
