//! Request scheduling: the bounded queue and the single worker that
//! drains it.

mod queue;
mod request;
mod worker;

pub use queue::{EnqueueError, RequestQueue, DEFAULT_QUEUE_CAPACITY};
pub use request::Request;
pub(crate) use worker::spawn_worker;
