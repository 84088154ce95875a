//! The bounded worker pool executing ingestion jobs.
//!
//! [`base`] defines the [`base::Job`] abstraction consumed by the pool;
//! [`pool`] holds the dispatcher and its fixed set of workers. At most
//! `max_workers` jobs run concurrently, submission applies backpressure to the
//! enumerator, and shutdown waits for every worker to exit.

pub mod base;
pub mod pool;

pub use base::{BoxedJob, Job};
pub use pool::BlobWorkerPool;
