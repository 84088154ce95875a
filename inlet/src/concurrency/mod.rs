//! Concurrency primitives for coordinating the ingestion engine.
//!
//! The pool, its workers, and external callers coordinate through a small set
//! of message-passing primitives. The [`shutdown`] module implements a
//! broadcast shutdown pattern: a single signal terminates the dispatcher and
//! every worker, and workers complete their in-flight job before exiting.

pub mod shutdown;
