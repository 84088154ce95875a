//! Concrete job implementations executed by the worker pool.

pub mod blob;

pub use blob::BlobIngestJob;
