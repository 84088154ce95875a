//! Ingestion engine for cloud-object-storage telemetry inputs.
//!
//! An external enumerator discovers remote blobs and submits one
//! [`jobs::BlobIngestJob`] per blob to a [`workers::BlobWorkerPool`]. The pool
//! bounds concurrency to a fixed number of workers and applies backpressure to
//! the enumerator; each job downloads its blob, decodes the content through
//! [`decoding`], advances the shared [`state::SourceState`] checkpoint, and
//! hands the resulting event to a [`publish::Publisher`]. Delivery is
//! at-least-once: the checkpoint marks a recently processed blob, not a strict
//! lower bound.

pub mod concurrency;
pub mod decoding;
pub mod download;
pub mod error;
pub mod jobs;
mod macros;
pub mod metrics;
pub mod publish;
pub mod state;
pub mod types;
pub mod workers;
