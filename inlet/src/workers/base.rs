use async_trait::async_trait;
use chrono::{DateTime, Utc};
use inlet_config::shared::SourceConfig;

use crate::error::IngestResult;

/// Trait for units of ingestion work executed by the pool.
///
/// A job is bound to exactly one remote blob, consumed exactly once by a
/// single worker, and then discarded. Implementations own the whole ingestion
/// sequence for their blob: download, decode, checkpoint, publish.
///
/// Errors returned from [`Job::execute`] indicate an indeterminate outcome
/// (transport or downstream failure) and surface on the pool's error channel;
/// recoverable content problems should instead be converted into published
/// error events inside the job.
#[async_trait]
pub trait Job: Send + Sync {
    /// Executes the job on the given worker.
    async fn execute(&self, worker_id: usize) -> IngestResult<()>;

    /// Name of the blob this job ingests.
    fn name(&self) -> &str;

    /// Last-modified time of the blob, used by enumerators to order
    /// submission.
    fn timestamp(&self) -> Option<DateTime<Utc>>;

    /// The source this job belongs to.
    fn source(&self) -> &SourceConfig;
}

/// Owned job as it travels through the pool's channels.
pub type BoxedJob = Box<dyn Job>;
