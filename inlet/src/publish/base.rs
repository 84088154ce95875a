use async_trait::async_trait;

use crate::error::IngestResult;
use crate::state::Checkpoint;
use crate::types::BlobEvent;

/// Trait for systems that receive ingested events from the engine.
///
/// The checkpoint passed alongside each event is the position recorded for
/// that event's blob; durable publishers persist it so a restarted input can
/// resume from the last delivered position. Delivery is at-least-once: a crash
/// between publish and checkpoint persistence makes the engine re-process
/// blobs on resume.
///
/// A publish failure indicates the downstream pipeline itself is unhealthy and
/// must propagate back through the job, using
/// [`crate::error::ErrorKind::PublishFailed`].
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Delivers one event together with its checkpoint snapshot.
    async fn publish(&self, event: BlobEvent, checkpoint: Checkpoint) -> IngestResult<()>;
}
