use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::info;

use crate::error::IngestResult;
use crate::publish::base::Publisher;
use crate::state::Checkpoint;
use crate::types::BlobEvent;

/// In-memory publisher for testing and development purposes.
///
/// [`MemoryPublisher`] stores all published events with their checkpoints so a
/// test can inspect exactly what the engine delivered and in which order. All
/// data is lost when the process terminates.
#[derive(Clone, Debug, Default)]
pub struct MemoryPublisher {
    inner: Arc<Mutex<Vec<(BlobEvent, Checkpoint)>>>,
}

impl MemoryPublisher {
    /// Creates a new empty memory publisher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of everything published so far, in delivery order.
    pub async fn published(&self) -> Vec<(BlobEvent, Checkpoint)> {
        self.inner.lock().await.clone()
    }

    /// Number of events published so far.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    /// Whether nothing has been published yet.
    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.is_empty()
    }
}

#[async_trait]
impl Publisher for MemoryPublisher {
    async fn publish(&self, event: BlobEvent, checkpoint: Checkpoint) -> IngestResult<()> {
        info!(
            blob = %event.blob_name,
            kind = ?event.kind,
            records = event.message_count(),
            "storing published event in memory"
        );

        self.inner.lock().await.push((event, checkpoint));

        Ok(())
    }
}
