use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use inlet_config::shared::SourceConfig;
use metrics::counter;
use tracing::{debug, warn};

use crate::decoding;
use crate::download::BlobDownloader;
use crate::error::IngestResult;
use crate::metrics::{CONTAINER_LABEL, INLET_CONTENT_ERRORS_TOTAL, INLET_RECORDS_DECODED_TOTAL};
use crate::publish::Publisher;
use crate::state::SourceState;
use crate::types::{BlobEvent, BlobMeta, ContentKind};
use crate::workers::base::Job;

/// Ingestion job for one remote blob.
///
/// Downloads the blob, decodes its content, records the blob in the shared
/// source state, and hands the resulting event to the publisher together with
/// the advanced checkpoint. Content problems become published error events;
/// only transport and downstream failures propagate out of
/// [`Job::execute`].
pub struct BlobIngestJob {
    blob: BlobMeta,
    source: Arc<SourceConfig>,
    state: SourceState,
    downloader: Arc<dyn BlobDownloader>,
    publisher: Arc<dyn Publisher>,
    content_kind: ContentKind,
}

impl BlobIngestJob {
    /// Binds a job to one discovered blob.
    ///
    /// The content kind is classified once here, against the configured
    /// allow-list, so execution branches on a closed enum.
    pub fn new(
        blob: BlobMeta,
        source: Arc<SourceConfig>,
        state: SourceState,
        downloader: Arc<dyn BlobDownloader>,
        publisher: Arc<dyn Publisher>,
        allowed_content_types: &[String],
    ) -> Self {
        let content_kind = ContentKind::classify(blob.content_type.as_deref(), allowed_content_types);

        Self {
            blob,
            source,
            state,
            downloader,
            publisher,
            content_kind,
        }
    }

    /// Downloads and decodes the blob into an event.
    ///
    /// Decode failures are demoted to error events so bad records stay
    /// observable without stalling the pipeline.
    async fn build_json_event(&self) -> IngestResult<BlobEvent> {
        let body = self.downloader.download(&self.blob).await?;

        let event = match decoding::decode_objects(&body) {
            Ok(records) => {
                counter!(
                    INLET_RECORDS_DECODED_TOTAL,
                    CONTAINER_LABEL => self.source.container_name.clone()
                )
                .increment(records.len() as u64);

                BlobEvent::publish_data(&self.source, &self.blob, records)
            }
            Err(err) => {
                warn!(blob = %self.blob.name, error = %err, "failed to decode blob content");
                counter!(
                    INLET_CONTENT_ERRORS_TOTAL,
                    CONTAINER_LABEL => self.source.container_name.clone()
                )
                .increment(1);

                BlobEvent::publish_error(&self.source, &self.blob, err.to_string())
            }
        };

        Ok(event)
    }

    fn build_unsupported_event(&self) -> BlobEvent {
        warn!(
            blob = %self.blob.name,
            content_type = self.blob.content_type.as_deref().unwrap_or("<none>"),
            "blob content type is not in the allow-list"
        );
        counter!(
            INLET_CONTENT_ERRORS_TOTAL,
            CONTAINER_LABEL => self.source.container_name.clone()
        )
        .increment(1);

        let reason = match &self.blob.content_type {
            Some(content_type) => {
                format!("content type {content_type} is not in the allow-list")
            }
            None => "blob has no content type".to_owned(),
        };

        BlobEvent::publish_error(&self.source, &self.blob, reason)
    }
}

#[async_trait]
impl Job for BlobIngestJob {
    async fn execute(&self, worker_id: usize) -> IngestResult<()> {
        let event = match self.content_kind {
            ContentKind::Json => self.build_json_event().await?,
            ContentKind::Unsupported => self.build_unsupported_event(),
        };

        // The checkpoint advances whether the blob produced data or an error
        // event: either way the blob has been attempted and must not be
        // revisited on resume.
        self.state
            .save(
                &self.blob.name,
                self.blob.marker.clone(),
                self.blob.last_modified_on,
            )
            .await;

        // The snapshot is taken after the save so the published checkpoint
        // reflects this blob.
        let checkpoint = self.state.checkpoint().await;
        self.publisher.publish(event, checkpoint).await?;

        debug!(worker_id, blob = %self.blob.name, "blob ingested");

        Ok(())
    }

    fn name(&self) -> &str {
        &self.blob.name
    }

    fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.blob.last_modified_on
    }

    fn source(&self) -> &SourceConfig {
        &self.source
    }
}
