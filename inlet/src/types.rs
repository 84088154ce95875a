//! Core data types exchanged between jobs, the pool, and publishers.

use chrono::{DateTime, Utc};
use inlet_config::shared::SourceConfig;
use serde::Serialize;

use crate::decoding::DecodedObject;

/// Metadata of one discovered remote blob, as reported by the enumerator.
#[derive(Clone, Debug, PartialEq)]
pub struct BlobMeta {
    /// Full name (path) of the blob inside its container.
    pub name: String,
    /// Declared content type, if the store reported one.
    pub content_type: Option<String>,
    /// Last-modified time, if the store reported one.
    pub last_modified_on: Option<DateTime<Utc>>,
    /// Continuation token of the listing page the blob was discovered on.
    pub marker: Option<String>,
}

/// Closed classification of a blob's content type.
///
/// Selected once per job from the declared content type and the configured
/// allow-list, then matched exhaustively by the job body.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContentKind {
    /// A JSON media type from the allow-list; the body will be decoded.
    Json,
    /// Anything else; the job publishes an error event instead of parsing.
    Unsupported,
}

impl ContentKind {
    /// Classifies a declared content type against the allow-list.
    ///
    /// The allow-list holds JSON media types only, so membership implies
    /// [`ContentKind::Json`]. Media type parameters (`; charset=...`) are
    /// ignored for the comparison.
    pub fn classify(content_type: Option<&str>, allowed: &[String]) -> ContentKind {
        let Some(content_type) = content_type else {
            return ContentKind::Unsupported;
        };

        let media_type = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim();

        if allowed
            .iter()
            .any(|accepted| accepted.eq_ignore_ascii_case(media_type))
        {
            ContentKind::Json
        } else {
            ContentKind::Unsupported
        }
    }
}

/// Kind of an event handed to the publisher.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// The blob was downloaded and decoded; the event carries its records.
    PublishData,
    /// The blob could not be parsed; the event carries the reason.
    PublishError,
}

/// One event produced by a job, describing the outcome of ingesting one blob.
#[derive(Clone, Debug)]
pub struct BlobEvent {
    /// Whether this event carries data or an error description.
    pub kind: EventKind,
    /// Storage account the blob was read from.
    pub account: String,
    /// Container the blob was read from.
    pub container: String,
    /// Full name of the blob.
    pub blob_name: String,
    /// Declared content type of the blob.
    pub content_type: Option<String>,
    /// Decoded records; empty for error events.
    pub records: Vec<DecodedObject>,
    /// Description of the failure; `None` for data events.
    pub error: Option<String>,
    /// When this event was built.
    pub created_at: DateTime<Utc>,
}

impl BlobEvent {
    /// Builds a data event carrying the blob's decoded records.
    pub fn publish_data(
        source: &SourceConfig,
        blob: &BlobMeta,
        records: Vec<DecodedObject>,
    ) -> Self {
        Self {
            kind: EventKind::PublishData,
            account: source.account_name.clone(),
            container: source.container_name.clone(),
            blob_name: blob.name.clone(),
            content_type: blob.content_type.clone(),
            records,
            error: None,
            created_at: Utc::now(),
        }
    }

    /// Builds an error event carrying a failure description.
    ///
    /// Bad content is still published rather than dropped, so malformed blobs
    /// stay observable downstream.
    pub fn publish_error(
        source: &SourceConfig,
        blob: &BlobMeta,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            kind: EventKind::PublishError,
            account: source.account_name.clone(),
            container: source.container_name.clone(),
            blob_name: blob.name.clone(),
            content_type: blob.content_type.clone(),
            records: Vec::new(),
            error: Some(reason.into()),
            created_at: Utc::now(),
        }
    }

    /// Number of records this event carries.
    pub fn message_count(&self) -> usize {
        self.records.len()
    }
}
