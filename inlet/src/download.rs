//! Object-download transport boundary.

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::IngestResult;
use crate::types::BlobMeta;

/// Trait for transports that can fetch blob bodies from a remote store.
///
/// Implementations wrap the concrete object-store client (and its credential
/// handling), which is outside the engine's scope. Jobs call
/// [`BlobDownloader::download`] once per blob; stream lifecycle and cleanup
/// are the implementation's responsibility.
///
/// Failures should use [`crate::error::ErrorKind::DownloadFailed`] so the pool
/// logs classify them as transport errors.
#[async_trait]
pub trait BlobDownloader: Send + Sync {
    /// Downloads the full body of the given blob.
    async fn download(&self, blob: &BlobMeta) -> IngestResult<Bytes>;
}
