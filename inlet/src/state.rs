//! Resumable ingestion position tracking.
//!
//! One [`SourceState`] exists per ingestion source and is shared by every
//! worker executing jobs for that source. It guards a single [`Checkpoint`]
//! behind a lock so that concurrent jobs never tear the recorded position.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

/// The most recently processed blob's resumption position.
///
/// Because workers complete out of order, the checkpoint means "a recently
/// processed blob", not "the oldest unprocessed blob": resuming from it is
/// at-least-once with a possible reordering gap.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Identifier of the processed blob.
    pub name: String,
    /// Opaque continuation token handed out by the enumerator, if any.
    pub marker: Option<String>,
    /// Last-modified time of the processed blob, if known.
    pub last_modified_on: Option<DateTime<Utc>>,
}

/// Lock-guarded holder of the current [`Checkpoint`] for one source.
///
/// Cloning is cheap and shares the underlying checkpoint; all mutation goes
/// through [`SourceState::save`] so the three checkpoint fields always change
/// as one atomic unit.
#[derive(Clone, Debug, Default)]
pub struct SourceState {
    inner: Arc<Mutex<Checkpoint>>,
}

impl SourceState {
    /// Creates an empty state with no recorded position.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a state seeded from a persisted checkpoint.
    pub fn with_checkpoint(checkpoint: Checkpoint) -> Self {
        Self {
            inner: Arc::new(Mutex::new(checkpoint)),
        }
    }

    /// Records the position of a processed blob.
    ///
    /// All three fields are overwritten under the lock; no reader ever
    /// observes a partially updated checkpoint. O(1), no I/O.
    pub async fn save(
        &self,
        name: impl Into<String>,
        marker: Option<String>,
        last_modified_on: Option<DateTime<Utc>>,
    ) {
        let mut checkpoint = self.inner.lock().await;
        checkpoint.name = name.into();
        checkpoint.marker = marker;
        checkpoint.last_modified_on = last_modified_on;
    }

    /// Returns a snapshot of the current checkpoint.
    ///
    /// The copy is taken under the same lock used by [`SourceState::save`], so
    /// the returned value can never be mutated mid-read by a concurrent job.
    pub async fn checkpoint(&self) -> Checkpoint {
        self.inner.lock().await.clone()
    }

    /// Replaces the whole checkpoint, used at startup to seed the state from a
    /// persisted position.
    pub async fn set_checkpoint(&self, checkpoint: Checkpoint) {
        *self.inner.lock().await = checkpoint;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[tokio::test]
    async fn save_overwrites_all_fields() {
        let state = SourceState::new();
        let modified = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();

        state
            .save("logs/0001.json", Some("m-1".to_owned()), Some(modified))
            .await;

        let checkpoint = state.checkpoint().await;
        assert_eq!(checkpoint.name, "logs/0001.json");
        assert_eq!(checkpoint.marker.as_deref(), Some("m-1"));
        assert_eq!(checkpoint.last_modified_on, Some(modified));

        state.save("logs/0002.json", None, None).await;

        let checkpoint = state.checkpoint().await;
        assert_eq!(checkpoint.name, "logs/0002.json");
        assert_eq!(checkpoint.marker, None);
        assert_eq!(checkpoint.last_modified_on, None);
    }

    #[tokio::test]
    async fn checkpoint_returns_a_detached_copy() {
        let state = SourceState::new();
        state.save("logs/0001.json", None, None).await;

        let snapshot = state.checkpoint().await;
        state.save("logs/0002.json", None, None).await;

        assert_eq!(snapshot.name, "logs/0001.json");
    }

    #[tokio::test]
    async fn seeding_replaces_the_position() {
        let state = SourceState::new();
        state
            .set_checkpoint(Checkpoint {
                name: "logs/0042.json".to_owned(),
                marker: Some("m-42".to_owned()),
                last_modified_on: None,
            })
            .await;

        assert_eq!(state.checkpoint().await.name, "logs/0042.json");
    }

    #[tokio::test]
    async fn concurrent_saves_never_tear_the_checkpoint() {
        let state = SourceState::new();
        state.save("blob-0", Some("m-0".to_owned()), None).await;

        let mut handles = Vec::new();
        for task in 0..8u32 {
            let state = state.clone();
            handles.push(tokio::spawn(async move {
                for round in 0..200u32 {
                    let id = task * 1000 + round;
                    state
                        .save(format!("blob-{id}"), Some(format!("m-{id}")), None)
                        .await;
                }
            }));
        }

        let reader = {
            let state = state.clone();
            tokio::spawn(async move {
                for _ in 0..500 {
                    let checkpoint = state.checkpoint().await;
                    // Marker and name are written from the same id, so a torn
                    // read would make them disagree.
                    let name_id = checkpoint.name.trim_start_matches("blob-").to_owned();
                    let marker_id = checkpoint
                        .marker
                        .as_deref()
                        .map(|m| m.trim_start_matches("m-").to_owned());
                    assert_eq!(Some(name_id), marker_id);
                    tokio::task::yield_now().await;
                }
            })
        };

        for handle in handles {
            handle.await.unwrap();
        }
        reader.await.unwrap();
    }
}
