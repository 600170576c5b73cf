//! Reading progress persisted in the shared key-value store.

use std::collections::HashMap;
use std::sync::Arc;

use course_core::model::progress::PROGRESS_STORAGE_KEY;
use course_core::model::{CourseId, ProgressBlob, ProgressRecord, ScrollMetrics};
use storage::repository::{KeyChange, KeyValueStore};
use tokio::sync::broadcast;

use crate::error::ProgressError;

/// Typed access to the progress blob stored under `PROGRESS_STORAGE_KEY`.
#[derive(Clone)]
pub struct ProgressStore {
    kv: Arc<dyn KeyValueStore>,
}

impl ProgressStore {
    #[must_use]
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    /// Read the whole blob. A missing or unreadable value yields an empty blob.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Storage` if the store cannot be read.
    pub async fn load(&self) -> Result<ProgressBlob, ProgressError> {
        Ok(self.read_blob().await?.unwrap_or_else(|err| {
            tracing::warn!(error = %err, "ignoring unreadable progress blob");
            ProgressBlob::default()
        }))
    }

    async fn read_blob(&self) -> Result<Result<ProgressBlob, serde_json::Error>, ProgressError> {
        let Some(raw) = self.kv.get(PROGRESS_STORAGE_KEY).await? else {
            return Ok(Ok(ProgressBlob::default()));
        };
        let blob = ProgressBlob::from_json(&raw);
        if let Ok(blob) = &blob {
            for key in blob.unreadable_keys() {
                tracing::warn!(course = key, "keeping unreadable progress entry as is");
            }
        }
        Ok(blob)
    }

    /// # Errors
    ///
    /// Returns `ProgressError::Storage` if the store cannot be read.
    pub async fn get(&self, course_id: CourseId) -> Result<Option<ProgressRecord>, ProgressError> {
        Ok(self.load().await?.get(course_id))
    }

    /// Merge `current` into the stored record and write the blob back.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Unreadable` without writing if the stored blob
    /// is not a progress blob at all.
    /// Returns `ProgressError` if the blob cannot be read, encoded or written.
    pub async fn record(
        &self,
        course_id: CourseId,
        current: u8,
    ) -> Result<ProgressRecord, ProgressError> {
        let mut blob = self.read_blob().await?.map_err(ProgressError::Unreadable)?;
        let merged = blob.apply(course_id, current);
        self.kv.set(PROGRESS_STORAGE_KEY, &blob.to_json()?).await?;
        Ok(merged)
    }

    /// Courses read to exactly 100%.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Storage` if the store cannot be read.
    pub async fn finished_count(&self) -> Result<usize, ProgressError> {
        Ok(self.load().await?.finished_count())
    }

    #[must_use]
    pub fn watch(&self) -> ProgressWatcher {
        ProgressWatcher {
            rx: self.kv.subscribe(),
        }
    }
}

/// Wakes up when the progress blob is written, from this page or another.
pub struct ProgressWatcher {
    rx: broadcast::Receiver<KeyChange>,
}

impl ProgressWatcher {
    /// Wait for the next progress write. Returns `false` once the store is gone.
    pub async fn changed(&mut self) -> bool {
        loop {
            match self.rx.recv().await {
                Ok(change) if change.key == PROGRESS_STORAGE_KEY => return true,
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "progress watcher lagged");
                    return true;
                }
                Err(broadcast::error::RecvError::Closed) => return false,
            }
        }
    }
}

/// Turns scroll measurements into monotonic, persisted progress.
///
/// Keeps the last known record per course; the durable blob is re-read on
/// every measurement so progress written by another page is never lowered.
pub struct ProgressTracker {
    store: ProgressStore,
    last: HashMap<CourseId, ProgressRecord>,
}

impl ProgressTracker {
    #[must_use]
    pub fn new(store: ProgressStore) -> Self {
        Self {
            store,
            last: HashMap::new(),
        }
    }

    /// Stored record for `course_id`, shown before any scroll happens.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Storage` if the store cannot be read.
    pub async fn restore(
        &mut self,
        course_id: CourseId,
    ) -> Result<Option<ProgressRecord>, ProgressError> {
        let record = self.store.get(course_id).await?;
        if let Some(record) = record {
            self.last.insert(course_id, record);
        }
        Ok(record)
    }

    /// Persist the progress implied by `metrics`. Every call writes.
    ///
    /// Returns `Ok(None)` without touching the store when the document has
    /// no scrollable overflow.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError` if the blob cannot be read or written.
    pub async fn record_scroll(
        &mut self,
        course_id: CourseId,
        metrics: ScrollMetrics,
    ) -> Result<Option<ProgressRecord>, ProgressError> {
        let Some(current) = metrics.percent() else {
            return Ok(None);
        };
        let record = self.store.record(course_id, current).await?;
        let was_completed = self.last.get(&course_id).is_some_and(|prev| prev.completed);
        if record.completed && !was_completed {
            tracing::info!(course_id = %course_id, percent = record.percent, "course completed");
        }
        self.last.insert(course_id, record);
        Ok(Some(record))
    }

    #[must_use]
    pub fn last_known(&self, course_id: CourseId) -> Option<ProgressRecord> {
        self.last.get(&course_id).copied()
    }

    #[must_use]
    pub fn store(&self) -> &ProgressStore {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storage::repository::InMemoryKeyValueStore;

    fn tracker() -> (ProgressTracker, Arc<InMemoryKeyValueStore>) {
        let kv = Arc::new(InMemoryKeyValueStore::new());
        let store = ProgressStore::new(kv.clone());
        (ProgressTracker::new(store), kv)
    }

    fn at(top: f64) -> ScrollMetrics {
        ScrollMetrics::new(top, 500.0, 1500.0)
    }

    #[tokio::test]
    async fn percent_never_decreases() {
        let (mut tracker, _) = tracker();
        let course = CourseId::new(1);
        let mut seen = Vec::new();
        for top in [100.0, 600.0, 200.0, 0.0, 750.0] {
            tracker.record_scroll(course, at(top)).await.unwrap();
            seen.push(tracker.store().get(course).await.unwrap().unwrap().percent);
        }
        assert_eq!(seen, [10, 60, 60, 60, 75]);
    }

    #[tokio::test]
    async fn flat_document_leaves_store_untouched() {
        let (mut tracker, kv) = tracker();
        let out = tracker
            .record_scroll(CourseId::new(1), ScrollMetrics::new(0.0, 900.0, 900.0))
            .await
            .unwrap();
        assert!(out.is_none());
        assert!(kv.get(PROGRESS_STORAGE_KEY).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn completed_sticks_once_reached() {
        let (mut tracker, _) = tracker();
        let course = CourseId::new(3);
        let flags: Vec<bool> = {
            let mut flags = Vec::new();
            for top in [800.0, 900.0, 100.0, 0.0] {
                let rec = tracker.record_scroll(course, at(top)).await.unwrap().unwrap();
                flags.push(rec.completed);
            }
            flags
        };
        assert_eq!(flags, [false, true, true, true]);
    }

    #[tokio::test]
    async fn progress_written_elsewhere_is_not_lowered() {
        let (mut tracker, kv) = tracker();
        let course = CourseId::new(5);
        tracker.record_scroll(course, at(200.0)).await.unwrap();

        // another page of the same profile goes further
        let other = ProgressStore::new(kv);
        other.record(course, 95).await.unwrap();

        let rec = tracker.record_scroll(course, at(300.0)).await.unwrap().unwrap();
        assert_eq!(rec.percent, 95);
        assert!(rec.completed);
    }

    #[tokio::test]
    async fn restore_reflects_stored_record() {
        let (mut tracker, kv) = tracker();
        kv.set(
            PROGRESS_STORAGE_KEY,
            r#"{"courses":{"8":{"percent":42,"completed":false}}}"#,
        )
        .await
        .unwrap();

        let rec = tracker.restore(CourseId::new(8)).await.unwrap();
        assert_eq!(rec.map(|r| r.percent), Some(42));
        assert_eq!(tracker.last_known(CourseId::new(8)), rec);
        assert!(tracker.restore(CourseId::new(9)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn corrupt_blob_reads_as_empty_and_is_not_overwritten() {
        let (mut tracker, kv) = tracker();
        kv.set(PROGRESS_STORAGE_KEY, "not json").await.unwrap();
        assert!(tracker.restore(CourseId::new(1)).await.unwrap().is_none());

        let err = tracker
            .record_scroll(CourseId::new(1), at(500.0))
            .await
            .unwrap_err();
        assert!(matches!(err, ProgressError::Unreadable(_)));
        assert_eq!(
            kv.get(PROGRESS_STORAGE_KEY).await.unwrap().as_deref(),
            Some("not json")
        );
    }

    #[tokio::test]
    async fn one_malformed_record_does_not_wipe_the_rest() {
        let (mut tracker, kv) = tracker();
        kv.set(
            PROGRESS_STORAGE_KEY,
            r#"{"courses":{"1":{"percent":80,"completed":false},"2":{"percent":100,"completed":true},"3":{"percent":40},"4":{"percent":null}}}"#,
        )
        .await
        .unwrap();

        tracker.record_scroll(CourseId::new(3), at(100.0)).await.unwrap();

        let store = tracker.store();
        assert_eq!(store.get(CourseId::new(1)).await.unwrap().map(|r| r.percent), Some(80));
        assert_eq!(store.get(CourseId::new(2)).await.unwrap().map(|r| r.percent), Some(100));
        assert_eq!(store.get(CourseId::new(3)).await.unwrap().map(|r| r.percent), Some(40));
        assert_eq!(store.finished_count().await.unwrap(), 1);
        let raw = kv.get(PROGRESS_STORAGE_KEY).await.unwrap().unwrap();
        assert!(raw.contains(r#""4":{"percent":null}"#));
    }

    #[tokio::test]
    async fn finished_count_only_counts_full_reads() {
        let (mut tracker, _) = tracker();
        tracker.record_scroll(CourseId::new(1), at(950.0)).await.unwrap();
        tracker.record_scroll(CourseId::new(2), at(1000.0)).await.unwrap();
        assert_eq!(tracker.store().finished_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn watcher_sees_progress_writes_only() {
        let (mut tracker, kv) = tracker();
        let mut watcher = tracker.store().watch();
        kv.set("theme", "dark").await.unwrap();
        tracker.record_scroll(CourseId::new(1), at(10.0)).await.unwrap();
        assert!(watcher.changed().await);
    }
}
