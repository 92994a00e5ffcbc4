//! Cross-module metric synchronization.
//!
//! Turns "physical measurement changed" events into [`UserMetric`] rows:
//! one row per field present in the event, tagged with the auto-sync marker.
//! The event's revision id is recorded in the same store write as the rows,
//! so an event delivered twice is applied once.

use crate::queue::{mark_processed, read_events, JsonlQueue, MeasurementChanged};
use crate::store::{Repository, Store, StoreData};
use crate::{Error, Result, UserMetric, UserMetricType};
use uuid::Uuid;

/// Note marker that distinguishes synchronized rows from user entries
pub const DEFAULT_SYNC_MARKER: &str = "[auto-sync]";

/// Result of applying one event
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SyncOutcome {
    /// New metric rows were created (possibly none for an empty event)
    Applied { created: Vec<Uuid> },
    /// The revision was applied before; nothing changed
    Duplicate,
}

/// Totals for one drain of the queue
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SyncReport {
    pub batches: usize,
    pub applied: usize,
    pub duplicates: usize,
    pub metrics_created: usize,
    /// Events refused by validation, with the reason
    pub rejected: Vec<(Uuid, String)>,
}

#[derive(Clone, Debug)]
pub struct MetricSynchronizer {
    marker: String,
}

impl Default for MetricSynchronizer {
    fn default() -> Self {
        Self::new(DEFAULT_SYNC_MARKER)
    }
}

impl MetricSynchronizer {
    pub fn new(marker: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
        }
    }

    pub fn marker(&self) -> &str {
        &self.marker
    }

    /// True for rows created by this synchronizer
    pub fn is_auto_synced(&self, metric: &UserMetric) -> bool {
        metric.has_marker(&self.marker)
    }

    /// Apply one event to the store data
    ///
    /// All rows of an event are validated before any is added, so a rejected
    /// event leaves `data` unchanged.
    pub fn apply(&self, data: &mut StoreData, event: &MeasurementChanged) -> Result<SyncOutcome> {
        if data.has_applied_revision(event.revision_id) {
            tracing::warn!(
                "Measurement revision {} already applied, skipping",
                event.revision_id
            );
            return Ok(SyncOutcome::Duplicate);
        }
        if event.revision_id.is_nil() {
            return Err(Error::validation("revision id must not be empty"));
        }

        let note = format!("{} profile revision {}", self.marker, event.revision_id);
        let mut rows = Vec::new();
        for (metric_type, value) in [
            (UserMetricType::Height, event.height_cm),
            (UserMetricType::Weight, event.weight_kg),
        ] {
            if let Some(value) = value {
                rows.push(UserMetric::new(
                    event.user_id,
                    metric_type,
                    value,
                    None,
                    event.occurred_at,
                    Some(note.clone()),
                )?);
            }
        }

        let created: Vec<Uuid> = rows.iter().map(UserMetric::id).collect();
        for row in rows {
            data.add(row)?;
        }
        data.mark_revision_applied(event.revision_id);

        tracing::info!(
            "Synchronized revision {} for user {}: {} metric(s)",
            event.revision_id,
            event.user_id,
            created.len()
        );
        Ok(SyncOutcome::Applied { created })
    }

    /// Claim every pending batch from `queue` and commit it into `store`
    ///
    /// Each batch is one store transaction. A batch is marked processed only
    /// after its transaction committed. Events that fail validation are
    /// reported in [`SyncReport::rejected`] and do not block the batch.
    /// Concurrent drains of the same queue run one after the other.
    pub fn drain<S: Store>(&self, queue: &JsonlQueue, store: &mut S) -> Result<SyncReport> {
        let _drain = queue.lock_drain()?;
        let mut report = SyncReport::default();

        for batch in queue.claim()? {
            let events = read_events(&batch)?;
            let batch_report = store.transact(|data| {
                let mut partial = SyncReport::default();
                for event in &events {
                    match self.apply(data, event) {
                        Ok(SyncOutcome::Applied { created }) => {
                            partial.applied += 1;
                            partial.metrics_created += created.len();
                        }
                        Ok(SyncOutcome::Duplicate) => partial.duplicates += 1,
                        Err(Error::Validation(reason)) => {
                            tracing::warn!(
                                "Rejected measurement revision {}: {}",
                                event.revision_id,
                                reason
                            );
                            partial.rejected.push((event.revision_id, reason));
                        }
                        Err(e) => return Err(e),
                    }
                }
                Ok(partial)
            })?;
            mark_processed(&batch)?;

            report.batches += 1;
            report.applied += batch_report.applied;
            report.duplicates += batch_report.duplicates;
            report.metrics_created += batch_report.metrics_created;
            report.rejected.extend(batch_report.rejected);
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::EventSink;
    use crate::store::MemoryStore;
    use chrono::Utc;

    fn metrics_of(data: &StoreData, metric_type: UserMetricType) -> Vec<UserMetric> {
        data.metrics()
            .filter(|m| m.metric_type() == metric_type)
            .cloned()
            .collect()
    }

    #[test]
    fn test_height_only_update_creates_one_row() {
        let sync = MetricSynchronizer::default();
        let mut data = StoreData::default();
        let event = MeasurementChanged::new(Uuid::new_v4(), Some(182.0), None, Utc::now());

        let outcome = sync.apply(&mut data, &event).unwrap();

        assert!(matches!(outcome, SyncOutcome::Applied { ref created } if created.len() == 1));
        let heights = metrics_of(&data, UserMetricType::Height);
        assert_eq!(heights.len(), 1);
        assert_eq!(heights[0].value(), 182.0);
        assert_eq!(heights[0].unit(), "cm");
        assert!(sync.is_auto_synced(&heights[0]));
        assert!(metrics_of(&data, UserMetricType::Weight).is_empty());
    }

    #[test]
    fn test_both_fields_create_two_rows() {
        let sync = MetricSynchronizer::default();
        let mut data = StoreData::default();
        let user = Uuid::new_v4();
        let event = MeasurementChanged::new(user, Some(175.0), Some(72.0), Utc::now());

        sync.apply(&mut data, &event).unwrap();

        assert_eq!(data.metrics().count(), 2);
        assert!(data.metrics().all(|m| m.user_id() == user));
        assert_eq!(metrics_of(&data, UserMetricType::Weight)[0].unit(), "kg");
    }

    #[test]
    fn test_replayed_revision_is_ignored() {
        let sync = MetricSynchronizer::default();
        let mut data = StoreData::default();
        let event = MeasurementChanged::new(Uuid::new_v4(), None, Some(80.0), Utc::now());

        sync.apply(&mut data, &event).unwrap();
        assert_eq!(sync.apply(&mut data, &event).unwrap(), SyncOutcome::Duplicate);
        assert_eq!(data.metrics().count(), 1);
    }

    #[test]
    fn test_invalid_event_leaves_data_unchanged() {
        let sync = MetricSynchronizer::default();
        let mut data = StoreData::default();
        let event = MeasurementChanged::new(Uuid::new_v4(), Some(180.0), Some(-4.0), Utc::now());

        assert!(sync.apply(&mut data, &event).unwrap_err().is_validation());
        assert_eq!(data, StoreData::default());
    }

    #[test]
    fn test_user_entries_are_not_auto_synced() {
        let sync = MetricSynchronizer::default();
        let manual = UserMetric::new(
            Uuid::new_v4(),
            UserMetricType::Weight,
            80.0,
            None,
            Utc::now(),
            Some("after breakfast".into()),
        )
        .unwrap();
        assert!(!sync.is_auto_synced(&manual));
    }

    #[test]
    fn test_drain_applies_queue_once() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut queue = JsonlQueue::new(temp_dir.path().join("measurements.jsonl"));
        let mut store = MemoryStore::new();
        let sync = MetricSynchronizer::default();

        let user = Uuid::new_v4();
        let replayed = MeasurementChanged::new(user, Some(180.0), Some(78.0), Utc::now());
        queue.publish(&replayed).unwrap();
        queue.publish(&replayed).unwrap();
        queue
            .publish(&MeasurementChanged::new(user, None, Some(-1.0), Utc::now()))
            .unwrap();

        let report = sync.drain(&queue, &mut store).unwrap();
        assert_eq!(report.batches, 1);
        assert_eq!(report.applied, 1);
        assert_eq!(report.duplicates, 1);
        assert_eq!(report.metrics_created, 2);
        assert_eq!(report.rejected.len(), 1);
        assert_eq!(store.snapshot().unwrap().metrics().count(), 2);

        // Re-delivery in a later batch is still a duplicate
        queue.publish(&replayed).unwrap();
        let report = sync.drain(&queue, &mut store).unwrap();
        assert_eq!(report.duplicates, 1);
        assert_eq!(store.snapshot().unwrap().metrics().count(), 2);

        // Nothing left to drain
        assert_eq!(sync.drain(&queue, &mut store).unwrap(), SyncReport::default());
    }

    #[test]
    fn test_concurrent_drains_share_the_work() {
        use crate::store::FileStore;

        let temp_dir = tempfile::tempdir().unwrap();
        let queue_path = temp_dir.path().join("measurements.jsonl");
        let store_path = temp_dir.path().join("store.json");
        let mut queue = JsonlQueue::new(&queue_path);
        for _ in 0..20 {
            queue
                .publish(&MeasurementChanged::new(Uuid::new_v4(), None, Some(70.0), Utc::now()))
                .unwrap();
        }

        let reports: Vec<SyncReport> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    scope.spawn(|| {
                        let mut store = FileStore::new(&store_path);
                        MetricSynchronizer::default().drain(&JsonlQueue::new(&queue_path), &mut store)
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap().unwrap())
                .collect()
        });

        assert_eq!(reports.iter().map(|r| r.applied).sum::<usize>(), 20);
        assert_eq!(reports.iter().map(|r| r.batches).sum::<usize>(), 1);
        assert_eq!(FileStore::load(&store_path).unwrap().metrics().count(), 20);
        assert!(JsonlQueue::new(&queue_path).claim().unwrap().is_empty());
    }

    #[test]
    fn test_revision_stays_applied_after_batches_are_cleaned_up() {
        use crate::queue::cleanup_processed_queues;
        use crate::store::FileStore;

        let temp_dir = tempfile::tempdir().unwrap();
        let queue_path = temp_dir.path().join("measurements.jsonl");
        let mut queue = JsonlQueue::new(&queue_path);
        let mut store = FileStore::new(temp_dir.path().join("store.json"));
        let sync = MetricSynchronizer::default();

        let event = MeasurementChanged::new(Uuid::new_v4(), Some(175.0), None, Utc::now());
        queue.publish(&event).unwrap();
        sync.drain(&queue, &mut store).unwrap();

        // Keep a copy of the archived batch, then clean the archive
        let replay = temp_dir.path().join("replay.jsonl");
        let archived = std::fs::read_dir(temp_dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .find(|path| path.extension().is_some_and(|ext| ext == "processed"))
            .unwrap();
        std::fs::copy(&archived, &replay).unwrap();
        assert_eq!(cleanup_processed_queues(temp_dir.path()).unwrap(), 1);

        std::fs::rename(&replay, &queue_path).unwrap();
        let report = sync.drain(&queue, &mut store).unwrap();
        assert_eq!(report.duplicates, 1);
        assert_eq!(report.metrics_created, 0);

        let data = store.snapshot().unwrap();
        assert!(data.has_applied_revision(event.revision_id));
        assert_eq!(data.metrics().count(), 1);
    }
}
