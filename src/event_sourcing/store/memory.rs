use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::event_store::{EventStore, Page};
use super::snapshot::Snapshot;
use crate::error::EventStoreError;
use crate::event_sourcing::core::RecordedEvent;

// ============================================================================
// In-Memory Event Store
// ============================================================================
//
// Same contract as the Postgres store, backed by lock-protected maps.
// Supports command-handler tests and local development without a database;
// enforces optimistic concurrency by checking the expected version while
// holding the write lock, which stands in for the storage-level uniqueness
// constraint.
//
// ============================================================================

#[derive(Default)]
struct Inner {
    /// Per-aggregate streams, each kept in ascending version order.
    streams: HashMap<Uuid, Vec<RecordedEvent>>,
    /// Per-aggregate snapshots, ascending by version.
    snapshots: HashMap<Uuid, Vec<Snapshot>>,
    /// Globally unique event ids.
    event_ids: HashSet<Uuid>,
}

#[derive(Default)]
pub struct InMemoryEventStore {
    inner: RwLock<Inner>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn stream_version(inner: &Inner, aggregate_id: Uuid) -> i64 {
        inner
            .streams
            .get(&aggregate_id)
            .and_then(|events| events.last())
            .map(|event| event.version)
            .unwrap_or(0)
    }

    fn all_events(inner: &Inner) -> impl Iterator<Item = &RecordedEvent> {
        inner.streams.values().flatten()
    }

    fn page_descending(
        mut events: Vec<RecordedEvent>,
        page: Page,
    ) -> Vec<RecordedEvent> {
        events.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        events
            .into_iter()
            .skip(page.offset())
            .take(page.size as usize)
            .collect()
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn events_from_version(
        &self,
        aggregate_id: Uuid,
        from_version: i64,
    ) -> Result<Vec<RecordedEvent>, EventStoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .streams
            .get(&aggregate_id)
            .map(|events| {
                events
                    .iter()
                    .filter(|event| event.version > from_version)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn events_from_timestamp(
        &self,
        aggregate_id: Uuid,
        from: DateTime<Utc>,
    ) -> Result<Vec<RecordedEvent>, EventStoreError> {
        let inner = self.inner.read().await;
        let mut events: Vec<RecordedEvent> = inner
            .streams
            .get(&aggregate_id)
            .map(|events| {
                events
                    .iter()
                    .filter(|event| event.timestamp >= from)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        events.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        Ok(events)
    }

    async fn events_by_type(
        &self,
        event_type: &str,
        page: Page,
    ) -> Result<Vec<RecordedEvent>, EventStoreError> {
        let inner = self.inner.read().await;
        let matching = Self::all_events(&inner)
            .filter(|event| event.event_type == event_type)
            .cloned()
            .collect();
        Ok(Self::page_descending(matching, page))
    }

    async fn events_by_aggregate_type(
        &self,
        aggregate_type: &str,
        page: Page,
    ) -> Result<Vec<RecordedEvent>, EventStoreError> {
        let inner = self.inner.read().await;
        let matching = Self::all_events(&inner)
            .filter(|event| event.aggregate_type == aggregate_type)
            .cloned()
            .collect();
        Ok(Self::page_descending(matching, page))
    }

    async fn events_by_user(
        &self,
        user_id: Uuid,
        page: Page,
    ) -> Result<Vec<RecordedEvent>, EventStoreError> {
        let inner = self.inner.read().await;
        let matching = Self::all_events(&inner)
            .filter(|event| event.user_id == Some(user_id))
            .cloned()
            .collect();
        Ok(Self::page_descending(matching, page))
    }

    async fn events_by_correlation(
        &self,
        correlation_id: Uuid,
    ) -> Result<Vec<RecordedEvent>, EventStoreError> {
        let inner = self.inner.read().await;
        let mut matching: Vec<RecordedEvent> = Self::all_events(&inner)
            .filter(|event| event.correlation_id == correlation_id)
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        Ok(matching)
    }

    async fn append(
        &self,
        aggregate_id: Uuid,
        events: &[RecordedEvent],
        expected_version: i64,
    ) -> Result<i64, EventStoreError> {
        if events.is_empty() {
            return Ok(expected_version);
        }

        let mut inner = self.inner.write().await;

        let current = Self::stream_version(&inner, aggregate_id);
        if current != expected_version {
            return Err(EventStoreError::ConcurrencyConflict {
                aggregate_id,
                expected: expected_version,
                current,
            });
        }

        for event in events {
            if inner.event_ids.contains(&event.id) {
                return Err(EventStoreError::DuplicateEvent(event.id));
            }
        }

        let mut new_version = current;
        for event in events {
            new_version = event.version;
            inner.event_ids.insert(event.id);
            inner
                .streams
                .entry(aggregate_id)
                .or_default()
                .push(event.clone());
        }

        tracing::debug!(
            aggregate_id = %aggregate_id,
            new_version = new_version,
            event_count = events.len(),
            "appended events to in-memory store"
        );

        Ok(new_version)
    }

    async fn append_one(&self, event: &RecordedEvent) -> Result<(), EventStoreError> {
        let mut inner = self.inner.write().await;

        if inner.event_ids.contains(&event.id) {
            return Err(EventStoreError::DuplicateEvent(event.id));
        }

        inner.event_ids.insert(event.id);
        let stream = inner.streams.entry(event.aggregate_id).or_default();
        stream.push(event.clone());
        stream.sort_by_key(|event| event.version);
        Ok(())
    }

    async fn latest_snapshot(
        &self,
        aggregate_id: Uuid,
    ) -> Result<Option<Snapshot>, EventStoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .snapshots
            .get(&aggregate_id)
            .and_then(|snapshots| snapshots.last())
            .cloned())
    }

    async fn save_snapshot(&self, snapshot: &Snapshot) -> Result<(), EventStoreError> {
        let mut inner = self.inner.write().await;
        let snapshots = inner.snapshots.entry(snapshot.aggregate_id).or_default();
        snapshots.push(snapshot.clone());
        snapshots.sort_by_key(|snapshot| snapshot.version);
        Ok(())
    }

    async fn event_exists(&self, event_id: Uuid) -> Result<bool, EventStoreError> {
        let inner = self.inner.read().await;
        Ok(inner.event_ids.contains(&event_id))
    }

    async fn latest_version(&self, aggregate_id: Uuid) -> Result<i64, EventStoreError> {
        let inner = self.inner.read().await;
        Ok(Self::stream_version(&inner, aggregate_id))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_sourcing::core::EventContext;
    use serde::{Deserialize, Serialize};

    use crate::event_sourcing::core::DomainEvent;

    #[derive(Serialize, Deserialize, Clone, Debug)]
    struct NoteTaken {
        text: String,
    }

    impl DomainEvent for NoteTaken {
        fn event_type(&self) -> &'static str {
            "NoteTaken"
        }
        fn event_names() -> &'static [&'static str] {
            &["NoteTaken"]
        }
    }

    fn recorded(aggregate_id: Uuid, version: i64, context: &EventContext) -> RecordedEvent {
        RecordedEvent::from_domain(
            aggregate_id,
            "Note",
            version,
            &NoteTaken {
                text: format!("note {version}"),
            },
            context,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn save_then_load_round_trips_in_order() {
        let store = InMemoryEventStore::new();
        let aggregate_id = Uuid::new_v4();
        let context = EventContext::new();

        let events: Vec<RecordedEvent> = (1..=3)
            .map(|version| recorded(aggregate_id, version, &context))
            .collect();

        let new_version = store.append(aggregate_id, &events, 0).await.unwrap();
        assert_eq!(new_version, 3);

        let loaded = store.events_from_version(aggregate_id, 0).await.unwrap();
        assert_eq!(loaded.len(), 3);
        for (expected, event) in events.iter().zip(&loaded) {
            assert_eq!(expected.id, event.id);
            assert_eq!(expected.data, event.data);
        }
        assert_eq!(
            loaded.iter().map(|e| e.version).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
    }

    #[tokio::test]
    async fn append_rejects_stale_expected_version() {
        let store = InMemoryEventStore::new();
        let aggregate_id = Uuid::new_v4();
        let context = EventContext::new();

        let first = vec![recorded(aggregate_id, 1, &context)];
        store.append(aggregate_id, &first, 0).await.unwrap();

        let stale = vec![recorded(aggregate_id, 1, &context)];
        let err = store.append(aggregate_id, &stale, 0).await.unwrap_err();

        match err {
            EventStoreError::ConcurrencyConflict {
                expected, current, ..
            } => {
                assert_eq!(expected, 0);
                assert_eq!(current, 1);
            }
            other => panic!("expected concurrency conflict, got {other}"),
        }
    }

    #[tokio::test]
    async fn concurrent_saves_admit_exactly_one_writer() {
        let store = std::sync::Arc::new(InMemoryEventStore::new());
        let aggregate_id = Uuid::new_v4();
        let context = EventContext::new();

        store
            .append(aggregate_id, &[recorded(aggregate_id, 1, &context)], 0)
            .await
            .unwrap();

        let a = {
            let store = store.clone();
            let event = recorded(aggregate_id, 2, &context);
            tokio::spawn(async move { store.append(aggregate_id, &[event], 1).await })
        };
        let b = {
            let store = store.clone();
            let event = recorded(aggregate_id, 2, &context);
            tokio::spawn(async move { store.append(aggregate_id, &[event], 1).await })
        };

        let results = [a.await.unwrap(), b.await.unwrap()];
        let successes = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(successes, 1);

        let conflict = results.into_iter().find(|r| r.is_err()).unwrap();
        assert!(matches!(
            conflict,
            Err(EventStoreError::ConcurrencyConflict {
                expected: 1,
                current: 2,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn duplicate_event_ids_are_rejected() {
        let store = InMemoryEventStore::new();
        let aggregate_id = Uuid::new_v4();
        let context = EventContext::new();

        let event = recorded(aggregate_id, 1, &context);
        store.append_one(&event).await.unwrap();
        assert!(store.event_exists(event.id).await.unwrap());

        let err = store.append_one(&event).await.unwrap_err();
        assert!(matches!(err, EventStoreError::DuplicateEvent(id) if id == event.id));
    }

    #[tokio::test]
    async fn audit_scans_are_paged_descending_by_timestamp() {
        let store = InMemoryEventStore::new();
        let context = EventContext::new();

        for _ in 0..5 {
            let aggregate_id = Uuid::new_v4();
            store
                .append(aggregate_id, &[recorded(aggregate_id, 1, &context)], 0)
                .await
                .unwrap();
        }

        let first_page = store
            .events_by_aggregate_type("Note", Page::new(1, 3))
            .await
            .unwrap();
        let second_page = store
            .events_by_aggregate_type("Note", Page::new(2, 3))
            .await
            .unwrap();

        assert_eq!(first_page.len(), 3);
        assert_eq!(second_page.len(), 2);
        for pair in first_page.windows(2) {
            assert!(pair[0].timestamp >= pair[1].timestamp);
        }
    }

    #[tokio::test]
    async fn correlation_chain_is_ascending_by_timestamp() {
        let store = InMemoryEventStore::new();
        let correlation_id = Uuid::new_v4();
        let context = EventContext::new().with_correlation(correlation_id);

        for _ in 0..3 {
            let aggregate_id = Uuid::new_v4();
            store
                .append(aggregate_id, &[recorded(aggregate_id, 1, &context)], 0)
                .await
                .unwrap();
        }

        let chain = store.events_by_correlation(correlation_id).await.unwrap();
        assert_eq!(chain.len(), 3);
        for pair in chain.windows(2) {
            assert!(pair[0].timestamp <= pair[1].timestamp);
        }
    }

    #[tokio::test]
    async fn timestamp_reads_exclude_earlier_events() {
        let store = InMemoryEventStore::new();
        let aggregate_id = Uuid::new_v4();
        let context = EventContext::new();

        let early = recorded(aggregate_id, 1, &context);
        let mut late = recorded(aggregate_id, 2, &context);
        late.timestamp = early.timestamp + chrono::Duration::seconds(60);
        store.append(aggregate_id, &[early, late.clone()], 0).await.unwrap();

        let events = store
            .events_from_timestamp(aggregate_id, late.timestamp)
            .await
            .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].version, 2);
    }

    #[tokio::test]
    async fn type_and_user_scans_filter_correctly() {
        let store = InMemoryEventStore::new();
        let user = Uuid::new_v4();
        let context = EventContext::new().with_user(user);
        let other = EventContext::new();

        let first = Uuid::new_v4();
        store
            .append(first, &[recorded(first, 1, &context)], 0)
            .await
            .unwrap();
        let second = Uuid::new_v4();
        store
            .append(second, &[recorded(second, 1, &other)], 0)
            .await
            .unwrap();

        let by_type = store
            .events_by_type("NoteTaken", Page::new(1, 10))
            .await
            .unwrap();
        assert_eq!(by_type.len(), 2);

        let by_user = store.events_by_user(user, Page::new(1, 10)).await.unwrap();
        assert_eq!(by_user.len(), 1);
        assert_eq!(by_user[0].aggregate_id, first);
    }

    #[tokio::test]
    async fn latest_version_is_zero_for_unknown_aggregate() {
        let store = InMemoryEventStore::new();
        assert_eq!(store.latest_version(Uuid::new_v4()).await.unwrap(), 0);
    }
}
