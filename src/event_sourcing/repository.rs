use std::marker::PhantomData;
use std::sync::Arc;
use uuid::Uuid;

use super::core::{apply_recorded, rehydrate, Aggregate, EventContext, RecordedEvent};
use super::store::{EventStore, Page, Snapshot};
use crate::config::{SnapshotConfig, SnapshotPolicy};
use crate::error::EventStoreError;
use crate::registry::EventTypeRegistry;

// ============================================================================
// Aggregate Repository
// ============================================================================
//
// Builds and saves aggregates on top of the event store. The default load
// path is snapshot-accelerated; the at-version/at-timestamp overloads are
// full historical replays that ignore snapshots entirely.
//
// ============================================================================

pub struct AggregateRepository<A: Aggregate> {
    store: Arc<dyn EventStore>,
    registry: Arc<EventTypeRegistry>,
    snapshots: SnapshotConfig,
    _aggregate: PhantomData<fn() -> A>,
}

impl<A: Aggregate> AggregateRepository<A> {
    pub fn new(
        store: Arc<dyn EventStore>,
        registry: Arc<EventTypeRegistry>,
        snapshots: SnapshotConfig,
    ) -> Self {
        Self {
            store,
            registry,
            snapshots,
            _aggregate: PhantomData,
        }
    }

    /// Rehydrate the current state: latest snapshot (if any) plus every
    /// event past it, applied in version order.
    pub async fn get_by_id(&self, id: Uuid) -> Result<A, EventStoreError> {
        let snapshot = self.store.latest_snapshot(id).await?;

        let (restored, from_version) = match snapshot {
            Some(snapshot) => match snapshot.restore::<A>() {
                Ok(aggregate) => {
                    let version = snapshot.version;
                    (Some(aggregate), version)
                }
                Err(err) => match self.snapshots.policy {
                    SnapshotPolicy::FailFast => return Err(err),
                    SnapshotPolicy::FallbackToReplay => {
                        tracing::warn!(
                            aggregate_id = %id,
                            error = %err,
                            "discarding corrupt snapshot, replaying from version 0"
                        );
                        (None, 0)
                    }
                },
            },
            None => (None, 0),
        };

        let events = self.store.events_from_version(id, from_version).await?;
        if restored.is_none() && events.is_empty() {
            return Err(EventStoreError::AggregateNotFound(id));
        }

        let mut aggregate = restored.unwrap_or_else(|| A::empty(id));
        apply_recorded(self.registry.as_ref(), &mut aggregate, &events)?;
        Ok(aggregate)
    }

    /// Historical replay: all events with `version <= at_version`, applied
    /// from empty state. Snapshots are ignored.
    pub async fn get_by_id_at_version(
        &self,
        id: Uuid,
        at_version: i64,
    ) -> Result<A, EventStoreError> {
        let events: Vec<RecordedEvent> = self
            .store
            .events_from_version(id, 0)
            .await?
            .into_iter()
            .filter(|event| event.version <= at_version)
            .collect();

        if events.is_empty() {
            return Err(EventStoreError::NoEventsFound(id));
        }

        rehydrate(self.registry.as_ref(), id, &events)
    }

    /// Historical replay bounded by `timestamp <= at`.
    pub async fn get_by_id_at_timestamp(
        &self,
        id: Uuid,
        at: chrono::DateTime<chrono::Utc>,
    ) -> Result<A, EventStoreError> {
        let events: Vec<RecordedEvent> = self
            .store
            .events_from_version(id, 0)
            .await?
            .into_iter()
            .filter(|event| event.timestamp <= at)
            .collect();

        if events.is_empty() {
            return Err(EventStoreError::NoEventsFound(id));
        }

        rehydrate(self.registry.as_ref(), id, &events)
    }

    /// Flush the aggregate's uncommitted events through the concurrency
    /// gate. On success the uncommitted list is cleared and the aggregate's
    /// version advances; every Nth version also persists a snapshot.
    ///
    /// Saving an aggregate with no uncommitted events is a successful no-op.
    pub async fn save(
        &self,
        aggregate: &mut A,
        expected_version: i64,
        context: &EventContext,
    ) -> Result<i64, EventStoreError> {
        let pending = aggregate.uncommitted_events().to_vec();
        if pending.is_empty() {
            return Ok(aggregate.version());
        }

        let mut records = Vec::with_capacity(pending.len());
        for (offset, event) in pending.iter().enumerate() {
            records.push(RecordedEvent::from_domain(
                aggregate.id(),
                A::aggregate_type(),
                expected_version + 1 + offset as i64,
                event,
                context,
            )?);
        }

        let new_version = self
            .store
            .append(aggregate.id(), &records, expected_version)
            .await?;

        aggregate.mark_committed();
        aggregate.set_version(new_version);

        tracing::info!(
            aggregate_id = %aggregate.id(),
            aggregate_type = A::aggregate_type(),
            new_version = new_version,
            event_count = records.len(),
            "saved aggregate"
        );

        if self.snapshots.frequency > 0 && new_version % self.snapshots.frequency == 0 {
            let snapshot = Snapshot::of_aggregate(aggregate)?;
            self.store.save_snapshot(&snapshot).await?;
            tracing::debug!(
                aggregate_id = %aggregate.id(),
                version = new_version,
                "persisted snapshot"
            );
        }

        Ok(new_version)
    }

    pub async fn exists(&self, id: Uuid) -> Result<bool, EventStoreError> {
        Ok(self.store.latest_version(id).await? > 0)
    }

    /// Browse aggregates of this type: scan one page of events by aggregate
    /// type, hydrate each distinct aggregate id observed.
    ///
    /// An approximation: a page of events does not bound the number of
    /// distinct aggregates returned, and pagination is not stable across
    /// aggregates. Fine for admin browsing, not exhaustive enumeration.
    pub async fn get_all(&self, page: Page) -> Result<Vec<A>, EventStoreError> {
        let events = self
            .store
            .events_by_aggregate_type(A::aggregate_type(), page)
            .await?;

        let mut ids: Vec<Uuid> = Vec::new();
        for event in &events {
            if !ids.contains(&event.aggregate_id) {
                ids.push(event.aggregate_id);
            }
        }

        let mut aggregates = Vec::with_capacity(ids.len());
        for id in ids {
            aggregates.push(self.get_by_id(id).await?);
        }
        Ok(aggregates)
    }

    /// Explicit time-travel entry point; same semantics as
    /// [`get_by_id_at_version`](Self::get_by_id_at_version).
    pub async fn replay_to_version(&self, id: Uuid, version: i64) -> Result<A, EventStoreError> {
        self.get_by_id_at_version(id, version).await
    }

    /// Explicit time-travel entry point; same semantics as
    /// [`get_by_id_at_timestamp`](Self::get_by_id_at_timestamp).
    pub async fn replay_to_timestamp(
        &self,
        id: Uuid,
        at: chrono::DateTime<chrono::Utc>,
    ) -> Result<A, EventStoreError> {
        self.get_by_id_at_timestamp(id, at).await
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::family::{FamilyAggregate, FamilyCommand, FamilyEvent, FamilyRole};
    use crate::event_sourcing::store::InMemoryEventStore;

    fn repository(
        frequency: i64,
        policy: SnapshotPolicy,
    ) -> (AggregateRepository<FamilyAggregate>, Arc<InMemoryEventStore>) {
        let store = Arc::new(InMemoryEventStore::new());
        let registry = Arc::new(EventTypeRegistry::new().with::<FamilyEvent>());
        let repository = AggregateRepository::new(
            store.clone(),
            registry,
            SnapshotConfig { frequency, policy },
        );
        (repository, store)
    }

    fn created_family(id: Uuid) -> FamilyAggregate {
        let mut family = FamilyAggregate::empty(id);
        let events = family
            .handle(&FamilyCommand::CreateFamily {
                name: "Smith".to_string(),
            })
            .unwrap();
        for event in events {
            family.record(event);
        }
        family
    }

    fn add_member(family: &mut FamilyAggregate) {
        let events = family
            .handle(&FamilyCommand::AddMember {
                member_id: Uuid::new_v4(),
                display_name: "Member".to_string(),
                role: FamilyRole::Adult,
            })
            .unwrap();
        for event in events {
            family.record(event);
        }
    }

    #[tokio::test]
    async fn save_then_get_round_trips_state() {
        let (repository, _) = repository(100, SnapshotPolicy::FailFast);
        let id = Uuid::new_v4();
        let context = EventContext::new();

        let mut family = created_family(id);
        add_member(&mut family);
        assert_eq!(family.uncommitted_events().len(), 2);

        let new_version = repository.save(&mut family, 0, &context).await.unwrap();
        assert_eq!(new_version, 2);
        assert!(family.uncommitted_events().is_empty());

        let loaded = repository.get_by_id(id).await.unwrap();
        assert_eq!(loaded.version(), 2);
        assert_eq!(loaded.name, "Smith");
        assert_eq!(loaded.member_count(), 1);
    }

    #[tokio::test]
    async fn save_without_uncommitted_events_is_a_no_op() {
        let (repository, store) = repository(100, SnapshotPolicy::FailFast);
        let id = Uuid::new_v4();
        let context = EventContext::new();

        let mut family = created_family(id);
        repository.save(&mut family, 0, &context).await.unwrap();

        let version = repository.save(&mut family, 1, &context).await.unwrap();
        assert_eq!(version, 1);
        assert_eq!(store.latest_version(id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn get_by_id_reports_not_found_for_unknown_aggregate() {
        let (repository, _) = repository(100, SnapshotPolicy::FailFast);
        let err = repository.get_by_id(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, EventStoreError::AggregateNotFound(_)));
    }

    #[tokio::test]
    async fn conflicting_save_cites_both_versions() {
        let (repository, _) = repository(100, SnapshotPolicy::FailFast);
        let id = Uuid::new_v4();
        let context = EventContext::new();

        let mut family = created_family(id);
        add_member(&mut family);
        repository.save(&mut family, 0, &context).await.unwrap();

        let mut stale = created_family(id);
        let err = repository.save(&mut stale, 0, &context).await.unwrap_err();
        let message = err.to_string();
        assert!(message.contains("expected version 0"));
        assert!(message.contains("current version is 2"));
    }

    #[tokio::test]
    async fn snapshot_bounds_the_replay_and_matches_full_replay() {
        let (repository, store) = repository(100, SnapshotPolicy::FailFast);
        let id = Uuid::new_v4();
        let context = EventContext::new();

        let mut family = created_family(id);
        repository.save(&mut family, 0, &context).await.unwrap();

        // Drive the aggregate to version 120: snapshot lands at 100.
        for version in 1..120 {
            add_member(&mut family);
            repository.save(&mut family, version, &context).await.unwrap();
        }
        assert_eq!(family.version(), 120);

        let snapshot = store.latest_snapshot(id).await.unwrap().unwrap();
        assert_eq!(snapshot.version, 100);

        let from_snapshot = repository.get_by_id(id).await.unwrap();
        let full_replay = repository.get_by_id_at_version(id, 120).await.unwrap();

        assert_eq!(from_snapshot.version(), 120);
        assert_eq!(from_snapshot.member_count(), full_replay.member_count());
        assert_eq!(from_snapshot.name, full_replay.name);
    }

    #[tokio::test]
    async fn corrupt_snapshot_fails_fast_by_default() {
        let (repository, store) = repository(1, SnapshotPolicy::FailFast);
        let id = Uuid::new_v4();
        let context = EventContext::new();

        let mut family = created_family(id);
        repository.save(&mut family, 0, &context).await.unwrap();

        let mut snapshot = store.latest_snapshot(id).await.unwrap().unwrap();
        snapshot.data = serde_json::json!({"garbage": true});
        store.save_snapshot(&snapshot).await.unwrap();

        let err = repository.get_by_id(id).await.unwrap_err();
        assert!(matches!(err, EventStoreError::SnapshotCorrupt { .. }));
    }

    #[tokio::test]
    async fn corrupt_snapshot_can_fall_back_to_full_replay() {
        let (repository, store) = repository(1, SnapshotPolicy::FallbackToReplay);
        let id = Uuid::new_v4();
        let context = EventContext::new();

        let mut family = created_family(id);
        add_member(&mut family);
        repository.save(&mut family, 0, &context).await.unwrap();

        let mut snapshot = store.latest_snapshot(id).await.unwrap().unwrap();
        snapshot.data = serde_json::json!({"garbage": true});
        store.save_snapshot(&snapshot).await.unwrap();

        let loaded = repository.get_by_id(id).await.unwrap();
        assert_eq!(loaded.version(), 2);
        assert_eq!(loaded.member_count(), 1);
    }

    #[tokio::test]
    async fn time_travel_ignores_later_events() {
        let (repository, _) = repository(100, SnapshotPolicy::FailFast);
        let id = Uuid::new_v4();
        let context = EventContext::new();

        let mut family = created_family(id);
        add_member(&mut family);
        repository.save(&mut family, 0, &context).await.unwrap();

        let at_creation = repository.replay_to_version(id, 1).await.unwrap();
        assert_eq!(at_creation.version(), 1);
        assert_eq!(at_creation.member_count(), 0);

        let shortly_after = chrono::Utc::now() + chrono::Duration::seconds(5);
        let current = repository.replay_to_timestamp(id, shortly_after).await.unwrap();
        assert_eq!(current.version(), 2);
        assert_eq!(current.member_count(), 1);
    }

    #[tokio::test]
    async fn get_all_hydrates_distinct_aggregates_from_one_page() {
        let (repository, _) = repository(100, SnapshotPolicy::FailFast);
        let context = EventContext::new();

        for _ in 0..3 {
            let mut family = created_family(Uuid::new_v4());
            repository.save(&mut family, 0, &context).await.unwrap();
        }

        let families = repository.get_all(Page::new(1, 10)).await.unwrap();
        assert_eq!(families.len(), 3);
    }

    #[tokio::test]
    async fn exists_tracks_latest_version() {
        let (repository, _) = repository(100, SnapshotPolicy::FailFast);
        let id = Uuid::new_v4();
        let context = EventContext::new();

        assert!(!repository.exists(id).await.unwrap());

        let mut family = created_family(id);
        repository.save(&mut family, 0, &context).await.unwrap();
        assert!(repository.exists(id).await.unwrap());
    }
}
