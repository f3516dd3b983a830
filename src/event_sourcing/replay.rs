use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use super::core::{rehydrate, Aggregate, RecordedEvent};
use super::store::EventStore;
use crate::error::EventStoreError;
use crate::registry::EventTypeRegistry;

// ============================================================================
// Replay / Audit Service
// ============================================================================
//
// Historical analysis built only on raw event reads from version 0 forward.
// Snapshots are never consulted: an audit answer must come from the facts
// themselves, not from a derived cache.
//
// ============================================================================

/// Point-in-time view of an aggregate for inspection and debugging.
#[derive(Debug, Clone, Serialize)]
pub struct AggregateStateView {
    pub aggregate_id: Uuid,
    pub aggregate_type: String,
    pub version: i64,
    /// Timestamp of the last event applied into this view.
    pub as_of: DateTime<Utc>,
    /// Serialized aggregate state.
    pub state: serde_json::Value,
}

pub struct ReplayService {
    store: Arc<dyn EventStore>,
    registry: Arc<EventTypeRegistry>,
}

impl ReplayService {
    pub fn new(store: Arc<dyn EventStore>, registry: Arc<EventTypeRegistry>) -> Self {
        Self { store, registry }
    }

    /// Full replay from version 0.
    pub async fn replay_aggregate<A: Aggregate>(&self, id: Uuid) -> Result<A, EventStoreError> {
        let events = self.store.events_from_version(id, 0).await?;
        if events.is_empty() {
            return Err(EventStoreError::NoEventsFound(id));
        }
        rehydrate(self.registry.as_ref(), id, &events)
    }

    /// Replay bounded by `version <= at_version`.
    pub async fn replay_aggregate_to_version<A: Aggregate>(
        &self,
        id: Uuid,
        at_version: i64,
    ) -> Result<A, EventStoreError> {
        let events = self.events_until_version(id, at_version).await?;
        if events.is_empty() {
            return Err(EventStoreError::NoEventsFound(id));
        }
        rehydrate(self.registry.as_ref(), id, &events)
    }

    /// Replay bounded by `timestamp <= at`.
    pub async fn replay_aggregate_to_timestamp<A: Aggregate>(
        &self,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<A, EventStoreError> {
        let events = self.events_until_timestamp(id, at).await?;
        if events.is_empty() {
            return Err(EventStoreError::NoEventsFound(id));
        }
        rehydrate(self.registry.as_ref(), id, &events)
    }

    /// Raw history, ascending by version. No aggregate construction.
    pub async fn event_history(&self, id: Uuid) -> Result<Vec<RecordedEvent>, EventStoreError> {
        self.store.events_from_version(id, 0).await
    }

    /// History restricted to a closed version range.
    pub async fn event_history_in_versions(
        &self,
        id: Uuid,
        from_version: i64,
        to_version: i64,
    ) -> Result<Vec<RecordedEvent>, EventStoreError> {
        Ok(self
            .store
            .events_from_version(id, 0)
            .await?
            .into_iter()
            .filter(|event| event.version >= from_version && event.version <= to_version)
            .collect())
    }

    /// History restricted to a closed timestamp window.
    pub async fn event_history_in_window(
        &self,
        id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<RecordedEvent>, EventStoreError> {
        Ok(self
            .store
            .events_from_version(id, 0)
            .await?
            .into_iter()
            .filter(|event| event.timestamp >= from && event.timestamp <= to)
            .collect())
    }

    /// Walk the stream in version order expecting exactly 1..N. Returns
    /// false on the first gap, duplicate, or out-of-order version.
    pub async fn validate_event_sequence(&self, id: Uuid) -> Result<bool, EventStoreError> {
        let events = self.store.events_from_version(id, 0).await?;

        let mut expected = 1;
        for event in &events {
            if event.version != expected {
                tracing::warn!(
                    aggregate_id = %id,
                    expected_version = expected,
                    actual_version = event.version,
                    "event sequence validation failed"
                );
                return Ok(false);
            }
            expected += 1;
        }
        Ok(true)
    }

    /// Point-in-time state at a version, without touching the snapshot
    /// store.
    pub async fn aggregate_state_at_version<A: Aggregate>(
        &self,
        id: Uuid,
        at_version: i64,
    ) -> Result<AggregateStateView, EventStoreError> {
        let events = self.events_until_version(id, at_version).await?;
        Self::build_view::<A>(id, events, self.registry.as_ref())
    }

    /// Point-in-time state at a timestamp, without touching the snapshot
    /// store.
    pub async fn aggregate_state_at_timestamp<A: Aggregate>(
        &self,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<AggregateStateView, EventStoreError> {
        let events = self.events_until_timestamp(id, at).await?;
        Self::build_view::<A>(id, events, self.registry.as_ref())
    }

    async fn events_until_version(
        &self,
        id: Uuid,
        at_version: i64,
    ) -> Result<Vec<RecordedEvent>, EventStoreError> {
        Ok(self
            .store
            .events_from_version(id, 0)
            .await?
            .into_iter()
            .filter(|event| event.version <= at_version)
            .collect())
    }

    async fn events_until_timestamp(
        &self,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<Vec<RecordedEvent>, EventStoreError> {
        Ok(self
            .store
            .events_from_version(id, 0)
            .await?
            .into_iter()
            .filter(|event| event.timestamp <= at)
            .collect())
    }

    fn build_view<A: Aggregate>(
        id: Uuid,
        events: Vec<RecordedEvent>,
        registry: &EventTypeRegistry,
    ) -> Result<AggregateStateView, EventStoreError> {
        let Some(last) = events.last() else {
            return Err(EventStoreError::NoEventsFound(id));
        };

        let as_of = last.timestamp;
        let aggregate: A = rehydrate(registry, id, &events)?;
        let state =
            serde_json::to_value(&aggregate).map_err(|source| EventStoreError::Serialization {
                event_type: A::aggregate_type().to_string(),
                source,
            })?;

        Ok(AggregateStateView {
            aggregate_id: id,
            aggregate_type: A::aggregate_type().to_string(),
            version: aggregate.version(),
            as_of,
            state,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
