use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::snapshot::Snapshot;
use crate::error::EventStoreError;
use crate::event_sourcing::core::RecordedEvent;

// ============================================================================
// Event Store - Append-Only Persistence Contract
// ============================================================================
//
// The single source of truth and the only place optimistic concurrency is
// enforced. Per-aggregate reads are ordered by version ascending (the only
// ordering the engine promises); the audit scans are ordered by timestamp
// descending and callers must not assume the two orderings are equivalent.
//
// ============================================================================

/// 1-based page request for the audit/search scans.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub number: u32,
    pub size: u32,
}

impl Page {
    pub fn new(number: u32, size: u32) -> Self {
        Self {
            number: number.max(1),
            size,
        }
    }

    pub fn offset(&self) -> usize {
        ((self.number - 1) as usize) * (self.size as usize)
    }
}

#[async_trait]
pub trait EventStore: Send + Sync {
    /// Events with `version > from_version`, ascending by version. The
    /// replay read: pass 0 for the full stream.
    async fn events_from_version(
        &self,
        aggregate_id: Uuid,
        from_version: i64,
    ) -> Result<Vec<RecordedEvent>, EventStoreError>;

    /// Events with `timestamp >= from`, ascending by timestamp.
    async fn events_from_timestamp(
        &self,
        aggregate_id: Uuid,
        from: DateTime<Utc>,
    ) -> Result<Vec<RecordedEvent>, EventStoreError>;

    /// Audit scan across aggregates, descending by timestamp.
    async fn events_by_type(
        &self,
        event_type: &str,
        page: Page,
    ) -> Result<Vec<RecordedEvent>, EventStoreError>;

    /// Audit scan across aggregates, descending by timestamp.
    async fn events_by_aggregate_type(
        &self,
        aggregate_type: &str,
        page: Page,
    ) -> Result<Vec<RecordedEvent>, EventStoreError>;

    /// Audit scan across aggregates, descending by timestamp.
    async fn events_by_user(
        &self,
        user_id: Uuid,
        page: Page,
    ) -> Result<Vec<RecordedEvent>, EventStoreError>;

    /// Causal chain across aggregates, ascending by timestamp.
    async fn events_by_correlation(
        &self,
        correlation_id: Uuid,
    ) -> Result<Vec<RecordedEvent>, EventStoreError>;

    /// The concurrency gate: compare the aggregate's current latest version
    /// against `expected_version` and append every event in order, or fail
    /// with `ConcurrencyConflict` without a partial append. Returns the new
    /// latest version.
    ///
    /// The compare step is a fast-path rejection; the uniqueness constraint
    /// on (aggregate_id, version) underneath is what makes the protocol
    /// airtight under true concurrency.
    async fn append(
        &self,
        aggregate_id: Uuid,
        events: &[RecordedEvent],
        expected_version: i64,
    ) -> Result<i64, EventStoreError>;

    /// Append a single event unconditionally (no version comparison).
    async fn append_one(&self, event: &RecordedEvent) -> Result<(), EventStoreError>;

    /// Latest snapshot by version, if any.
    async fn latest_snapshot(
        &self,
        aggregate_id: Uuid,
    ) -> Result<Option<Snapshot>, EventStoreError>;

    async fn save_snapshot(&self, snapshot: &Snapshot) -> Result<(), EventStoreError>;

    /// Idempotency check on the globally unique event id.
    async fn event_exists(&self, event_id: Uuid) -> Result<bool, EventStoreError>;

    /// 0 if the aggregate has no events.
    async fn latest_version(&self, aggregate_id: Uuid) -> Result<i64, EventStoreError>;
}
