use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::EventStoreError;
use crate::event_sourcing::core::Aggregate;

// ============================================================================
// Snapshot - Derived Cache of Aggregate State
// ============================================================================
//
// Never authoritative: a snapshot at version V must be consistent with
// applying events 1..V in order, and its version never exceeds the latest
// stored event version for the aggregate. The replay/audit service ignores
// snapshots entirely.
//
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: Uuid,
    pub aggregate_id: Uuid,
    pub aggregate_type: String,
    /// Serialized aggregate state at `version`.
    pub data: serde_json::Value,
    pub version: i64,
    pub timestamp: DateTime<Utc>,
}

impl Snapshot {
    /// Materialize a snapshot from the aggregate's current state.
    pub fn of_aggregate<A: Aggregate>(aggregate: &A) -> Result<Self, EventStoreError> {
        let data =
            serde_json::to_value(aggregate).map_err(|source| EventStoreError::Serialization {
                event_type: A::aggregate_type().to_string(),
                source,
            })?;

        Ok(Self {
            id: Uuid::new_v4(),
            aggregate_id: aggregate.id(),
            aggregate_type: A::aggregate_type().to_string(),
            data,
            version: aggregate.version(),
            timestamp: Utc::now(),
        })
    }

    /// Decode the stored state back into an aggregate. The caller decides
    /// what a failure means (fail fast vs fall back to full replay).
    pub fn restore<A: Aggregate>(&self) -> Result<A, EventStoreError> {
        let mut aggregate: A = serde_json::from_value(self.data.clone()).map_err(|source| {
            EventStoreError::SnapshotCorrupt {
                aggregate_id: self.aggregate_id,
                version: self.version,
                source,
            }
        })?;
        aggregate.set_version(self.version);
        Ok(aggregate)
    }
}
