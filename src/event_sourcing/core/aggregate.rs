use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

use super::event::{DomainEvent, RecordedEvent};
use crate::error::EventStoreError;
use crate::registry::EventTypeRegistry;

// ============================================================================
// Aggregate Root - Event Sourcing Core
// ============================================================================
//
// State is derived entirely by replaying events in ascending version order
// against an empty initial state. Commands are validated against current
// state and emit events; events are facts that have already happened.
//
// An aggregate carries a transient list of uncommitted events produced by
// in-memory mutation. The list is cleared only after a successful store
// append; until then the events are not durable.
//
// ============================================================================

/// Implemented by every event-sourced aggregate.
///
/// `Serialize`/`DeserializeOwned` exist so the repository can materialize
/// snapshots of aggregate state; the uncommitted list must be excluded from
/// that representation (`#[serde(skip)]` on the field).
pub trait Aggregate: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    type Event: DomainEvent;
    type Command;
    type Error: std::error::Error + Send + Sync + 'static;

    /// Stable name stored in the `aggregate_type` column and used for
    /// topic routing.
    fn aggregate_type() -> &'static str;

    /// The empty initial state replay starts from.
    fn empty(id: Uuid) -> Self;

    fn id(&self) -> Uuid;

    /// Version of the last applied event; 0 for a fresh aggregate.
    fn version(&self) -> i64;

    fn set_version(&mut self, version: i64);

    /// Mutate state from an event. Must be deterministic: replaying the
    /// same ordered events twice yields identical state.
    fn apply(&mut self, event: &Self::Event);

    /// Validate a command against current state and emit the resulting
    /// events without mutating anything.
    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error>;

    /// Events produced by in-memory mutation, not yet flushed to the store.
    fn uncommitted_events(&self) -> &[Self::Event];

    /// Apply an event and queue it as uncommitted. Versions are assigned by
    /// the repository at save time.
    fn record(&mut self, event: Self::Event);

    /// Clear the uncommitted list after a successful append.
    fn mark_committed(&mut self);
}

/// Rebuild an aggregate from recorded events, starting at empty state.
///
/// Strict path: every event-type name must be registered and every payload
/// must decode, otherwise the whole load aborts.
pub fn rehydrate<A: Aggregate>(
    registry: &EventTypeRegistry,
    aggregate_id: Uuid,
    events: &[RecordedEvent],
) -> Result<A, EventStoreError> {
    let mut aggregate = A::empty(aggregate_id);
    apply_recorded(registry, &mut aggregate, events)?;
    Ok(aggregate)
}

/// Apply recorded events in order onto existing aggregate state.
pub fn apply_recorded<A: Aggregate>(
    registry: &EventTypeRegistry,
    aggregate: &mut A,
    events: &[RecordedEvent],
) -> Result<(), EventStoreError> {
    for recorded in events {
        registry.ensure_known(&recorded.event_type)?;
        let event = recorded.decode::<A::Event>()?;
        aggregate.apply(&event);
        aggregate.set_version(recorded.version);
    }
    Ok(())
}
