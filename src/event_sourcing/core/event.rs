use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::EventStoreError;

// ============================================================================
// Events - Immutable, Append-Only Facts
// ============================================================================
//
// A domain event is created once by a caller, never mutated, never deleted.
// `RecordedEvent` is the storage representation: the payload is an opaque
// JSON blob tagged with its event-type name, resolved back to a concrete
// type through the EventTypeRegistry.
//
// ============================================================================

/// Implemented by every event type that flows through the engine.
///
/// An event enum (one variant per fact) reports the concrete variant name
/// from `event_type` and lists every variant name in `event_names`; a
/// standalone event lists just its own name. The name set is what the
/// registry and the consumer's dispatch table match against.
pub trait DomainEvent: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Stable name stored in the `event_type` column for this value.
    fn event_type(&self) -> &'static str;

    /// Every event-type name this type can decode.
    fn event_names() -> &'static [&'static str];
}

/// A committed (or about-to-be-committed) event in its storage form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordedEvent {
    pub id: Uuid,
    pub aggregate_id: Uuid,
    pub aggregate_type: String,
    pub event_type: String,
    /// Opaque serialized payload; decoded through the registry/type system.
    pub data: serde_json::Value,
    pub metadata: HashMap<String, String>,
    /// Strictly increasing per aggregate, no gaps, starting at 1.
    pub version: i64,
    pub timestamp: DateTime<Utc>,
    pub user_id: Option<Uuid>,
    /// Groups events of one causal flow across aggregates.
    pub correlation_id: Uuid,
    /// Id of the command/event that produced this one.
    pub causation_id: Option<Uuid>,
}

impl RecordedEvent {
    /// Serialize a domain event into its storage form.
    pub fn from_domain<E: DomainEvent>(
        aggregate_id: Uuid,
        aggregate_type: &str,
        version: i64,
        event: &E,
        context: &EventContext,
    ) -> Result<Self, EventStoreError> {
        let data =
            serde_json::to_value(event).map_err(|source| EventStoreError::Serialization {
                event_type: event.event_type().to_string(),
                source,
            })?;

        Ok(Self {
            id: Uuid::new_v4(),
            aggregate_id,
            aggregate_type: aggregate_type.to_string(),
            event_type: event.event_type().to_string(),
            data,
            metadata: context.metadata.clone(),
            version,
            timestamp: Utc::now(),
            user_id: context.user_id,
            correlation_id: context.correlation_id,
            causation_id: context.causation_id,
        })
    }

    /// Decode the opaque payload back into a typed event. Strict: a payload
    /// that does not match the target type is an error, not a skip.
    pub fn decode<E: DomainEvent>(&self) -> Result<E, EventStoreError> {
        serde_json::from_value(self.data.clone()).map_err(|source| {
            EventStoreError::Deserialization {
                event_type: self.event_type.clone(),
                source,
            }
        })
    }
}

// ============================================================================
// Event Context - Actor and Causality Metadata
// ============================================================================

/// Carried alongside a save so every recorded event is stamped with who
/// acted and which causal flow it belongs to.
#[derive(Debug, Clone)]
pub struct EventContext {
    pub user_id: Option<Uuid>,
    pub correlation_id: Uuid,
    pub causation_id: Option<Uuid>,
    pub metadata: HashMap<String, String>,
}

impl EventContext {
    pub fn new() -> Self {
        Self {
            user_id: None,
            correlation_id: Uuid::new_v4(),
            causation_id: None,
            metadata: HashMap::new(),
        }
    }

    pub fn with_user(mut self, user_id: Uuid) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn with_correlation(mut self, correlation_id: Uuid) -> Self {
        self.correlation_id = correlation_id;
        self
    }

    pub fn with_causation(mut self, causation_id: Uuid) -> Self {
        self.causation_id = Some(causation_id);
        self
    }

    pub fn with_metadata(mut self, key: &str, value: &str) -> Self {
        self.metadata.insert(key.to_string(), value.to_string());
        self
    }
}

impl Default for EventContext {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================
