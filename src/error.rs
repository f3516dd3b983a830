use uuid::Uuid;

// ============================================================================
// Engine Error Taxonomy
// ============================================================================
//
// The store/repository/replay paths are STRICT: a payload that cannot be
// resolved or decoded aborts the operation, because the store is the
// durability boundary. The bus consumer is TOLERANT: it logs and skips
// (see messaging::consumer), since distribution is best-effort on top of
// the already-durable store.
//
// ============================================================================

/// Errors produced by the event store, repository, and replay paths.
#[derive(Debug, thiserror::Error)]
pub enum EventStoreError {
    /// The optimistic concurrency gate rejected an append. Never retried
    /// automatically; callers reload the aggregate and reapply.
    #[error("concurrency conflict on aggregate {aggregate_id}: expected version {expected}, but current version is {current}")]
    ConcurrencyConflict {
        aggregate_id: Uuid,
        expected: i64,
        current: i64,
    },

    #[error("aggregate {0} not found")]
    AggregateNotFound(Uuid),

    #[error("no events found for aggregate {0}")]
    NoEventsFound(Uuid),

    /// An event-type name with no registration. Unknown names fail loudly
    /// on the storage side.
    #[error("unknown event type: {0}")]
    UnknownEventType(String),

    #[error("failed to serialize {event_type} payload: {source}")]
    Serialization {
        event_type: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to deserialize {event_type} payload: {source}")]
    Deserialization {
        event_type: String,
        #[source]
        source: serde_json::Error,
    },

    /// A stored snapshot failed to decode. Whether the load aborts or falls
    /// back to a full replay is decided by the repository's SnapshotPolicy.
    #[error("snapshot for aggregate {aggregate_id} at version {version} is corrupt: {source}")]
    SnapshotCorrupt {
        aggregate_id: Uuid,
        version: i64,
        #[source]
        source: serde_json::Error,
    },

    /// An event id was appended twice. Event ids are globally unique.
    #[error("event {0} already exists")]
    DuplicateEvent(Uuid),

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

/// Errors surfaced by the publisher. Consumer-side transport failures are
/// logged inside the pull loop instead (there is no caller to report to).
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("send to topic {topic} failed: {reason}")]
    Send { topic: String, reason: String },

    #[error("broker client error: {0}")]
    Client(#[from] rdkafka::error::KafkaError),

    #[error("failed to encode envelope: {0}")]
    Encode(#[from] serde_json::Error),
}
