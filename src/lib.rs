//! Event-sourcing and event-distribution engine.
//!
//! Application state is persisted as an ordered, append-only sequence of
//! immutable events per aggregate, reconstructed by replay, and distributed
//! to other processes over a partitioned log. The event store is the single
//! source of truth and the only place optimistic concurrency is enforced;
//! snapshots are a derived cache that bounds replay cost and is never
//! authoritative.

pub mod config;
pub mod domain;
pub mod error;
pub mod event_sourcing;
pub mod messaging;
pub mod registry;
pub mod utils;

pub use config::{BrokerConfig, SnapshotConfig, SnapshotPolicy, TopicRouting};
pub use error::{EventStoreError, TransportError};
pub use event_sourcing::{
    Aggregate, AggregateRepository, AggregateStateView, DomainEvent, EventContext, EventStore,
    InMemoryEventStore, Page, PgEventStore, RecordedEvent, ReplayService, Snapshot,
};
pub use messaging::{EventConsumer, EventEnvelope, EventHandler, EventPublisher};
pub use registry::EventTypeRegistry;
