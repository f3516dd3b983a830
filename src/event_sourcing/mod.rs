// ============================================================================
// Event Sourcing Engine
// ============================================================================
//
// Generic, reusable event sourcing infrastructure: core abstractions, the
// persistence layer, the aggregate repository, and the replay/audit
// service. Domain-specific code lives in src/domain/.
//
// ============================================================================

pub mod core;
pub mod repository;
pub mod replay;
pub mod store;

pub use self::core::{Aggregate, DomainEvent, EventContext, RecordedEvent};
pub use replay::{AggregateStateView, ReplayService};
pub use repository::AggregateRepository;
pub use store::{ensure_schema, EventStore, InMemoryEventStore, Page, PgEventStore, Snapshot};
