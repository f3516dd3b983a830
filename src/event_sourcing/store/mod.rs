// ============================================================================
// Event Sourcing Store - Persistence Layer
// ============================================================================
//
// One contract, two backends: Postgres for production, in-memory for tests
// and local development.
//
// ============================================================================

pub mod event_store;
pub mod memory;
pub mod postgres;
pub mod schema;
pub mod snapshot;

pub use event_store::{EventStore, Page};
pub use memory::InMemoryEventStore;
pub use postgres::PgEventStore;
pub use schema::ensure_schema;
pub use snapshot::Snapshot;
