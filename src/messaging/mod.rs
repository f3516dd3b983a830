// ============================================================================
// Messaging - Partitioned Event Distribution
// ============================================================================
//
// Publishes committed events to the broker and dispatches received events
// to registered typed handlers. At-least-once delivery; ordering is
// guaranteed only within one partition, which is why the partition key
// defaults to the aggregate id.
//
// ============================================================================

pub mod consumer;
pub mod envelope;
pub mod publisher;

pub use consumer::{EventConsumer, EventHandler};
pub use envelope::EventEnvelope;
pub use publisher::EventPublisher;
