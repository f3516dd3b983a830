// ============================================================================
// Domain Aggregates
// ============================================================================
//
// Domain-specific code only; the generic engine lives in src/event_sourcing/.
//
// ============================================================================

pub mod family;
