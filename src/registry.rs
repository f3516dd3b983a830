use std::collections::HashMap;
use std::sync::Arc;

use crate::error::EventStoreError;
use crate::event_sourcing::core::DomainEvent;

// ============================================================================
// Event Type Registry
// ============================================================================
//
// Built once at startup from an explicit list of registered event types and
// handed to the components that need it. There is no ambient discovery and
// no process-wide mutable state: the registry an instance receives is the
// registry it uses.
//
// The storage side consults it strictly (`ensure_known` fails loudly on an
// unregistered name); the bus consumer consults it tolerantly (`contains`,
// then log-and-skip).
//
// ============================================================================

type PayloadCheck = Arc<dyn Fn(&serde_json::Value) -> Result<(), serde_json::Error> + Send + Sync>;

#[derive(Clone)]
struct Registration {
    /// Rust type the name resolves to, for diagnostics.
    type_name: &'static str,
    check: PayloadCheck,
}

/// Maps declared event-type names to payload decoders and back.
#[derive(Clone, Default)]
pub struct EventTypeRegistry {
    entries: HashMap<&'static str, Registration>,
}

impl EventTypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an event type under every name it declares. An event enum
    /// claims one name per variant; re-registering a name overwrites the
    /// previous claim (last registration wins).
    pub fn register<E: DomainEvent>(&mut self) {
        for name in E::event_names() {
            self.entries.insert(
                *name,
                Registration {
                    type_name: std::any::type_name::<E>(),
                    check: Arc::new(|value| {
                        serde_json::from_value::<E>(value.clone()).map(|_| ())
                    }),
                },
            );
        }
    }

    /// Builder-style registration for startup wiring.
    pub fn with<E: DomainEvent>(mut self) -> Self {
        self.register::<E>();
        self
    }

    pub fn contains(&self, event_type: &str) -> bool {
        self.entries.contains_key(event_type)
    }

    /// Rust type a name resolves to, if registered.
    pub fn resolve(&self, event_type: &str) -> Option<&'static str> {
        self.entries.get(event_type).map(|r| r.type_name)
    }

    /// All registered names, unordered.
    pub fn names(&self) -> Vec<&'static str> {
        self.entries.keys().copied().collect()
    }

    /// Strict lookup used on the storage side.
    pub fn ensure_known(&self, event_type: &str) -> Result<(), EventStoreError> {
        if self.contains(event_type) {
            Ok(())
        } else {
            Err(EventStoreError::UnknownEventType(event_type.to_string()))
        }
    }

    /// Strict payload validation: the name must be registered and the
    /// payload must decode into the registered type.
    pub fn check_payload(
        &self,
        event_type: &str,
        payload: &serde_json::Value,
    ) -> Result<(), EventStoreError> {
        let registration = self
            .entries
            .get(event_type)
            .ok_or_else(|| EventStoreError::UnknownEventType(event_type.to_string()))?;

        (registration.check)(payload).map_err(|source| EventStoreError::Deserialization {
            event_type: event_type.to_string(),
            source,
        })
    }
}

impl std::fmt::Debug for EventTypeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventTypeRegistry")
            .field("names", &self.names())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize, Clone, Debug)]
    #[serde(tag = "type", content = "data")]
    enum CounterEvent {
        Incremented { by: u32 },
        Reset,
    }

    impl DomainEvent for CounterEvent {
        fn event_type(&self) -> &'static str {
            match self {
                CounterEvent::Incremented { .. } => "CounterIncremented",
                CounterEvent::Reset => "CounterReset",
            }
        }
        fn event_names() -> &'static [&'static str] {
            &["CounterIncremented", "CounterReset"]
        }
    }

    #[test]
    fn registers_every_declared_name() {
        let registry = EventTypeRegistry::new().with::<CounterEvent>();

        assert!(registry.contains("CounterIncremented"));
        assert!(registry.contains("CounterReset"));
        assert!(!registry.contains("CounterDeleted"));

        let resolved = registry.resolve("CounterReset").unwrap();
        assert!(resolved.contains("CounterEvent"));
        assert!(registry.resolve("CounterDeleted").is_none());
    }

    #[test]
    fn ensure_known_fails_loudly_for_unregistered_names() {
        let registry = EventTypeRegistry::new().with::<CounterEvent>();

        let result = registry.ensure_known("SomethingElse");
        assert!(matches!(result, Err(EventStoreError::UnknownEventType(name)) if name == "SomethingElse"));
    }

    #[test]
    fn check_payload_validates_against_registered_type() {
        let registry = EventTypeRegistry::new().with::<CounterEvent>();
        let good = serde_json::json!({"type": "Incremented", "data": {"by": 3}});
        let bad = serde_json::json!({"type": "Incremented", "data": {"by": "three"}});

        assert!(registry.check_payload("CounterIncremented", &good).is_ok());
        assert!(matches!(
            registry.check_payload("CounterIncremented", &bad),
            Err(EventStoreError::Deserialization { .. })
        ));
    }
}
