use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::event_sourcing::core::RecordedEvent;

// ============================================================================
// Event Envelope - Transport-Only Wrapper
// ============================================================================
//
// Exists only on the wire, never in the store. camelCase JSON over the
// broker; a parallel header map carries the identifying fields as plain
// byte strings so consumers can filter without deserializing the payload.
//
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventEnvelope {
    pub event_id: Uuid,
    pub event_type: String,
    pub aggregate_id: Uuid,
    pub aggregate_type: String,
    pub version: i64,
    pub timestamp: DateTime<Utc>,
    pub user_id: Option<Uuid>,
    pub correlation_id: Uuid,
    pub causation_id: Option<Uuid>,
    /// Serialized event payload.
    pub data: serde_json::Value,
    pub metadata: HashMap<String, String>,
    pub topic: String,
    /// Partition key; defaults to the aggregate id so all events of one
    /// aggregate land in the same partition, in order.
    pub key: String,
    pub created_at: DateTime<Utc>,
}

impl EventEnvelope {
    pub fn wrap(event: &RecordedEvent, topic: &str, key: &str) -> Self {
        Self {
            event_id: event.id,
            event_type: event.event_type.clone(),
            aggregate_id: event.aggregate_id,
            aggregate_type: event.aggregate_type.clone(),
            version: event.version,
            timestamp: event.timestamp,
            user_id: event.user_id,
            correlation_id: event.correlation_id,
            causation_id: event.causation_id,
            data: event.data.clone(),
            metadata: event.metadata.clone(),
            topic: topic.to_string(),
            key: key.to_string(),
            created_at: Utc::now(),
        }
    }

    /// Header pairs for header-based filtering. Optional fields are present
    /// only when set.
    pub fn headers(&self) -> Vec<(&'static str, String)> {
        let mut headers = vec![
            ("eventType", self.event_type.clone()),
            ("aggregateType", self.aggregate_type.clone()),
            ("aggregateId", self.aggregate_id.to_string()),
            ("eventId", self.event_id.to_string()),
            ("correlationId", self.correlation_id.to_string()),
            ("timestamp", self.timestamp.to_rfc3339()),
            ("version", self.version.to_string()),
        ];
        if let Some(causation_id) = self.causation_id {
            headers.push(("causationId", causation_id.to_string()));
        }
        if let Some(user_id) = self.user_id {
            headers.push(("userId", user_id.to_string()));
        }
        headers
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_sourcing::core::{DomainEvent, EventContext};

    #[derive(Serialize, Deserialize, Clone, Debug)]
    struct SignalRaised {
        level: u8,
    }

    impl DomainEvent for SignalRaised {
        fn event_type(&self) -> &'static str {
            "SignalRaised"
        }
        fn event_names() -> &'static [&'static str] {
            &["SignalRaised"]
        }
    }

    fn sample_event() -> RecordedEvent {
        RecordedEvent::from_domain(
            Uuid::new_v4(),
            "Signal",
            1,
            &SignalRaised { level: 3 },
            &EventContext::new().with_user(Uuid::new_v4()),
        )
        .unwrap()
    }

    #[test]
    fn envelope_serializes_as_camel_case() {
        let event = sample_event();
        let envelope = EventEnvelope::wrap(&event, "signal-events", &event.aggregate_id.to_string());

        let json = serde_json::to_value(&envelope).unwrap();
        assert!(json.get("eventId").is_some());
        assert!(json.get("aggregateType").is_some());
        assert!(json.get("correlationId").is_some());
        assert!(json.get("createdAt").is_some());
        assert!(json.get("event_id").is_none());
    }

    #[test]
    fn envelope_round_trips_through_json() {
        let event = sample_event();
        let envelope = EventEnvelope::wrap(&event, "signal-events", "key-1");

        let bytes = serde_json::to_vec(&envelope).unwrap();
        let decoded: EventEnvelope = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(decoded.event_id, event.id);
        assert_eq!(decoded.topic, "signal-events");
        assert_eq!(decoded.key, "key-1");
        assert_eq!(decoded.data, event.data);
    }

    #[test]
    fn headers_carry_identity_fields() {
        let event = sample_event();
        let envelope = EventEnvelope::wrap(&event, "signal-events", "key-1");

        let headers = envelope.headers();
        let keys: Vec<&str> = headers.iter().map(|(k, _)| *k).collect();

        assert!(keys.contains(&"eventType"));
        assert!(keys.contains(&"aggregateId"));
        assert!(keys.contains(&"version"));
        assert!(keys.contains(&"userId"));
    }
}
