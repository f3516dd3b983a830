use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ============================================================================
// Configuration Surface
// ============================================================================

/// Broker connectivity and delivery tuning, shared by the publisher and the
/// consumer (each reads the options relevant to its side).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Comma-separated bootstrap address list.
    pub brokers: String,
    pub client_id: String,
    /// Consumer group; unused by the publisher.
    pub group_id: String,
    /// "earliest" or "latest".
    pub auto_offset_reset: String,
    pub enable_auto_commit: bool,
    /// Offsets advance on this interval, not per message: a crash between
    /// processing and commit redelivers, so handlers must be idempotent.
    pub auto_commit_interval_ms: u64,
    pub security_protocol: String,
    pub message_timeout_ms: u64,
    pub batch_size: usize,
    pub linger_ms: u64,
    pub compression: String,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            brokers: "127.0.0.1:9092".to_string(),
            client_id: "eventline".to_string(),
            group_id: "eventline-consumers".to_string(),
            auto_offset_reset: "earliest".to_string(),
            enable_auto_commit: true,
            auto_commit_interval_ms: 5_000,
            security_protocol: "plaintext".to_string(),
            message_timeout_ms: 5_000,
            batch_size: 16_384,
            linger_ms: 5,
            compression: "snappy".to_string(),
            max_retries: 3,
            retry_backoff_ms: 100,
        }
    }
}

/// Static routing table: each aggregate type maps to exactly one topic;
/// unmapped types fall back to the catch-all integration topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicRouting {
    pub topics: HashMap<String, String>,
    pub fallback_topic: String,
}

impl Default for TopicRouting {
    fn default() -> Self {
        Self {
            topics: HashMap::new(),
            fallback_topic: "integration-events".to_string(),
        }
    }
}

impl TopicRouting {
    pub fn with_topic(mut self, aggregate_type: &str, topic: &str) -> Self {
        self.topics
            .insert(aggregate_type.to_string(), topic.to_string());
        self
    }

    pub fn route(&self, aggregate_type: &str) -> &str {
        self.topics
            .get(aggregate_type)
            .map(String::as_str)
            .unwrap_or(&self.fallback_topic)
    }
}

/// Snapshot cadence and the corrupt-snapshot policy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SnapshotConfig {
    /// A snapshot is persisted whenever the committed version is a multiple
    /// of this frequency; 0 disables snapshots.
    pub frequency: i64,
    pub policy: SnapshotPolicy,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            frequency: 100,
            policy: SnapshotPolicy::FailFast,
        }
    }
}

/// What a load does when a stored snapshot fails to decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SnapshotPolicy {
    /// Abort the load; snapshots are expected to be trustworthy.
    FailFast,
    /// Discard the snapshot and replay from version 0.
    FallbackToReplay,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routing_falls_back_to_the_catch_all_topic() {
        let routing = TopicRouting::default().with_topic("Family", "family-events");

        assert_eq!(routing.route("Family"), "family-events");
        assert_eq!(routing.route("Unmapped"), "integration-events");
    }
}
