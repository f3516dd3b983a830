use rdkafka::config::ClientConfig;
use rdkafka::message::{Header, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use std::time::Duration;

use super::envelope::EventEnvelope;
use crate::config::{BrokerConfig, TopicRouting};
use crate::error::TransportError;
use crate::event_sourcing::core::RecordedEvent;
use crate::utils::{retry_with_backoff, RetryConfig};

// ============================================================================
// Event Publisher
// ============================================================================
//
// Republishes committed events on the partitioned log. Delivery settings:
// idempotent producer, acknowledge from all replicas, bounded retries with
// exponential backoff. A hard send failure propagates to the caller;
// publish is synchronous from the caller's perspective even though the
// transport underneath is asynchronous.
//
// A single publisher instance is safe for concurrent use from multiple
// tasks.
//
// ============================================================================

pub struct EventPublisher {
    producer: FutureProducer,
    routing: TopicRouting,
    config: BrokerConfig,
    retry: RetryConfig,
}

impl EventPublisher {
    pub fn new(config: BrokerConfig, routing: TopicRouting) -> Result<Self, TransportError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .set("client.id", &config.client_id)
            .set("enable.idempotence", "true")
            .set("acks", "all")
            .set("message.timeout.ms", config.message_timeout_ms.to_string())
            .set("batch.size", config.batch_size.to_string())
            .set("linger.ms", config.linger_ms.to_string())
            .set("compression.type", &config.compression)
            .set("security.protocol", &config.security_protocol)
            .create()?;

        let retry = RetryConfig::from_broker(config.max_retries, config.retry_backoff_ms);

        Ok(Self {
            producer,
            routing,
            config,
            retry,
        })
    }

    /// Publish one committed event. With no explicit topic, the routing
    /// table resolves one from the aggregate type; with no explicit key,
    /// the aggregate id preserves per-aggregate ordering.
    pub async fn publish(
        &self,
        event: &RecordedEvent,
        topic: Option<&str>,
        key: Option<&str>,
    ) -> Result<(), TransportError> {
        let topic = resolve_topic(&self.routing, &event.aggregate_type, topic).to_string();
        let aggregate_key = event.aggregate_id.to_string();
        let key = key.unwrap_or(&aggregate_key).to_string();

        let envelope = EventEnvelope::wrap(event, &topic, &key);
        let payload = serde_json::to_string(&envelope)?;
        let headers = build_headers(&envelope);

        retry_with_backoff(&self.retry, |_attempt| {
            self.send_once(&topic, &key, &payload, &headers)
        })
        .await?;

        tracing::info!(
            topic = %topic,
            key = %key,
            event_type = %event.event_type,
            version = event.version,
            "published event"
        );

        Ok(())
    }

    /// Publish every event concurrently and wait for all sends.
    ///
    /// Not atomic: a partial failure leaves some events published and
    /// others not; any all-or-nothing requirement belongs upstream.
    pub async fn publish_batch(
        &self,
        events: &[RecordedEvent],
        topic: Option<&str>,
    ) -> Result<(), TransportError> {
        let sends = events.iter().map(|event| self.publish(event, topic, None));
        let results = futures_util::future::join_all(sends).await;

        let failed = results.iter().filter(|result| result.is_err()).count();
        if failed > 0 {
            tracing::error!(
                total = events.len(),
                failed = failed,
                "batch publish finished with partial results"
            );
        }

        results.into_iter().collect()
    }

    async fn send_once(
        &self,
        topic: &str,
        key: &str,
        payload: &str,
        headers: &OwnedHeaders,
    ) -> Result<(), TransportError> {
        let record = FutureRecord::to(topic)
            .key(key)
            .payload(payload)
            .headers(headers.clone());

        self.producer
            .send(
                record,
                Timeout::After(Duration::from_millis(self.config.message_timeout_ms)),
            )
            .await
            .map(|_delivery| ())
            .map_err(|(err, _message)| TransportError::Send {
                topic: topic.to_string(),
                reason: err.to_string(),
            })
    }
}

fn resolve_topic<'a>(
    routing: &'a TopicRouting,
    aggregate_type: &str,
    explicit: Option<&'a str>,
) -> &'a str {
    match explicit {
        Some(topic) => topic,
        None => routing.route(aggregate_type),
    }
}

fn build_headers(envelope: &EventEnvelope) -> OwnedHeaders {
    let mut headers = OwnedHeaders::new();
    for (key, value) in envelope.headers() {
        headers = headers.insert(Header {
            key,
            value: Some(value.as_bytes()),
        });
    }
    headers
}

// ============================================================================
// Tests
// ============================================================================
