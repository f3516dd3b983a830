use async_trait::async_trait;
use futures_util::future::BoxFuture;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::Message;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::envelope::EventEnvelope;
use crate::config::BrokerConfig;
use crate::error::TransportError;
use crate::event_sourcing::core::DomainEvent;
use crate::registry::EventTypeRegistry;

// ============================================================================
// Event Consumer
// ============================================================================
//
// One background pull loop per process drives all subscriptions. Dispatch
// is TOLERANT: an envelope that fails to decode, or an event type with no
// registration, is logged and skipped - distribution is best-effort on top
// of the already-durable store (the storage side is strict instead).
//
// Offsets advance on the auto-commit interval, not per message, so a crash
// between processing and commit redelivers: handlers must be idempotent.
//
// ============================================================================

/// A typed subscriber. Handlers for different declared event types may
/// share a topic; every handler whose declared type covers a message's
/// event-type name runs, concurrently with its peers.
#[async_trait]
pub trait EventHandler<E: DomainEvent>: Send + Sync {
    async fn handle(&self, event: E, envelope: &EventEnvelope) -> anyhow::Result<()>;
}

enum DispatchError {
    /// Payload did not decode into the handler's declared type; tolerated.
    Decode(serde_json::Error),
    /// The handler itself failed; logged, the loop keeps running.
    Handler(anyhow::Error),
}

type DispatchFn =
    Arc<dyn Fn(Arc<EventEnvelope>) -> BoxFuture<'static, Result<(), DispatchError>> + Send + Sync>;

#[derive(Clone)]
struct Registration {
    handler_name: &'static str,
    /// Names the declared type covers; an event enum covers every variant.
    event_names: &'static [&'static str],
    dispatch: DispatchFn,
}

impl Registration {
    fn accepts(&self, event_type: &str) -> bool {
        self.event_names.contains(&event_type)
    }
}

pub struct EventConsumer {
    config: BrokerConfig,
    registry: Arc<EventTypeRegistry>,
    handlers: HashMap<String, Vec<Registration>>,
    shutdown: Option<watch::Sender<bool>>,
    task: Option<JoinHandle<()>>,
}

impl EventConsumer {
    pub fn new(config: BrokerConfig, registry: Arc<EventTypeRegistry>) -> Self {
        Self {
            config,
            registry,
            handlers: HashMap::new(),
            shutdown: None,
            task: None,
        }
    }

    /// Register a typed handler against a topic. Takes effect at the next
    /// `start`.
    pub fn subscribe<E, H>(&mut self, topic: &str, handler: Arc<H>)
    where
        E: DomainEvent,
        H: EventHandler<E> + 'static,
    {
        let dispatch: DispatchFn = Arc::new(move |envelope: Arc<EventEnvelope>| {
            let handler = handler.clone();
            Box::pin(async move {
                let event: E = serde_json::from_value(envelope.data.clone())
                    .map_err(DispatchError::Decode)?;
                handler
                    .handle(event, &envelope)
                    .await
                    .map_err(DispatchError::Handler)
            })
        });

        self.handlers
            .entry(topic.to_string())
            .or_default()
            .push(Registration {
                handler_name: std::any::type_name::<H>(),
                event_names: E::event_names(),
                dispatch,
            });
    }

    /// Subscribe to the union of all registered topics and launch the pull
    /// loop. Idempotent while running.
    pub fn start(&mut self) -> Result<(), TransportError> {
        if self.task.is_some() {
            return Ok(());
        }

        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &self.config.brokers)
            .set("client.id", &self.config.client_id)
            .set("group.id", &self.config.group_id)
            .set("auto.offset.reset", &self.config.auto_offset_reset)
            .set(
                "enable.auto.commit",
                if self.config.enable_auto_commit {
                    "true"
                } else {
                    "false"
                },
            )
            .set(
                "auto.commit.interval.ms",
                self.config.auto_commit_interval_ms.to_string(),
            )
            .set("security.protocol", &self.config.security_protocol)
            .create()?;

        let topics: Vec<String> = self.handlers.keys().cloned().collect();
        let topic_refs: Vec<&str> = topics.iter().map(String::as_str).collect();
        consumer.subscribe(&topic_refs)?;

        let (tx, rx) = watch::channel(false);
        self.shutdown = Some(tx);
        self.task = Some(tokio::spawn(run_loop(
            consumer,
            self.handlers.clone(),
            self.registry.clone(),
            rx,
        )));

        tracing::info!(topics = ?topics, group_id = %self.config.group_id, "consumer started");
        Ok(())
    }

    /// Signal cancellation and wait for the loop to exit; the broker
    /// connection closes when the loop's consumer is dropped. A message
    /// already pulled finishes its handler dispatch first, so a forced
    /// shutdown may double-process at most one in-flight message on
    /// restart.
    pub async fn stop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(true);
        }
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                tracing::error!(error = %err, "consumer loop task failed");
            }
        }
        tracing::info!("consumer stopped");
    }
}

async fn run_loop(
    consumer: StreamConsumer,
    handlers: HashMap<String, Vec<Registration>>,
    registry: Arc<EventTypeRegistry>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            received = consumer.recv() => match received {
                Ok(message) => {
                    let payload = message.payload().unwrap_or_default();
                    dispatch_message(message.topic(), payload, &handlers, &registry).await;
                }
                Err(err) => {
                    // Loop-level failure, not an individual message: back
                    // off briefly instead of spinning on the error.
                    tracing::error!(error = %err, "consumer poll failed");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }
    }
    tracing::info!("consumer loop exited");
}

async fn dispatch_message(
    topic: &str,
    payload: &[u8],
    handlers: &HashMap<String, Vec<Registration>>,
    registry: &EventTypeRegistry,
) {
    let envelope: EventEnvelope = match serde_json::from_slice(payload) {
        Ok(envelope) => envelope,
        Err(err) => {
            tracing::warn!(
                topic = %topic,
                error = %err,
                "skipping message with undecodable envelope"
            );
            return;
        }
    };

    if !registry.contains(&envelope.event_type) {
        tracing::warn!(
            topic = %topic,
            event_type = %envelope.event_type,
            "skipping message with unregistered event type"
        );
        return;
    }

    let Some(registrations) = handlers.get(topic) else {
        return;
    };

    let matching: Vec<&Registration> = registrations
        .iter()
        .filter(|registration| registration.accepts(&envelope.event_type))
        .collect();

    if matching.is_empty() {
        tracing::debug!(
            topic = %topic,
            event_type = %envelope.event_type,
            "no handler declared for event type"
        );
        return;
    }

    let envelope = Arc::new(envelope);
    let dispatches = matching
        .iter()
        .map(|registration| (registration.dispatch)(envelope.clone()));
    let results = futures_util::future::join_all(dispatches).await;

    for (registration, result) in matching.iter().zip(results) {
        match result {
            Ok(()) => {}
            Err(DispatchError::Decode(err)) => {
                tracing::warn!(
                    handler = registration.handler_name,
                    event_type = %envelope.event_type,
                    error = %err,
                    "skipping event the handler could not decode"
                );
            }
            Err(DispatchError::Handler(err)) => {
                tracing::error!(
                    handler = registration.handler_name,
                    event_type = %envelope.event_type,
                    error = %err,
                    "event handler failed"
                );
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
