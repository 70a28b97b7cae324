//! Schema-bound, buffered publishing to one provisioned topic.

use crate::error::{PublishError, Result};
use crate::registry::{key_subject, register_schema, value_subject, RegisteredSchema, SchemaRegistry};
use crate::sender::RecordSender;
use crate::topic::{TopicProvisioner, TopicSpec};
use cta_stations_types::{encode_framed, RecordSchema, SchemaBound};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Topic shape plus the key/value schemas bound to it.
#[derive(Debug, Clone)]
pub struct PublisherSpec {
    pub topic: TopicSpec,
    pub key_schema: RecordSchema,
    pub value_schema: RecordSchema,
}

impl PublisherSpec {
    pub fn new(topic: TopicSpec, key_schema: RecordSchema, value_schema: RecordSchema) -> Self {
        Self {
            topic,
            key_schema,
            value_schema,
        }
    }

    /// Spec whose schemas are taken from the key and value types.
    pub fn for_types<K: SchemaBound, V: SchemaBound>(topic: TopicSpec) -> Self {
        Self::new(topic, K::schema(), V::schema())
    }
}

/// Validates keys and values against the schemas registered for one topic and
/// encodes them with the registry frame header.
#[derive(Debug, Clone)]
pub struct RecordEncoder {
    topic: String,
    key_schema: RegisteredSchema,
    value_schema: RegisteredSchema,
}

impl RecordEncoder {
    /// Register both schemas for `topic` and build the encoder.
    pub async fn register(
        topic: &str,
        key_schema: RecordSchema,
        value_schema: RecordSchema,
        registry: &dyn SchemaRegistry,
    ) -> Result<Self> {
        let key_schema = register_schema(registry, &key_subject(topic), key_schema).await?;
        let value_schema = register_schema(registry, &value_subject(topic), value_schema).await?;
        Ok(Self {
            topic: topic.to_string(),
            key_schema,
            value_schema,
        })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn encode_key<K: Serialize + ?Sized>(&self, key: &K) -> Result<Vec<u8>> {
        self.encode_part("key", &self.key_schema, key)
    }

    pub fn encode_value<V: Serialize + ?Sized>(&self, value: &V) -> Result<Vec<u8>> {
        self.encode_part("value", &self.value_schema, value)
    }

    fn encode_part<T: Serialize + ?Sized>(
        &self,
        part: &'static str,
        registered: &RegisteredSchema,
        item: &T,
    ) -> Result<Vec<u8>> {
        let json = serde_json::to_value(item)?;
        registered
            .schema
            .validate(&json)
            .map_err(|violation| PublishError::SchemaMismatch {
                topic: self.topic.clone(),
                part,
                violation,
            })?;
        Ok(encode_framed(registered.id, &json)?)
    }
}

/// Result of draining a publisher at shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushResult {
    /// Records still queued when the timeout expired.
    pub remaining: usize,
    pub elapsed: Duration,
}

impl FlushResult {
    pub fn is_complete(&self) -> bool {
        self.remaining == 0
    }
}

/// Schema-bound publisher for one output topic.
///
/// `publish` only validates, encodes and enqueues; delivery to the broker is
/// asynchronous. `close` drains the queue within a bounded wait.
pub struct RecordPublisher {
    encoder: RecordEncoder,
    sender: Arc<dyn RecordSender>,
}

impl RecordPublisher {
    /// Provision the topic, register its schemas and wrap `sender`.
    ///
    /// A provisioning failure is logged and publication proceeds anyway, since
    /// the topic may exist through other means. Registry failures are fatal.
    pub async fn new(
        spec: PublisherSpec,
        provisioner: &TopicProvisioner,
        registry: &dyn SchemaRegistry,
        sender: Arc<dyn RecordSender>,
    ) -> Result<Self> {
        if let Err(e) = provisioner.ensure_topic(&spec.topic).await {
            warn!(
                "Continuing without confirmed topic '{}': {e}",
                spec.topic.name()
            );
        }

        let encoder = RecordEncoder::register(
            spec.topic.name(),
            spec.key_schema,
            spec.value_schema,
            registry,
        )
        .await?;

        Ok(Self { encoder, sender })
    }

    pub fn topic(&self) -> &str {
        self.encoder.topic()
    }

    /// Queue one record. Schema mismatches are returned before anything is
    /// buffered.
    pub fn publish<K, V>(&self, key: &K, value: &V) -> Result<()>
    where
        K: Serialize + ?Sized,
        V: Serialize + ?Sized,
    {
        let key = self.encoder.encode_key(key)?;
        let payload = self.encoder.encode_value(value)?;
        self.sender.enqueue(self.topic(), &key, &payload)?;
        debug!("Queued record for topic '{}'", self.topic());
        Ok(())
    }

    /// Drain the queue, waiting at most `timeout`. Blocks the calling thread.
    pub fn close(self, timeout: Duration) -> FlushResult {
        let started = Instant::now();
        let remaining = self.sender.flush(timeout);
        let result = FlushResult {
            remaining,
            elapsed: started.elapsed(),
        };

        if result.is_complete() {
            info!("Flushed producer queue for topic '{}'", self.topic());
        } else {
            warn!(
                "Producer close incomplete for topic '{}': {remaining} records not flushed after {timeout:?}",
                self.topic()
            );
        }
        result
    }
}
