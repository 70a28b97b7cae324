use crate::error::{StreamError, TableError};
use crate::table::Changelog;
use async_trait::async_trait;
use cta_stations_kafka_producer::{RecordEncoder, SchemaRegistry, TopicProvisioner, TopicSpec};
use cta_stations_types::{decode_record, RecordParseError, SchemaBound};
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{BaseConsumer, Consumer as RdkafkaConsumer};
use rdkafka::message::Message as RdkafkaMessage;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::{Offset, TopicPartitionList};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Changelog stored in a Kafka topic.
///
/// Writes wait for the broker acknowledgement (`acks=all`, idempotent producer,
/// so per-partition order is kept across retries). Replay reads every partition
/// from the beginning up to the high watermark observed when replay started.
pub struct KafkaChangelog<K, V> {
    topic: TopicSpec,
    brokers: String,
    producer: FutureProducer,
    encoder: RecordEncoder,
    send_timeout: Duration,
    idle_timeout: Duration,
    _records: PhantomData<fn() -> (K, V)>,
}

impl<K, V> KafkaChangelog<K, V>
where
    K: SchemaBound + Serialize + DeserializeOwned + Send + Sync + 'static,
    V: SchemaBound + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    pub async fn new(
        brokers: &str,
        topic: TopicSpec,
        provisioner: &TopicProvisioner,
        registry: &dyn SchemaRegistry,
    ) -> Result<Self, StreamError> {
        if let Err(e) = provisioner.ensure_topic(&topic).await {
            warn!("Continuing without confirmed changelog topic '{}': {e}", topic.name());
        }

        let encoder =
            RecordEncoder::register(topic.name(), K::schema(), V::schema(), registry).await?;

        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("acks", "all")
            .set("enable.idempotence", "true")
            .set("message.timeout.ms", "30000")
            .create()?;

        Ok(Self {
            topic,
            brokers: brokers.to_string(),
            producer,
            encoder,
            send_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(10),
            _records: PhantomData,
        })
    }

    /// How long replay waits for the next record before giving up.
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }
}

#[async_trait]
impl<K, V> Changelog<K, V> for KafkaChangelog<K, V>
where
    K: SchemaBound + Serialize + DeserializeOwned + Send + Sync + 'static,
    V: SchemaBound + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    async fn append(&self, key: &K, value: &V) -> Result<(), TableError> {
        let key = self.encoder.encode_key(key)?;
        let payload = self.encoder.encode_value(value)?;
        let record = FutureRecord::to(self.topic.name())
            .key(&key)
            .payload(&payload);

        self.producer
            .send(record, self.send_timeout)
            .await
            .map_err(|(err, _)| TableError::ChangelogWrite {
                topic: self.topic.name().to_string(),
                reason: err.to_string(),
            })?;
        Ok(())
    }

    async fn replay(&self) -> Result<Vec<(K, V)>, TableError> {
        let topic = self.topic.name().to_string();
        let partitions = self.topic.partitions();
        let brokers = self.brokers.clone();
        let idle_timeout = self.idle_timeout;

        let replay_topic = topic.clone();
        tokio::task::spawn_blocking(move || {
            replay_partitions::<K, V>(&brokers, &replay_topic, partitions, idle_timeout)
        })
        .await
        .map_err(|e| TableError::Replay {
            topic,
            reason: format!("replay task failed: {e}"),
        })?
    }

    fn name(&self) -> &str {
        self.topic.name()
    }
}

fn replay_partitions<K, V>(
    brokers: &str,
    topic: &str,
    partitions: i32,
    idle_timeout: Duration,
) -> Result<Vec<(K, V)>, TableError>
where
    K: SchemaBound + DeserializeOwned,
    V: SchemaBound + DeserializeOwned,
{
    let replay_error = |reason: String| TableError::Replay {
        topic: topic.to_string(),
        reason,
    };

    let consumer: BaseConsumer = ClientConfig::new()
        .set("bootstrap.servers", brokers)
        .set("group.id", format!("{topic}-replay"))
        .set("enable.auto.commit", "false")
        .set("enable.partition.eof", "false")
        .create()
        .map_err(|e| replay_error(e.to_string()))?;

    let key_schema = K::schema();
    let value_schema = V::schema();
    let mut records = Vec::new();

    for partition in 0..partitions {
        let (low, high) = consumer
            .fetch_watermarks(topic, partition, idle_timeout)
            .map_err(|e| replay_error(e.to_string()))?;
        if high <= low {
            debug!("Changelog partition {topic}[{partition}] is empty");
            continue;
        }

        let mut tpl = TopicPartitionList::new();
        tpl.add_partition_offset(topic, partition, Offset::Beginning)
            .map_err(|e| replay_error(e.to_string()))?;
        consumer
            .assign(&tpl)
            .map_err(|e| replay_error(e.to_string()))?;

        let mut last_progress = Instant::now();
        loop {
            let msg = match consumer.poll(Duration::from_millis(200)) {
                Some(Ok(msg)) => msg,
                Some(Err(e)) => return Err(replay_error(e.to_string())),
                None if last_progress.elapsed() > idle_timeout => {
                    return Err(replay_error(format!(
                        "no record received for {idle_timeout:?} before reaching offset {high}"
                    )));
                }
                None => continue,
            };
            last_progress = Instant::now();

            let offset = msg.offset();
            if let Some(payload) = msg.payload() {
                let corrupt = |source: RecordParseError| TableError::CorruptRecord { offset, source };
                let key_bytes = msg.key().ok_or(RecordParseError::EmptyPayload).map_err(corrupt)?;
                let key: K = decode_record(key_bytes, &key_schema).map_err(corrupt)?;
                let value: V = decode_record(payload, &value_schema).map_err(corrupt)?;
                records.push((key, value));
            }

            if offset >= high - 1 {
                break;
            }
        }
    }

    info!("Replayed {} records from changelog '{topic}'", records.len());
    Ok(records)
}
