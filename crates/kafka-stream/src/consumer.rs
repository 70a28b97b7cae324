//! Batch consumer over the input topic with manual offset commits.

use crate::error::{Result, StreamError};
use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{
    BaseConsumer, CommitMode, Consumer as RdkafkaConsumer, StreamConsumer as RdkafkaStreamConsumer,
};
use rdkafka::message::{BorrowedMessage as RdkafkaBorrowedMessage, Message as RdkafkaMessage};
use rdkafka::{Offset, TopicPartitionList};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

const SEEK_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration for the input topic consumer
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    /// Kafka brokers (comma-separated list)
    pub brokers: String,
    /// Consumer group ID
    pub group_id: String,
    /// Topic to consume from
    pub topic: String,
    /// Auto offset reset strategy ("earliest" or "latest")
    ///
    /// "earliest" replays the whole input topic for a new consumer group, which
    /// is what rebuilding the station view from scratch needs.
    pub auto_offset_reset: String,
    /// Session timeout in milliseconds
    pub session_timeout_ms: String,
    /// Enable auto commit (false: offsets are committed after each processed batch)
    pub enable_auto_commit: bool,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            brokers: "localhost:9092".to_string(),
            group_id: "stations-stream".to_string(),
            topic: "cta_stations".to_string(),
            auto_offset_reset: "earliest".to_string(),
            session_timeout_ms: "6000".to_string(),
            enable_auto_commit: false,
        }
    }
}

/// A raw record pulled from the input topic.
///
/// The payload is kept undecoded so that a malformed record fails on its own
/// instead of failing the batch it arrived in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub payload: Option<Vec<u8>>,
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: Option<Vec<u8>>,
    /// Message timestamp (milliseconds since epoch)
    pub timestamp: Option<i64>,
}

/// Ordered supply of input records with explicit offset commits.
#[async_trait]
pub trait RecordSource: Send {
    /// Wait for at least one record and return up to `max_count`.
    async fn next_batch(&mut self, max_count: usize) -> Result<Vec<Message>>;

    /// Mark `messages` as processed.
    async fn commit(&mut self, messages: &[Message]) -> Result<()>;

    /// Deliver `messages` again, starting from the earliest one per partition.
    async fn rewind(&mut self, messages: &[Message]) -> Result<()>;
}

/// Kafka consumer with manual offset management
pub struct Consumer {
    consumer: RdkafkaStreamConsumer,
    config: ConsumerConfig,
}

impl Consumer {
    pub fn new(config: ConsumerConfig) -> Result<Self> {
        let consumer: RdkafkaStreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .set("group.id", &config.group_id)
            .set("enable.auto.commit", config.enable_auto_commit.to_string())
            .set("auto.offset.reset", &config.auto_offset_reset)
            .set("session.timeout.ms", &config.session_timeout_ms)
            .set("enable.partition.eof", "false")
            .create()
            .map_err(|e| StreamError::Consumer(format!("Failed to create consumer: {e}")))?;

        consumer
            .subscribe(&[&config.topic])
            .map_err(|e| StreamError::Consumer(format!("Failed to subscribe to topic: {e}")))?;

        Ok(Self { consumer, config })
    }

    pub fn config(&self) -> &ConsumerConfig {
        &self.config
    }

    /// Receive multiple messages (blocks until at least one message is available)
    pub async fn receive_batch(&self, max_count: usize) -> Result<Vec<Message>> {
        let mut messages = Vec::new();

        let msg = self
            .consumer
            .recv()
            .await
            .map_err(|e| StreamError::Consumer(format!("Error receiving message: {e}")))?;
        messages.push(to_message(&msg));

        // Try to fetch more with timeout
        while messages.len() < max_count {
            match tokio::time::timeout(Duration::from_millis(10), self.consumer.recv()).await {
                Ok(Ok(msg)) => messages.push(to_message(&msg)),
                _ => break,
            }
        }

        Ok(messages)
    }

    /// Commit the highest offset seen per partition in `messages`
    pub async fn commit_batch(&self, messages: &[Message]) -> Result<()> {
        if messages.is_empty() {
            return Ok(());
        }

        let mut next_offsets: BTreeMap<(&str, i32), i64> = BTreeMap::new();
        for message in messages {
            let next = next_offsets
                .entry((message.topic.as_str(), message.partition))
                .or_insert(message.offset + 1);
            *next = (*next).max(message.offset + 1);
        }

        let mut tpl = TopicPartitionList::new();
        for ((topic, partition), offset) in next_offsets {
            tpl.add_partition_offset(topic, partition, Offset::Offset(offset))
                .map_err(|e| StreamError::Consumer(format!("Failed to add partition offset: {e}")))?;
        }

        self.consumer
            .commit(&tpl, CommitMode::Sync)
            .map_err(|e| StreamError::Consumer(format!("Failed to commit offset: {e}")))?;
        debug!("Committed offsets for {} messages", messages.len());

        Ok(())
    }

    /// Seek every partition in `messages` back to its lowest offset there
    pub fn seek_batch(&self, messages: &[Message]) -> Result<()> {
        let mut first_offsets: BTreeMap<(&str, i32), i64> = BTreeMap::new();
        for message in messages {
            let first = first_offsets
                .entry((message.topic.as_str(), message.partition))
                .or_insert(message.offset);
            *first = (*first).min(message.offset);
        }

        for ((topic, partition), offset) in first_offsets {
            self.consumer
                .seek(topic, partition, Offset::Offset(offset), SEEK_TIMEOUT)
                .map_err(|e| {
                    StreamError::Consumer(format!(
                        "Failed to seek {topic}[{partition}] to offset {offset}: {e}"
                    ))
                })?;
            debug!("Rewound {topic}[{partition}] to offset {offset}");
        }

        Ok(())
    }
}

#[async_trait]
impl RecordSource for Consumer {
    async fn next_batch(&mut self, max_count: usize) -> Result<Vec<Message>> {
        self.receive_batch(max_count).await
    }

    async fn commit(&mut self, messages: &[Message]) -> Result<()> {
        self.commit_batch(messages).await
    }

    async fn rewind(&mut self, messages: &[Message]) -> Result<()> {
        self.seek_batch(messages)
    }
}

fn to_message(msg: &RdkafkaBorrowedMessage) -> Message {
    Message {
        payload: msg.payload().map(|p| p.to_vec()),
        topic: msg.topic().to_string(),
        partition: msg.partition(),
        offset: msg.offset(),
        key: msg.key().map(|k| k.to_vec()),
        timestamp: msg.timestamp().to_millis(),
    }
}

/// Fetch cluster metadata to tell "cannot reach the brokers" apart from later
/// provisioning or publishing failures.
pub async fn check_connectivity(brokers: &str, timeout: Duration) -> Result<usize> {
    let brokers = brokers.to_string();
    tokio::task::spawn_blocking(move || -> Result<usize> {
        let connect_error = |reason: String| StreamError::Connect {
            brokers: brokers.clone(),
            reason,
        };
        let consumer: BaseConsumer = ClientConfig::new()
            .set("bootstrap.servers", &brokers)
            .create()
            .map_err(|e| connect_error(e.to_string()))?;
        let metadata = consumer
            .fetch_metadata(None, timeout)
            .map_err(|e| connect_error(e.to_string()))?;
        Ok(metadata.brokers().len())
    })
    .await
    .map_err(|e| StreamError::Consumer(format!("Connectivity check panicked: {e}")))?
}
