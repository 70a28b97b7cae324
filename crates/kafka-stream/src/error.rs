use cta_stations_kafka_producer::PublishError;
use cta_stations_types::RecordParseError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StreamError {
    #[error("Kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),

    #[error("Could not connect to brokers '{brokers}': {reason}")]
    Connect { brokers: String, reason: String },

    #[error("Consumer error: {0}")]
    Consumer(String),

    #[error("Table error: {0}")]
    Table(#[from] TableError),

    #[error("Publish error: {0}")]
    Publish(#[from] PublishError),
}

/// Failure of a KeyedTable operation. A failed `put` leaves the table unchanged.
#[derive(Error, Debug)]
pub enum TableError {
    #[error("Changelog write to '{topic}' failed: {reason}")]
    ChangelogWrite { topic: String, reason: String },

    #[error("Changelog replay from '{topic}' failed: {reason}")]
    Replay { topic: String, reason: String },

    #[error("Corrupt changelog record at offset {offset}: {source}")]
    CorruptRecord {
        offset: i64,
        #[source]
        source: RecordParseError,
    },

    #[error("Encoding error: {0}")]
    Encode(#[from] PublishError),
}

pub type Result<T, E = StreamError> = std::result::Result<T, E>;
