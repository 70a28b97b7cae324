use cta_stations_types::{RecordParseError, SchemaViolation};
use thiserror::Error;

/// Topic creation failed for a reason other than "already exists".
#[derive(Error, Debug)]
pub enum ProvisionError {
    #[error("Invalid topic spec for '{topic}': {reason}")]
    InvalidSpec { topic: String, reason: String },

    #[error("Admin client error: {0}")]
    Admin(#[from] rdkafka::error::KafkaError),

    #[error("Broker rejected topic '{topic}': {reason}")]
    Rejected { topic: String, reason: String },
}

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Schema registry request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Schema registry returned {status} for subject '{subject}': {body}")]
    Status {
        subject: String,
        status: u16,
        body: String,
    },

    #[error("Schema for subject '{subject}' is incompatible with the registered schema")]
    Incompatible { subject: String },

    #[error("Invalid schema registry response: {0}")]
    InvalidResponse(String),
}

/// A record could not be handed to the broker.
#[derive(Error, Debug)]
pub enum PublishError {
    #[error("Kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),

    #[error("Schema registration failed: {0}")]
    Registry(#[from] RegistryError),

    #[error("{part} does not match the schema of topic '{topic}': {violation}")]
    SchemaMismatch {
        topic: String,
        part: &'static str,
        violation: SchemaViolation,
    },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Broker rejected record for topic '{topic}': {reason}")]
    Rejected { topic: String, reason: String },
}

impl From<serde_json::Error> for PublishError {
    fn from(err: serde_json::Error) -> Self {
        PublishError::Serialization(err.to_string())
    }
}

impl From<RecordParseError> for PublishError {
    fn from(err: RecordParseError) -> Self {
        PublishError::Serialization(err.to_string())
    }
}

pub type Result<T, E = PublishError> = std::result::Result<T, E>;
