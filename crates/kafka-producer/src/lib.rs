//! Topic provisioning and schema-bound publishing for cta-stations.
//!
//! ## Features
//!
//! - **Topic provisioning**: idempotent create-topic through the broker admin API,
//!   with a per-process cache so each topic name is requested once
//! - **Schema registry**: key and value schemas registered per topic before the
//!   first write; every record carries the registered schema id
//! - **Buffered publishing**: records are validated and queued without waiting
//!   on the network; `close` drains the queue within a bounded timeout
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use cta_stations_kafka_producer::{
//!     ConfluentSchemaRegistry, KafkaRecordSender, KafkaTopicAdmin, PublisherSpec,
//!     RecordPublisher, TopicProvisioner, TopicSpec,
//! };
//! use cta_stations_types::TransformedStation;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let provisioner = TopicProvisioner::new(Arc::new(KafkaTopicAdmin::new("localhost:9092")?));
//!     let registry = ConfluentSchemaRegistry::new("http://localhost:8081", Duration::from_secs(5))?;
//!     let sender = Arc::new(KafkaRecordSender::new("localhost:9092")?);
//!
//!     let spec = PublisherSpec::for_types::<i64, TransformedStation>(
//!         TopicSpec::new("cta_stations_transformed", 1, 1)?,
//!     );
//!     let publisher = RecordPublisher::new(spec, &provisioner, &registry, sender).await?;
//!     // publisher.publish(&station.station_id, &station)?;
//!     publisher.close(Duration::from_secs(3));
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod memory;
pub mod publisher;
pub mod registry;
pub mod sender;
pub mod topic;

pub use error::{ProvisionError, PublishError, RegistryError};
pub use publisher::{FlushResult, PublisherSpec, RecordEncoder, RecordPublisher};
pub use registry::{
    key_subject, register_schema, value_subject, ConfluentSchemaRegistry, RegisteredSchema,
    SchemaRegistry,
};
pub use sender::{DeliveryLogger, KafkaRecordSender, RecordSender};
pub use topic::{KafkaTopicAdmin, TopicAdmin, TopicCreation, TopicProvisioner, TopicSpec};

/// Current wall-clock time in milliseconds since the Unix epoch.
///
/// Producers use it as record key or timestamp.
pub fn time_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
