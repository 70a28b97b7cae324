//! cta-stations
//!
//! Moves CTA station reference data from the `cta_stations` topic (filled by a
//! JDBC capture connector) into a station table keyed by `station_id`, backed by
//! a changelog topic, and republishes the normalized projection.
//!
//! # Crates
//!
//! - `cta_stations_types` - `Station`, `TransformedStation`, schema descriptors, wire codec
//! - `cta_stations_kafka_producer` - topic provisioning, schema registry, buffered publishing
//! - `cta_stations_kafka_stream` - input consumer, keyed table, stream agent
//!
//! # CLI Usage
//!
//! ```bash
//! # Run the stream agent
//! cta-stations stream --brokers localhost:9092 --schema-registry-url http://localhost:8081
//!
//! # Create a topic
//! cta-stations provision --topic cta_stations --partitions 1 --replication-factor 1
//!
//! # Print the station table rebuilt from its changelog
//! cta-stations table --output-topic cta_stations_transformed
//! ```

pub mod config;
pub mod stream;

// Re-export the workspace crates for convenience
pub use cta_stations_kafka_producer as producer;
pub use cta_stations_kafka_stream as kafka_stream;
pub use cta_stations_types as types;

pub use config::{BrokerOpts, ProvisionArgs, StreamArgs, TableArgs};
pub use stream::{provision, read_table, run_stream};
