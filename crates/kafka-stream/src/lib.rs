//! Stateful stream processing for cta-stations.
//!
//! This crate provides:
//! - A batch consumer over the input topic with manual offset commits
//! - `KeyedTable`, a key-value table whose writes are logged to a changelog
//!   topic and which is rebuilt from that topic on start
//! - `StreamAgent`, which filters and transforms incoming `Station` records
//!   into the station table and republishes changed values

pub mod agent;
pub mod changelog;

/// Low-level consumer with manual offsets
pub mod consumer;
pub mod error;
pub mod table;

pub use agent::{
    is_on_a_line, line_of, transform, AgentStats, RecordOutcome, StationTable, StreamAgent,
};
pub use changelog::KafkaChangelog;
pub use consumer::{check_connectivity, Consumer, ConsumerConfig, Message, RecordSource};
pub use error::{Result, StreamError, TableError};
pub use table::{Changelog, InMemoryChangelog, KeyedTable, PutOutcome};
