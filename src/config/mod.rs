//! Command-line configuration.

pub mod duration;

use clap::Args;
use cta_stations_kafka_producer::memory::InMemorySchemaRegistry;
use cta_stations_kafka_producer::{ConfluentSchemaRegistry, SchemaRegistry};
use std::time::Duration;
use tracing::warn;

pub use duration::parse_duration;

/// Broker and schema registry connection options shared by every command.
#[derive(Args, Clone, Debug)]
pub struct BrokerOpts {
    /// Kafka brokers (comma-separated, e.g., "localhost:9092")
    #[arg(long, env = "KAFKA_BROKERS", default_value = "localhost:9092")]
    pub brokers: String,

    /// Schema registry URL. Without it, schemas are only enforced in-process.
    #[arg(long, env = "SCHEMA_REGISTRY_URL")]
    pub schema_registry_url: Option<String>,

    /// How long to wait for broker metadata at startup
    #[arg(long, default_value = "5s", value_parser = parse_duration)]
    pub connect_timeout: Duration,
}

impl BrokerOpts {
    pub fn schema_registry(&self) -> anyhow::Result<Box<dyn SchemaRegistry>> {
        match &self.schema_registry_url {
            Some(url) => Ok(Box::new(ConfluentSchemaRegistry::new(
                url,
                Duration::from_secs(10),
            )?)),
            None => {
                warn!("No schema registry configured; schemas are enforced in-process only");
                Ok(Box::new(InMemorySchemaRegistry::new()))
            }
        }
    }
}

/// Options for running the station stream agent.
#[derive(Args, Clone, Debug)]
pub struct StreamArgs {
    #[command(flatten)]
    pub broker: BrokerOpts,

    /// Consumer group ID
    #[arg(long, default_value = "stations-stream")]
    pub group_id: String,

    /// Topic populated by the capture service with Station records
    #[arg(long, default_value = "cta_stations")]
    pub input_topic: String,

    /// Topic receiving TransformedStation records
    #[arg(long, default_value = "cta_stations_transformed")]
    pub output_topic: String,

    /// Changelog topic backing the station table (default: "<output-topic>-changelog")
    #[arg(long)]
    pub changelog_topic: Option<String>,

    /// Replication factor for topics this process creates
    #[arg(long, default_value_t = 1)]
    pub replication_factor: i32,

    /// Maximum number of records processed per batch before committing offsets
    #[arg(long, default_value_t = 100)]
    pub batch_size: usize,

    /// Upper bound on the shutdown flush of the output publisher
    #[arg(long, default_value = "3s", value_parser = parse_duration)]
    pub flush_timeout: Duration,
}

impl StreamArgs {
    pub fn changelog_topic(&self) -> String {
        changelog_topic_for(&self.output_topic, self.changelog_topic.as_deref())
    }
}

/// Options for creating a single topic.
#[derive(Args, Clone, Debug)]
pub struct ProvisionArgs {
    #[command(flatten)]
    pub broker: BrokerOpts,

    /// Topic name
    #[arg(long)]
    pub topic: String,

    #[arg(long, default_value_t = 1)]
    pub partitions: i32,

    #[arg(long, default_value_t = 1)]
    pub replication_factor: i32,
}

/// Options for printing the station table rebuilt from its changelog.
#[derive(Args, Clone, Debug)]
pub struct TableArgs {
    #[command(flatten)]
    pub broker: BrokerOpts,

    /// Output topic whose table should be read
    #[arg(long, default_value = "cta_stations_transformed")]
    pub output_topic: String,

    /// Changelog topic (default: "<output-topic>-changelog")
    #[arg(long)]
    pub changelog_topic: Option<String>,

    /// Give up replay when no record arrives for this long
    #[arg(long, default_value = "10s", value_parser = parse_duration)]
    pub replay_timeout: Duration,
}

impl TableArgs {
    pub fn changelog_topic(&self) -> String {
        changelog_topic_for(&self.output_topic, self.changelog_topic.as_deref())
    }
}

fn changelog_topic_for(output_topic: &str, configured: Option<&str>) -> String {
    configured
        .map(str::to_string)
        .unwrap_or_else(|| format!("{output_topic}-changelog"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        stream: StreamArgs,
    }

    #[test]
    fn test_stream_defaults() {
        let cli = TestCli::try_parse_from(["test", "--brokers", "kafka:9092"]).unwrap();
        let args = cli.stream;
        assert_eq!(args.broker.brokers, "kafka:9092");
        assert_eq!(args.input_topic, "cta_stations");
        assert_eq!(args.output_topic, "cta_stations_transformed");
        assert_eq!(args.changelog_topic(), "cta_stations_transformed-changelog");
        assert_eq!(args.flush_timeout, Duration::from_secs(3));
        assert_eq!(args.batch_size, 100);
    }

    #[test]
    fn test_explicit_changelog_topic() {
        let cli = TestCli::try_parse_from([
            "test",
            "--output-topic",
            "out",
            "--changelog-topic",
            "out-log",
            "--flush-timeout",
            "250ms",
        ])
        .unwrap();
        assert_eq!(cli.stream.changelog_topic(), "out-log");
        assert_eq!(cli.stream.flush_timeout, Duration::from_millis(250));
    }

    #[test]
    fn test_invalid_duration_is_rejected() {
        assert!(TestCli::try_parse_from(["test", "--flush-timeout", "soon"]).is_err());
    }
}
