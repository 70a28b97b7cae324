//! Wiring of the stream agent, topic provisioning and table inspection commands.

use crate::config::{ProvisionArgs, StreamArgs, TableArgs};
use anyhow::Context;
use cta_stations_kafka_producer::{
    KafkaRecordSender, KafkaTopicAdmin, PublisherSpec, RecordPublisher, RecordSender,
    SchemaRegistry, TopicProvisioner, TopicSpec,
};
use cta_stations_kafka_stream::{
    check_connectivity, AgentStats, Consumer, ConsumerConfig, KafkaChangelog, KeyedTable,
    StationTable, StreamAgent,
};
use cta_stations_types::TransformedStation;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Partition count of the output and changelog topics; the table has one writer.
const TABLE_PARTITIONS: i32 = 1;

async fn connect(brokers: &str, timeout: Duration) -> anyhow::Result<TopicProvisioner> {
    let broker_count = check_connectivity(brokers, timeout)
        .await
        .context("Could not connect to Kafka")?;
    info!("Connected to Kafka at {brokers} ({broker_count} brokers)");

    let admin = KafkaTopicAdmin::new(brokers).context("Could not connect to Kafka admin API")?;
    Ok(TopicProvisioner::new(Arc::new(admin)))
}

async fn provision_topic(provisioner: &TopicProvisioner, spec: &TopicSpec) -> anyhow::Result<()> {
    provisioner
        .ensure_topic(spec)
        .await
        .with_context(|| format!("Could not provision topic '{}'", spec.name()))
}

async fn open_output(
    spec: TopicSpec,
    provisioner: &TopicProvisioner,
    registry: &dyn SchemaRegistry,
    sender: Arc<dyn RecordSender>,
) -> anyhow::Result<RecordPublisher> {
    RecordPublisher::new(
        PublisherSpec::for_types::<i64, TransformedStation>(spec),
        provisioner,
        registry,
        sender,
    )
    .await
    .context("Could not publish: output topic setup failed")
}

async fn recover_table(
    brokers: &str,
    table_name: &str,
    changelog_topic: TopicSpec,
    provisioner: &TopicProvisioner,
    registry: &dyn SchemaRegistry,
    replay_timeout: Option<Duration>,
) -> anyhow::Result<StationTable> {
    let mut changelog =
        KafkaChangelog::<i64, TransformedStation>::new(brokers, changelog_topic, provisioner, registry)
            .await
            .context("Could not publish: changelog setup failed")?;
    if let Some(timeout) = replay_timeout {
        changelog = changelog.with_idle_timeout(timeout);
    }

    KeyedTable::recover(table_name, Arc::new(changelog))
        .await
        .context("Could not rebuild the station table from its changelog")
}

/// Run the stream agent until Ctrl-C, then flush the output publisher.
pub async fn run_stream(args: StreamArgs) -> anyhow::Result<AgentStats> {
    let brokers = args.broker.brokers.clone();
    let provisioner = connect(&brokers, args.broker.connect_timeout).await?;
    let registry = args.broker.schema_registry()?;

    let input_topic = TopicSpec::new(&args.input_topic, 1, args.replication_factor)?;
    if let Err(e) = provisioner.ensure_topic(&input_topic).await {
        warn!("Could not provision input topic, consuming anyway: {e}");
    }

    let changelog_topic = TopicSpec::new(
        &args.changelog_topic(),
        TABLE_PARTITIONS,
        args.replication_factor,
    )?;
    let table = recover_table(
        &brokers,
        &args.output_topic,
        changelog_topic,
        &provisioner,
        registry.as_ref(),
        None,
    )
    .await?;

    let sender = KafkaRecordSender::new(&brokers).context("Could not publish: producer setup failed")?;
    let output = open_output(
        TopicSpec::new(&args.output_topic, TABLE_PARTITIONS, args.replication_factor)?,
        &provisioner,
        registry.as_ref(),
        Arc::new(sender),
    )
    .await?;

    let consumer = Consumer::new(ConsumerConfig {
        brokers: brokers.clone(),
        group_id: args.group_id.clone(),
        topic: args.input_topic.clone(),
        ..Default::default()
    })
    .context("Could not connect to Kafka: consumer setup failed")?;

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Shutdown requested");
                cancel.cancel();
            }
        }
    });

    let mut agent = StreamAgent::new(consumer, table)
        .with_output(output)
        .with_batch_size(args.batch_size);
    let worker = tokio::spawn(async move {
        let stats = agent.run(cancel).await;
        (stats, agent)
    });
    let (stats, agent) = worker.await.context("Stream agent task failed")?;

    if let Some(output) = agent.into_output() {
        let flush_timeout = args.flush_timeout;
        let result = tokio::task::spawn_blocking(move || output.close(flush_timeout))
            .await
            .context("Flush task failed")?;
        if !result.is_complete() {
            warn!(
                "{} output records may be lost: not flushed within {flush_timeout:?}",
                result.remaining
            );
        }
    }

    Ok(stats)
}

/// Ensure a single topic exists.
pub async fn provision(args: ProvisionArgs) -> anyhow::Result<()> {
    let provisioner = connect(&args.broker.brokers, args.broker.connect_timeout).await?;
    let spec = TopicSpec::new(&args.topic, args.partitions, args.replication_factor)?;
    provision_topic(&provisioner, &spec).await
}

/// Rebuild the station table from its changelog and return its entries ordered by key.
pub async fn read_table(args: TableArgs) -> anyhow::Result<Vec<TransformedStation>> {
    let provisioner = connect(&args.broker.brokers, args.broker.connect_timeout).await?;
    let registry = args.broker.schema_registry()?;
    let changelog_topic = TopicSpec::new(&args.changelog_topic(), TABLE_PARTITIONS, 1)?;

    let table = recover_table(
        &args.broker.brokers,
        &args.output_topic,
        changelog_topic,
        &provisioner,
        registry.as_ref(),
        Some(args.replay_timeout),
    )
    .await?;

    Ok(sorted_entries(&table))
}

fn sorted_entries(table: &StationTable) -> Vec<TransformedStation> {
    let mut entries: Vec<TransformedStation> = table.iter().map(|(_, v)| v.clone()).collect();
    entries.sort_by_key(|station| station.station_id);
    entries
}
