//! Station stream E2E test
//!
//! Test flow:
//! 1. Provision an input topic and publish schemaless Station JSON to it
//! 2. Run the stream agent over it with a Kafka changelog
//! 3. Rebuild a second table from the changelog and compare with the live one

use crate::{brokers, test_id};
use cta_stations::kafka_stream::{
    Consumer, ConsumerConfig, KafkaChangelog, KeyedTable, StationTable, StreamAgent,
};
use cta_stations::producer::memory::InMemorySchemaRegistry;
use cta_stations::producer::{KafkaTopicAdmin, TopicProvisioner, TopicSpec};
use cta_stations::types::{Line, Station, TransformedStation};
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::ClientConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn station(stop_id: i64, station_id: i64, name: &str, flags: (bool, bool, bool)) -> Station {
    let (red, green, blue) = flags;
    Station {
        stop_id,
        direction_id: "S".to_string(),
        stop_name: format!("{name} (Southbound)"),
        station_name: name.to_string(),
        station_descriptive_name: format!("{name} Station"),
        station_id,
        order: (stop_id % 50) as i32,
        red,
        blue,
        green,
    }
}

async fn changelog_table(
    brokers: &str,
    topic: &TopicSpec,
    provisioner: &TopicProvisioner,
    registry: &InMemorySchemaRegistry,
) -> anyhow::Result<StationTable> {
    let changelog =
        KafkaChangelog::<i64, TransformedStation>::new(brokers, topic.clone(), provisioner, registry)
            .await?
            .with_idle_timeout(Duration::from_secs(10));
    Ok(KeyedTable::recover("stations", Arc::new(changelog)).await?)
}

#[tokio::test]
#[ignore = "requires a running Kafka broker"]
async fn test_station_stream_end_to_end() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("cta_stations=debug,cta_stations_kafka_stream=debug")
        .try_init()
        .ok();

    let brokers = brokers();
    let id = test_id();
    let input = TopicSpec::new(&format!("test-stations-{id}"), 1, 1)?;
    let changelog_topic = TopicSpec::new(&format!("test-stations-{id}-changelog"), 1, 1)?;

    let provisioner = TopicProvisioner::new(Arc::new(KafkaTopicAdmin::new(&brokers)?));
    let registry = InMemorySchemaRegistry::new();
    provisioner.ensure_topic(&input).await?;

    let producer: FutureProducer = ClientConfig::new()
        .set("bootstrap.servers", &brokers)
        .set("message.timeout.ms", "5000")
        .create()?;
    let inputs = vec![
        station(30001, 40010, "Austin", (false, false, true)),
        station(30002, 40020, "Harlem", (false, true, false)),
        station(30003, 40030, "Nowhere", (false, false, false)),
        station(30004, 40040, "Roosevelt", (true, true, false)),
        station(30005, 40010, "Austin", (true, false, false)),
    ];
    for s in &inputs {
        let payload = serde_json::to_vec(s)?;
        let key = s.stop_id.to_string();
        producer
            .send(
                FutureRecord::to(input.name()).key(&key).payload(&payload),
                Duration::from_secs(5),
            )
            .await
            .map_err(|(err, _)| err)?;
    }
    producer
        .send(
            FutureRecord::to(input.name()).key("bad").payload("{not json"),
            Duration::from_secs(5),
        )
        .await
        .map_err(|(err, _)| err)?;

    let table = changelog_table(&brokers, &changelog_topic, &provisioner, &registry).await?;
    let consumer = Consumer::new(ConsumerConfig {
        brokers: brokers.clone(),
        group_id: format!("test-group-{id}"),
        topic: input.name().to_string(),
        ..Default::default()
    })?;

    let cancel = CancellationToken::new();
    let mut agent = StreamAgent::new(consumer, table).with_batch_size(10);
    let stopper = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(10)).await;
            cancel.cancel();
        })
    };
    let stats = agent.run(cancel).await;
    stopper.await?;

    assert_eq!(stats.consumed, 6);
    assert_eq!(stats.filtered, 1);
    assert_eq!(stats.skipped, 1);
    assert_eq!(stats.written, 4);

    let live = agent.table();
    assert_eq!(live.len(), 3);
    assert_eq!(live.get(&40010).map(|s| s.line), Some(Line::Red));
    assert_eq!(live.get(&40020).map(|s| s.line), Some(Line::Green));
    assert_eq!(live.get(&40040).map(|s| s.line), Some(Line::Red));
    assert!(live.get(&40030).is_none());

    let recovered = changelog_table(&brokers, &changelog_topic, &provisioner, &registry).await?;
    assert_eq!(recovered.snapshot(), live.snapshot());

    Ok(())
}
