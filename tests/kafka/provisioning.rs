use crate::{brokers, test_id};
use cta_stations::producer::{KafkaTopicAdmin, TopicAdmin, TopicCreation, TopicProvisioner, TopicSpec};
use std::sync::Arc;

#[tokio::test]
#[ignore = "requires a running Kafka broker"]
async fn test_ensure_topic_is_idempotent_against_broker() -> anyhow::Result<()> {
    let topic = format!("test-provision-{}", test_id());
    let spec = TopicSpec::new(&topic, 1, 1)?;
    let admin = Arc::new(KafkaTopicAdmin::new(&brokers())?);

    // Two independent provisioners: the second one reaches the broker again.
    TopicProvisioner::new(admin.clone()).ensure_topic(&spec).await?;
    TopicProvisioner::new(admin.clone()).ensure_topic(&spec).await?;

    assert_eq!(
        admin.create_topic(&spec).await?,
        TopicCreation::AlreadyExists
    );
    Ok(())
}

#[tokio::test]
#[ignore = "requires a running Kafka broker"]
async fn test_impossible_replication_factor_is_reported() -> anyhow::Result<()> {
    let topic = format!("test-provision-rf-{}", test_id());
    let spec = TopicSpec::new(&topic, 1, 1000)?;
    let provisioner = TopicProvisioner::new(Arc::new(KafkaTopicAdmin::new(&brokers())?));

    assert!(provisioner.ensure_topic(&spec).await.is_err());
    Ok(())
}
