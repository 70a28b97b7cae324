//! Idempotent topic provisioning.
//!
//! `TopicProvisioner` is the provisioning cache each publisher is built with:
//! it remembers which topic names this process already handled so repeated
//! publisher construction does not issue redundant admin calls. The broker
//! itself treats "already exists" as benign, so the cache is an optimization
//! only.

use crate::error::ProvisionError;
use async_trait::async_trait;
use rdkafka::admin::{AdminClient, AdminOptions, NewTopic, TopicReplication};
use rdkafka::client::DefaultClientContext;
use rdkafka::types::RDKafkaErrorCode;
use rdkafka::ClientConfig;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, error, info};

/// Requested shape of a topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicSpec {
    name: String,
    partitions: i32,
    replication_factor: i32,
}

impl TopicSpec {
    pub fn new(
        name: &str,
        partitions: i32,
        replication_factor: i32,
    ) -> Result<Self, ProvisionError> {
        let invalid = |reason: &str| ProvisionError::InvalidSpec {
            topic: name.to_string(),
            reason: reason.to_string(),
        };
        if name.is_empty() {
            return Err(invalid("topic name must not be empty"));
        }
        if partitions < 1 {
            return Err(invalid("partition count must be at least 1"));
        }
        if replication_factor < 1 {
            return Err(invalid("replication factor must be at least 1"));
        }
        Ok(Self {
            name: name.to_string(),
            partitions,
            replication_factor,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn partitions(&self) -> i32 {
        self.partitions
    }

    pub fn replication_factor(&self) -> i32 {
        self.replication_factor
    }
}

/// Outcome of a successful create-topic request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicCreation {
    Created,
    AlreadyExists,
}

/// Administrative interface of the broker.
#[async_trait]
pub trait TopicAdmin: Send + Sync {
    /// Issue a create-topic request. "Already exists" must be reported as
    /// `Ok(TopicCreation::AlreadyExists)`, never as an error.
    async fn create_topic(&self, spec: &TopicSpec) -> Result<TopicCreation, ProvisionError>;
}

/// [`TopicAdmin`] backed by the rdkafka admin client.
pub struct KafkaTopicAdmin {
    client: AdminClient<DefaultClientContext>,
    operation_timeout: Duration,
}

impl KafkaTopicAdmin {
    pub fn new(brokers: &str) -> Result<Self, ProvisionError> {
        let client: AdminClient<DefaultClientContext> = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .create()?;

        Ok(Self {
            client,
            operation_timeout: Duration::from_secs(10),
        })
    }

    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }
}

#[async_trait]
impl TopicAdmin for KafkaTopicAdmin {
    async fn create_topic(&self, spec: &TopicSpec) -> Result<TopicCreation, ProvisionError> {
        let new_topic = NewTopic::new(
            spec.name(),
            spec.partitions(),
            TopicReplication::Fixed(spec.replication_factor()),
        );
        let opts = AdminOptions::new().operation_timeout(Some(self.operation_timeout));

        let results = self.client.create_topics(&[new_topic], &opts).await?;

        let mut outcome = TopicCreation::Created;
        for result in results {
            match result {
                Ok(_) => {}
                Err((_, RDKafkaErrorCode::TopicAlreadyExists)) => {
                    outcome = TopicCreation::AlreadyExists;
                }
                Err((topic, code)) => {
                    return Err(ProvisionError::Rejected {
                        topic,
                        reason: code.to_string(),
                    });
                }
            }
        }

        Ok(outcome)
    }
}

/// Provisioning cache shared by the publishers of one process.
pub struct TopicProvisioner {
    admin: Arc<dyn TopicAdmin>,
    seen: Mutex<HashSet<String>>,
}

impl TopicProvisioner {
    pub fn new(admin: Arc<dyn TopicAdmin>) -> Self {
        Self {
            admin,
            seen: Mutex::new(HashSet::new()),
        }
    }

    /// Make sure `spec` exists on the broker.
    ///
    /// The first call for a topic name issues the admin request; every later call
    /// for that name returns immediately, whatever the first outcome was.
    /// Failures are logged here and returned so the caller can decide whether to
    /// carry on.
    pub async fn ensure_topic(&self, spec: &TopicSpec) -> Result<(), ProvisionError> {
        if !self.claim(spec.name()) {
            debug!("Topic '{}' already handled by this process", spec.name());
            return Ok(());
        }

        match self.admin.create_topic(spec).await {
            Ok(TopicCreation::Created) => {
                info!(
                    "Topic '{}' created (partitions={}, replication={})",
                    spec.name(),
                    spec.partitions(),
                    spec.replication_factor()
                );
                Ok(())
            }
            Ok(TopicCreation::AlreadyExists) => {
                info!("Topic '{}' already exists", spec.name());
                Ok(())
            }
            Err(e) => {
                error!("Failed to create topic '{}': {e}", spec.name());
                Err(e)
            }
        }
    }

    /// Whether this process already attempted to provision `topic`.
    pub fn is_known(&self, topic: &str) -> bool {
        self.seen
            .lock()
            .map(|seen| seen.contains(topic))
            .unwrap_or(false)
    }

    fn claim(&self, topic: &str) -> bool {
        match self.seen.lock() {
            Ok(mut seen) => seen.insert(topic.to_string()),
            // A poisoned cache only costs a redundant admin call.
            Err(poisoned) => poisoned.into_inner().insert(topic.to_string()),
        }
    }
}
