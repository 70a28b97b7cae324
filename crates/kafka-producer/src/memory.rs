//! In-process implementations of the broker-facing seams.
//!
//! Used by tests across the workspace and by the `stream` command when no
//! schema registry URL is configured.

use crate::error::{ProvisionError, PublishError, RegistryError};
use crate::registry::SchemaRegistry;
use crate::sender::RecordSender;
use crate::topic::{TopicAdmin, TopicCreation, TopicSpec};
use async_trait::async_trait;
use cta_stations_types::RecordSchema;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Topic catalogue of a simulated cluster with a fixed broker count.
pub struct InMemoryTopicAdmin {
    broker_count: i32,
    topics: Mutex<BTreeMap<String, TopicSpec>>,
    create_calls: AtomicUsize,
}

impl InMemoryTopicAdmin {
    pub fn new(broker_count: i32) -> Self {
        Self {
            broker_count,
            topics: Mutex::new(BTreeMap::new()),
            create_calls: AtomicUsize::new(0),
        }
    }

    pub fn topic_names(&self) -> Vec<String> {
        self.topics
            .lock()
            .map(|topics| topics.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn topic(&self, name: &str) -> Option<TopicSpec> {
        self.topics
            .lock()
            .ok()
            .and_then(|topics| topics.get(name).cloned())
    }

    /// Number of create requests that reached this admin.
    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TopicAdmin for InMemoryTopicAdmin {
    async fn create_topic(&self, spec: &TopicSpec) -> Result<TopicCreation, ProvisionError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);

        if spec.replication_factor() > self.broker_count {
            return Err(ProvisionError::Rejected {
                topic: spec.name().to_string(),
                reason: format!(
                    "replication factor {} exceeds {} available brokers",
                    spec.replication_factor(),
                    self.broker_count
                ),
            });
        }

        let mut topics = self
            .topics
            .lock()
            .map_err(|e| ProvisionError::Rejected {
                topic: spec.name().to_string(),
                reason: e.to_string(),
            })?;
        if topics.contains_key(spec.name()) {
            return Ok(TopicCreation::AlreadyExists);
        }
        topics.insert(spec.name().to_string(), spec.clone());
        Ok(TopicCreation::Created)
    }
}

/// Registry that keeps one schema per subject for the life of the process.
#[derive(Default)]
pub struct InMemorySchemaRegistry {
    state: Mutex<RegistryState>,
}

#[derive(Default)]
struct RegistryState {
    subjects: HashMap<String, u32>,
    schemas: Vec<RecordSchema>,
}

impl InMemorySchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SchemaRegistry for InMemorySchemaRegistry {
    async fn register(&self, subject: &str, schema: &RecordSchema) -> Result<u32, RegistryError> {
        let mut state = self
            .state
            .lock()
            .map_err(|e| RegistryError::InvalidResponse(e.to_string()))?;

        if let Some(&id) = state.subjects.get(subject) {
            return if state.schemas.get(id as usize - 1) == Some(schema) {
                Ok(id)
            } else {
                Err(RegistryError::Incompatible {
                    subject: subject.to_string(),
                })
            };
        }

        let id = match state.schemas.iter().position(|s| s == schema) {
            Some(index) => index as u32 + 1,
            None => {
                state.schemas.push(schema.clone());
                state.schemas.len() as u32
            }
        };
        state.subjects.insert(subject.to_string(), id);
        Ok(id)
    }
}

/// A record handed to [`MemorySender`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentRecord {
    pub topic: String,
    pub key: Vec<u8>,
    pub payload: Vec<u8>,
}

/// Queue that delivers on flush, or never when stalled.
pub struct MemorySender {
    stalled: bool,
    pending: Mutex<VecDeque<SentRecord>>,
    delivered: Mutex<Vec<SentRecord>>,
}

impl Default for MemorySender {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySender {
    pub fn new() -> Self {
        Self {
            stalled: false,
            pending: Mutex::new(VecDeque::new()),
            delivered: Mutex::new(Vec::new()),
        }
    }

    /// A sender whose broker never acknowledges anything.
    pub fn stalled() -> Self {
        Self {
            stalled: true,
            ..Self::new()
        }
    }

    pub fn pending(&self) -> usize {
        self.pending.lock().map(|p| p.len()).unwrap_or(0)
    }

    pub fn delivered(&self) -> Vec<SentRecord> {
        self.delivered
            .lock()
            .map(|d| d.clone())
            .unwrap_or_default()
    }
}

impl RecordSender for MemorySender {
    fn enqueue(&self, topic: &str, key: &[u8], payload: &[u8]) -> Result<(), PublishError> {
        let mut pending = self.pending.lock().map_err(|e| PublishError::Rejected {
            topic: topic.to_string(),
            reason: e.to_string(),
        })?;
        pending.push_back(SentRecord {
            topic: topic.to_string(),
            key: key.to_vec(),
            payload: payload.to_vec(),
        });
        Ok(())
    }

    fn flush(&self, timeout: Duration) -> usize {
        if self.stalled {
            std::thread::sleep(timeout);
            return self.pending();
        }

        let drained: Vec<SentRecord> = match self.pending.lock() {
            Ok(mut pending) => pending.drain(..).collect(),
            Err(_) => return 0,
        };
        if let Ok(mut delivered) = self.delivered.lock() {
            delivered.extend(drained);
        }
        0
    }
}
