//! Buffered send path under `RecordPublisher`.

use crate::error::PublishError;
use rdkafka::client::ClientContext;
use rdkafka::message::Message;
use rdkafka::producer::{BaseRecord, DeliveryResult, Producer, ProducerContext, ThreadedProducer};
use rdkafka::ClientConfig;
use std::time::Duration;
use tracing::{error, trace, warn};

/// Local queue in front of the broker.
///
/// `enqueue` must not wait for network I/O; delivery happens in the background.
/// `flush` is the only blocking call and is bounded by its timeout.
pub trait RecordSender: Send + Sync {
    fn enqueue(&self, topic: &str, key: &[u8], payload: &[u8]) -> Result<(), PublishError>;

    /// Wait up to `timeout` for queued records to be delivered and return how
    /// many are still pending.
    fn flush(&self, timeout: Duration) -> usize;
}

/// Logs asynchronous delivery failures reported by the producer thread.
pub struct DeliveryLogger;

impl ClientContext for DeliveryLogger {}

impl ProducerContext for DeliveryLogger {
    type DeliveryOpaque = ();

    fn delivery(&self, delivery_result: &DeliveryResult<'_>, _: Self::DeliveryOpaque) {
        match delivery_result {
            Ok(msg) => trace!(
                "Delivered record to {} [{}] at offset {}",
                msg.topic(),
                msg.partition(),
                msg.offset()
            ),
            Err((err, msg)) => error!("Failed to deliver record to {}: {err}", msg.topic()),
        }
    }
}

/// [`RecordSender`] backed by an rdkafka producer with its own polling thread.
pub struct KafkaRecordSender {
    producer: ThreadedProducer<DeliveryLogger>,
}

impl KafkaRecordSender {
    pub fn new(brokers: &str) -> Result<Self, PublishError> {
        let producer: ThreadedProducer<DeliveryLogger> = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "30000")
            .set("queue.buffering.max.messages", "100000")
            .set("linger.ms", "5")
            .create_with_context(DeliveryLogger)?;

        Ok(Self { producer })
    }
}

impl RecordSender for KafkaRecordSender {
    fn enqueue(&self, topic: &str, key: &[u8], payload: &[u8]) -> Result<(), PublishError> {
        let record = BaseRecord::to(topic).key(key).payload(payload);
        self.producer
            .send(record)
            .map_err(|(err, _)| PublishError::Rejected {
                topic: topic.to_string(),
                reason: err.to_string(),
            })
    }

    fn flush(&self, timeout: Duration) -> usize {
        if let Err(e) = self.producer.flush(timeout) {
            warn!("Producer flush did not complete: {e}");
        }
        usize::try_from(self.producer.in_flight_count()).unwrap_or(0)
    }
}
