//! Station stream agent.
//!
//! Pulls raw records from the input topic in batches and runs each one through
//! decode, filter and transform before writing it into the station table:
//!
//! ```text
//! input topic -> Station::from_payload -> filter -> transform -> table.put -> output topic
//!                     (skip + log)         (drop)                (changelog)
//! ```
//!
//! Records are processed strictly in the order they were consumed, so for any
//! `station_id` the table ends up holding the transform of the last record seen.

use crate::consumer::{Message, RecordSource};
use crate::table::{KeyedTable, PutOutcome};
use cta_stations_kafka_producer::RecordPublisher;
use cta_stations_types::{Line, Station, TransformedStation};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// The table the agent maintains: latest projection per `station_id`.
pub type StationTable = KeyedTable<i64, TransformedStation>;

/// A station is of interest only if it is served by at least one line.
pub fn is_on_a_line(station: &Station) -> bool {
    station.red || station.blue || station.green
}

/// Line of a station that passed [`is_on_a_line`].
///
/// When several flags are set, red wins over green and green over blue.
pub fn line_of(station: &Station) -> Line {
    if station.red {
        Line::Red
    } else if station.green {
        Line::Green
    } else {
        Line::Blue
    }
}

pub fn transform(station: &Station) -> TransformedStation {
    TransformedStation {
        station_id: station.station_id,
        station_name: station.station_name.clone(),
        order: station.order,
        line: line_of(station),
    }
}

/// What happened to one input record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    Written(PutOutcome),
    /// Decoded and transformed, but the table already held the same value.
    Unchanged,
    /// No line flag set.
    Filtered,
    /// Missing or malformed payload.
    Skipped,
    /// The table write failed.
    Failed,
}

/// Counters kept over the life of one agent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AgentStats {
    pub consumed: u64,
    pub written: u64,
    pub unchanged: u64,
    pub filtered: u64,
    pub skipped: u64,
    pub failed: u64,
}

impl AgentStats {
    fn record(&mut self, outcome: RecordOutcome) {
        self.consumed += 1;
        match outcome {
            RecordOutcome::Written(_) => self.written += 1,
            RecordOutcome::Unchanged => self.unchanged += 1,
            RecordOutcome::Filtered => self.filtered += 1,
            RecordOutcome::Skipped => self.skipped += 1,
            RecordOutcome::Failed => self.failed += 1,
        }
    }
}

pub struct StreamAgent<S> {
    source: S,
    table: StationTable,
    output: Option<RecordPublisher>,
    batch_size: usize,
    retry_backoff: Duration,
    stats: AgentStats,
}

impl<S: RecordSource> StreamAgent<S> {
    pub fn new(source: S, table: StationTable) -> Self {
        Self {
            source,
            table,
            output: None,
            batch_size: 100,
            retry_backoff: Duration::from_millis(500),
            stats: AgentStats::default(),
        }
    }

    /// Republish every changed table value through `output`.
    pub fn with_output(mut self, output: RecordPublisher) -> Self {
        self.output = Some(output);
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Wait between a failed fetch or table write and the next attempt.
    pub fn with_retry_backoff(mut self, retry_backoff: Duration) -> Self {
        self.retry_backoff = retry_backoff;
        self
    }

    pub fn table(&self) -> &StationTable {
        &self.table
    }

    pub fn stats(&self) -> AgentStats {
        self.stats
    }

    /// Give back the output publisher so the caller can flush it on shutdown.
    pub fn into_output(self) -> Option<RecordPublisher> {
        self.output
    }

    /// Consume until `cancel` fires.
    ///
    /// Cancellation is checked while waiting for a batch and between records.
    /// Offsets are committed for the processed prefix of each batch. A failed
    /// table write stops the batch there: the source is rewound to the failed
    /// record and the remainder is retried after `retry_backoff`.
    pub async fn run(&mut self, cancel: CancellationToken) -> AgentStats {
        info!("Stream agent started for table '{}'", self.table.name());

        'consume: loop {
            let batch = tokio::select! {
                biased;
                _ = cancel.cancelled() => break 'consume,
                batch = self.source.next_batch(self.batch_size) => batch,
            };

            let batch = match batch {
                Ok(batch) => batch,
                Err(e) => {
                    warn!("Failed to fetch records: {e}");
                    tokio::select! {
                        _ = cancel.cancelled() => break 'consume,
                        _ = tokio::time::sleep(self.retry_backoff) => continue 'consume,
                    }
                }
            };

            let mut processed = 0;
            let mut failed = false;
            for message in &batch {
                if cancel.is_cancelled() {
                    break;
                }
                if self.process(message).await == RecordOutcome::Failed {
                    failed = true;
                    break;
                }
                processed += 1;
            }

            if let Err(e) = self.source.commit(&batch[..processed]).await {
                warn!("Failed to commit offsets: {e}");
            }

            if failed {
                let retry = &batch[processed..];
                let first = &retry[0];
                if let Err(e) = self.source.rewind(retry).await {
                    error!(
                        "Stopping: cannot rewind to {}[{}]@{}, it is redelivered from the last commit on restart: {e}",
                        first.topic, first.partition, first.offset
                    );
                    break 'consume;
                }
                warn!(
                    "Retrying {} records from {}[{}]@{} in {:?}",
                    retry.len(),
                    first.topic,
                    first.partition,
                    first.offset,
                    self.retry_backoff
                );
                tokio::select! {
                    _ = cancel.cancelled() => break 'consume,
                    _ = tokio::time::sleep(self.retry_backoff) => continue 'consume,
                }
            }

            if processed < batch.len() {
                break 'consume;
            }
        }

        info!(
            "Stream agent stopped: consumed={} written={} unchanged={} filtered={} skipped={} failed={}",
            self.stats.consumed,
            self.stats.written,
            self.stats.unchanged,
            self.stats.filtered,
            self.stats.skipped,
            self.stats.failed
        );
        self.stats
    }

    /// Run one record through decode, filter, transform and put.
    pub async fn process(&mut self, message: &Message) -> RecordOutcome {
        let outcome = self.process_inner(message).await;
        self.stats.record(outcome);
        outcome
    }

    async fn process_inner(&mut self, message: &Message) -> RecordOutcome {
        let Some(payload) = message.payload.as_deref() else {
            warn!(
                "Skipping record without payload at {}[{}]@{}",
                message.topic, message.partition, message.offset
            );
            return RecordOutcome::Skipped;
        };

        let station = match Station::from_payload(payload) {
            Ok(station) => station,
            Err(e) => {
                warn!(
                    "Skipping malformed record at {}[{}]@{}: {e}",
                    message.topic, message.partition, message.offset
                );
                return RecordOutcome::Skipped;
            }
        };

        if !is_on_a_line(&station) {
            debug!("Dropping stop {} with no line flag", station.stop_id);
            return RecordOutcome::Filtered;
        }

        let transformed = transform(&station);
        let key = transformed.station_id;
        match self.table.put(key, transformed.clone()).await {
            Ok(PutOutcome::Unchanged) => RecordOutcome::Unchanged,
            Ok(outcome) => {
                if let Some(output) = &self.output {
                    if let Err(e) = output.publish(&key, &transformed) {
                        error!("Failed to publish station {key} to '{}': {e}", output.topic());
                    }
                }
                RecordOutcome::Written(outcome)
            }
            Err(e) => {
                error!(
                    "Failed to write station {key} from {}[{}]@{}: {e}",
                    message.topic, message.partition, message.offset
                );
                RecordOutcome::Failed
            }
        }
    }
}
