//! Buffered, schema-checked event producer.

use std::collections::VecDeque;

use bytes::Bytes;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::oneshot;
use transitlog_log::{LogBroker, RecordMetadata};
use transitlog_schema::{SchemaHandle, encode, encode_record};
use transitlog_types::{PartitionId, TopicName, time_millis};

use crate::{DeliveryError, ProducerError};

// ============================================================================
// Configuration & Reports
// ============================================================================

/// Producer tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProducerConfig {
    /// Buffered record count that triggers a poll from `publish`.
    /// Zero disables it; records then move only on `poll` and `flush`.
    pub batch_size: usize,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self { batch_size: 100 }
    }
}

/// Lifetime delivery counters of one producer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProducerStats {
    pub enqueued: u64,
    pub delivered: u64,
    pub failed: u64,
}

/// Outcome of a flush, counted over the producer's whole lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    pub delivered: u64,
    pub failed: u64,
    /// Records still buffered when the flush returned.
    pub undelivered: u64,
}

impl FlushReport {
    /// Returns true if every record ever published is in the log.
    pub fn is_complete(&self) -> bool {
        self.failed == 0 && self.undelivered == 0
    }
}

/// Something that buffers records and must be drained before shutdown.
pub trait Flush {
    /// Delivers everything still buffered and reports the outcome.
    fn close_and_flush(&mut self) -> FlushReport;
}

// ============================================================================
// Delivery Handles
// ============================================================================

type DeliveryResult = Result<RecordMetadata, DeliveryError>;

/// Per-publish delivery outcome.
///
/// Resolves when the producer polls the record out of its buffer.
#[derive(Debug)]
pub struct DeliveryHandle {
    topic: TopicName,
    rx: oneshot::Receiver<DeliveryResult>,
    outcome: Option<DeliveryResult>,
}

impl DeliveryHandle {
    fn new(topic: TopicName, rx: oneshot::Receiver<DeliveryResult>) -> Self {
        Self {
            topic,
            rx,
            outcome: None,
        }
    }

    pub fn topic(&self) -> &TopicName {
        &self.topic
    }

    /// Returns the outcome if the record has been delivered or rejected.
    pub fn try_result(&mut self) -> Option<DeliveryResult> {
        if self.outcome.is_none() {
            self.outcome = match self.rx.try_recv() {
                Ok(result) => Some(result),
                Err(oneshot::error::TryRecvError::Empty) => None,
                Err(oneshot::error::TryRecvError::Closed) => Some(Err(DeliveryError::Dropped {
                    topic: self.topic.clone(),
                })),
            };
        }
        self.outcome.clone()
    }

    /// Blocks until the outcome is known.
    ///
    /// The record only moves when its producer polls, flushes or is dropped,
    /// so the calling thread must not be the one driving that producer.
    /// Records already resolved return immediately.
    pub fn wait(mut self) -> DeliveryResult {
        if let Some(outcome) = self.try_result() {
            return outcome;
        }
        self.rx.blocking_recv().unwrap_or(Err(DeliveryError::Dropped { topic: self.topic }))
    }
}

// ============================================================================
// Event Producer
// ============================================================================

#[derive(Debug)]
struct Pending {
    topic: TopicName,
    partition: Option<PartitionId>,
    key: Bytes,
    value: Bytes,
    timestamp_ms: i64,
    tx: oneshot::Sender<DeliveryResult>,
}

/// Serializes records against registered schemas and appends them to a
/// broker.
///
/// `publish` only buffers. Nothing is retried: a rejected record resolves its
/// handle with an error, is logged and counted, and production continues.
#[derive(Debug)]
pub struct EventProducer<B: LogBroker> {
    broker: B,
    config: ProducerConfig,
    buffer: VecDeque<Pending>,
    stats: ProducerStats,
}

impl<B: LogBroker> EventProducer<B> {
    pub fn new(broker: B) -> Self {
        Self::with_config(broker, ProducerConfig::default())
    }

    pub fn with_config(broker: B, config: ProducerConfig) -> Self {
        Self {
            broker,
            config,
            buffer: VecDeque::new(),
            stats: ProducerStats::default(),
        }
    }

    /// Publishes a record, letting the broker pick the partition.
    ///
    /// # Errors
    ///
    /// Returns [`ProducerError::Serialize`] if the key or value does not match
    /// its schema. Broker failures never surface here.
    pub fn publish(
        &mut self,
        topic: &TopicName,
        key: &Value,
        value: &Value,
        key_schema: &SchemaHandle,
        value_schema: &SchemaHandle,
    ) -> Result<DeliveryHandle, ProducerError> {
        self.publish_to(topic, None, key, value, key_schema, value_schema)
    }

    /// Publishes a record to an explicit partition, or a broker-chosen one
    /// when `partition` is `None`.
    pub fn publish_to(
        &mut self,
        topic: &TopicName,
        partition: Option<PartitionId>,
        key: &Value,
        value: &Value,
        key_schema: &SchemaHandle,
        value_schema: &SchemaHandle,
    ) -> Result<DeliveryHandle, ProducerError> {
        let serialize = |source| ProducerError::Serialize {
            topic: topic.clone(),
            source,
        };
        let key = encode(key_schema, key).map_err(serialize)?;
        let value = encode(value_schema, value).map_err(serialize)?;
        Ok(self.enqueue(topic, partition, key, value))
    }

    /// Publishes typed records. See [`EventProducer::publish_to`].
    pub fn publish_record<K: Serialize, V: Serialize>(
        &mut self,
        topic: &TopicName,
        partition: Option<PartitionId>,
        key: &K,
        value: &V,
        key_schema: &SchemaHandle,
        value_schema: &SchemaHandle,
    ) -> Result<DeliveryHandle, ProducerError> {
        let serialize = |source| ProducerError::Serialize {
            topic: topic.clone(),
            source,
        };
        let key = encode_record(key_schema, key).map_err(serialize)?;
        let value = encode_record(value_schema, value).map_err(serialize)?;
        Ok(self.enqueue(topic, partition, key, value))
    }

    fn enqueue(
        &mut self,
        topic: &TopicName,
        partition: Option<PartitionId>,
        key: Bytes,
        value: Bytes,
    ) -> DeliveryHandle {
        let (tx, rx) = oneshot::channel();
        self.buffer.push_back(Pending {
            topic: topic.clone(),
            partition,
            key,
            value,
            timestamp_ms: time_millis(),
            tx,
        });
        self.stats.enqueued += 1;

        if self.config.batch_size > 0 && self.buffer.len() >= self.config.batch_size {
            self.poll();
        }

        DeliveryHandle::new(topic.clone(), rx)
    }

    /// Sends every buffered record to the broker in enqueue order and
    /// resolves their handles. Returns how many records were resolved.
    pub fn poll(&mut self) -> usize {
        let mut resolved = 0;
        while let Some(pending) = self.buffer.pop_front() {
            let result = self.broker.append(
                &pending.topic,
                pending.partition,
                Some(pending.key),
                pending.value,
                pending.timestamp_ms,
            );

            let outcome = match result {
                Ok(metadata) => {
                    self.stats.delivered += 1;
                    tracing::trace!(
                        topic = %metadata.topic,
                        partition = %metadata.partition,
                        offset = %metadata.offset,
                        "record delivered"
                    );
                    Ok(metadata)
                }
                Err(e) => {
                    self.stats.failed += 1;
                    tracing::warn!(topic = %pending.topic, error = %e, "delivery failed");
                    Err(DeliveryError::Rejected {
                        topic: pending.topic,
                        reason: e.to_string(),
                    })
                }
            };

            // The caller may have dropped its handle.
            let _ = pending.tx.send(outcome);
            resolved += 1;
        }
        resolved
    }

    /// Drains the buffer and reports lifetime delivery counts.
    pub fn flush(&mut self) -> FlushReport {
        self.poll();
        FlushReport {
            delivered: self.stats.delivered,
            failed: self.stats.failed,
            undelivered: self.buffer.len() as u64,
        }
    }

    /// Flushes and consumes the producer.
    ///
    /// Check [`FlushReport::is_complete`] before treating the shutdown as
    /// clean.
    pub fn close(mut self) -> FlushReport {
        self.close_and_flush()
    }

    pub fn stats(&self) -> ProducerStats {
        self.stats
    }

    /// Returns the number of buffered records.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    pub fn broker(&self) -> &B {
        &self.broker
    }
}

impl<B: LogBroker> Flush for EventProducer<B> {
    fn close_and_flush(&mut self) -> FlushReport {
        let report = self.flush();
        if report.is_complete() {
            tracing::info!(delivered = report.delivered, "flushed producer");
        } else {
            tracing::warn!(
                delivered = report.delivered,
                failed = report.failed,
                undelivered = report.undelivered,
                "producer flush incomplete"
            );
        }
        report
    }
}

impl<B: LogBroker> Drop for EventProducer<B> {
    fn drop(&mut self) {
        if !self.buffer.is_empty() {
            tracing::warn!(
                undelivered = self.buffer.len(),
                "producer dropped with buffered records"
            );
        }
    }
}
