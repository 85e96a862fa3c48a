//! Partition-aware topic consumer.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use transitlog_log::{LogBroker, LogRecord};
use transitlog_types::{Offset, PartitionId, TopicName};

use crate::StreamError;

/// Where a new consumer starts reading.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OffsetReset {
    /// From the first record of every partition.
    #[default]
    Earliest,
    /// From the end; only records appended after subscribing are seen.
    Latest,
}

impl FromStr for OffsetReset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "earliest" => Ok(Self::Earliest),
            "latest" => Ok(Self::Latest),
            other => Err(format!("unknown offset reset: {other}")),
        }
    }
}

/// Reads every partition of one topic, one cursor per partition.
///
/// Records of a partition come back in log order. Partitions are visited
/// round-robin so one busy partition cannot starve the others.
#[derive(Debug)]
pub struct StreamConsumer<B: LogBroker> {
    broker: B,
    topic: TopicName,
    cursors: Vec<Offset>,
    next_partition: usize,
}

impl<B: LogBroker> StreamConsumer<B> {
    /// Subscribes to all partitions of `topic`.
    pub fn subscribe(broker: B, topic: TopicName, reset: OffsetReset) -> Result<Self, StreamError> {
        let spec = broker.describe_topic(&topic)?;
        let cursors = (0..spec.partitions)
            .map(|p| match reset {
                OffsetReset::Earliest => Ok(Offset::ZERO),
                OffsetReset::Latest => broker.end_offset(&topic, PartitionId::new(p)),
            })
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!(%topic, partitions = spec.partitions, ?reset, "consumer subscribed");
        Ok(Self {
            broker,
            topic,
            cursors,
            next_partition: 0,
        })
    }

    /// Returns up to `max_records` unread records and advances past them.
    pub fn poll(&mut self, max_records: usize) -> Result<Vec<LogRecord>, StreamError> {
        let partitions = self.cursors.len();
        let mut batch = Vec::new();
        if partitions == 0 || max_records == 0 {
            return Ok(batch);
        }

        let start = self.next_partition;
        self.next_partition = (start + 1) % partitions;

        for i in 0..partitions {
            let remaining = max_records - batch.len();
            if remaining == 0 {
                break;
            }
            let p = (start + i) % partitions;
            let records = self.broker.read(
                &self.topic,
                PartitionId::new(p as u32),
                self.cursors[p],
                remaining,
            )?;
            if let Some(last) = records.last() {
                self.cursors[p] = last.offset.next();
            }
            batch.extend(records);
        }

        Ok(batch)
    }

    /// Moves the cursor of `partition` so the next poll starts at `offset`.
    pub fn seek(&mut self, partition: PartitionId, offset: Offset) {
        if let Some(cursor) = self.cursors.get_mut(partition.as_u32() as usize) {
            *cursor = offset;
        }
    }

    /// Rewinds so that `records` are returned again by the next poll.
    pub(crate) fn rewind(&mut self, records: &[LogRecord]) {
        // Reverse order leaves each partition at its earliest record.
        for record in records.iter().rev() {
            self.seek(record.partition, record.offset);
        }
    }

    /// Returns the next offset to be read from `partition`.
    pub fn position(&self, partition: PartitionId) -> Option<Offset> {
        self.cursors.get(partition.as_u32() as usize).copied()
    }

    /// Returns how many records are appended but not yet polled.
    pub fn lag(&self) -> Result<u64, StreamError> {
        let mut lag = 0;
        for (p, cursor) in self.cursors.iter().enumerate() {
            let end = self.broker.end_offset(&self.topic, PartitionId::new(p as u32))?;
            lag += end.as_u64().saturating_sub(cursor.as_u64());
        }
        Ok(lag)
    }

    pub fn topic(&self) -> &TopicName {
        &self.topic
    }

    pub fn partitions(&self) -> u32 {
        self.cursors.len() as u32
    }
}
