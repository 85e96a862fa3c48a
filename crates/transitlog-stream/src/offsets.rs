//! Committed read positions of source topics.

use serde::{Deserialize, Serialize};
use transitlog_log::LogBroker;
use transitlog_types::{Offset, PartitionId, TopicName};

use crate::{ChangelogTable, StreamError, table};

/// One partition of a source topic.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SourcePartition {
    pub topic: TopicName,
    pub partition: PartitionId,
}

/// Next offset to read for each source partition, kept on its own
/// single-partition topic.
///
/// A committed offset is the position just past the last record whose
/// effects are durable. Commits are appended only when a position moves.
#[derive(Debug)]
pub struct OffsetStore<B: LogBroker> {
    table: ChangelogTable<SourcePartition, Offset, B>,
}

impl<B: LogBroker> OffsetStore<B> {
    /// Creates the offsets topic if needed and loads every committed offset.
    pub fn open(broker: B, topic: TopicName) -> Result<Self, StreamError> {
        table::ensure_changelog(&broker, &topic)?;
        let mut table = ChangelogTable::open(broker, topic)?;
        table.recover()?;
        Ok(Self { table })
    }

    pub fn committed(&self, topic: &TopicName, partition: PartitionId) -> Option<Offset> {
        self.table
            .get(&SourcePartition {
                topic: topic.clone(),
                partition,
            })
            .copied()
    }

    /// Records `next` as the position to resume `topic`/`partition` from.
    ///
    /// Returns true if a commit was written.
    pub fn commit(
        &mut self,
        topic: &TopicName,
        partition: PartitionId,
        next: Offset,
    ) -> Result<bool, StreamError> {
        if self.committed(topic, partition) == Some(next) {
            return Ok(false);
        }

        let key = SourcePartition {
            topic: topic.clone(),
            partition,
        };
        self.table.upsert(key, next)?;
        tracing::trace!(%topic, %partition, offset = %next, "offset committed");
        Ok(true)
    }

    pub fn topic(&self) -> &TopicName {
        self.table.changelog()
    }
}
