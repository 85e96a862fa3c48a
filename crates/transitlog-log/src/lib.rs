//! # transitlog-log: Durable partitioned topic log
//!
//! The log is the only thing producers and the stream transformer share.
//! Everything here is reached through the [`LogBroker`] trait so the rest of
//! the workspace never depends on a concrete broker.
//!
//! Two implementations ship with the crate:
//!
//! - [`MemoryBroker`]: in-process, loses data on drop. Supports fault
//!   injection for exercising provisioning and delivery failures.
//! - [`FileBroker`]: one append-only file per topic partition with CRC-checked
//!   records, so changelogs survive a restart.
//!
//! # File Layout
//!
//! ```text
//! {data_dir}/
//! ├── topics.json                    <- topic manifest (partitions, replication)
//! └── {topic}/
//!     ├── partition-0000.log
//!     └── partition-0001.log
//! ```

mod error;
mod file;
mod memory;
mod partitioner;
mod record;


use bytes::Bytes;
use serde::{Deserialize, Serialize};
use transitlog_types::{Offset, PartitionId, TopicName};

pub use error::{AdminError, LogError};
pub use file::FileBroker;
pub use memory::MemoryBroker;
pub use partitioner::{Partitioner, partition_for_key};
pub use record::Record;

/// Longest topic name a broker accepts.
pub const MAX_TOPIC_NAME_LEN: usize = 249;

/// Parameters for creating a topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicSpec {
    pub name: TopicName,
    pub partitions: u32,
    pub replication_factor: u16,
}

impl TopicSpec {
    pub fn new(name: impl Into<TopicName>, partitions: u32, replication_factor: u16) -> Self {
        Self {
            name: name.into(),
            partitions,
            replication_factor,
        }
    }

    /// Checks the spec against the broker's naming and sizing rules.
    ///
    /// Names are limited to ASCII alphanumerics, `.`, `_` and `-`, which also
    /// keeps them safe to use as directory names.
    pub fn validate(&self) -> Result<(), AdminError> {
        let name = self.name.as_str();
        let invalid = |reason: &str| AdminError::InvalidTopic {
            topic: self.name.clone(),
            reason: reason.to_string(),
        };

        if name.is_empty() {
            return Err(invalid("name is empty"));
        }
        if name == "." || name == ".." {
            return Err(invalid("name cannot be '.' or '..'"));
        }
        if name.len() > MAX_TOPIC_NAME_LEN {
            return Err(invalid("name is longer than 249 characters"));
        }
        if let Some(c) = name
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')))
        {
            return Err(invalid(&format!("illegal character {c:?}")));
        }
        if self.partitions == 0 {
            return Err(invalid("partition count must be at least 1"));
        }
        if self.replication_factor == 0 {
            return Err(invalid("replication factor must be at least 1"));
        }
        Ok(())
    }
}

/// Where an appended record landed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordMetadata {
    pub topic: TopicName,
    pub partition: PartitionId,
    pub offset: Offset,
    pub timestamp_ms: i64,
}

/// A record read back from a topic partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub topic: TopicName,
    pub partition: PartitionId,
    pub offset: Offset,
    pub timestamp_ms: i64,
    pub key: Option<Bytes>,
    pub value: Bytes,
}

/// A durable, ordered, partitioned log.
///
/// Handles are cheap to clone and every clone talks to the same log, so a
/// broker can be handed to each producer and consumer independently.
///
/// # Invariants
///
/// - Offsets within a partition start at zero and increase by one per record
/// - Records are never modified or reordered once appended
/// - A record appended with a key always lands on the same partition for a
///   given partition count
pub trait LogBroker: Clone + Send + Sync {
    /// Creates a topic.
    ///
    /// Returns [`AdminError::TopicAlreadyExists`] when the name is taken; the
    /// existing topic is left untouched.
    fn create_topic(&self, spec: &TopicSpec) -> Result<(), AdminError>;

    /// Returns the spec of an existing topic.
    fn describe_topic(&self, topic: &TopicName) -> Result<TopicSpec, LogError>;

    /// Lists every topic on the broker, sorted by name.
    fn list_topics(&self) -> Result<Vec<TopicName>, LogError>;

    /// Appends one record.
    ///
    /// With `partition` unset the broker picks one: by key hash when a key is
    /// present, round-robin otherwise.
    fn append(
        &self,
        topic: &TopicName,
        partition: Option<PartitionId>,
        key: Option<Bytes>,
        value: Bytes,
        timestamp_ms: i64,
    ) -> Result<RecordMetadata, LogError>;

    /// Reads up to `max_records` records starting at `from`.
    ///
    /// Reading at or past the end returns an empty vector.
    fn read(
        &self,
        topic: &TopicName,
        partition: PartitionId,
        from: Offset,
        max_records: usize,
    ) -> Result<Vec<LogRecord>, LogError>;

    /// Returns the offset the next appended record will receive.
    fn end_offset(&self, topic: &TopicName, partition: PartitionId) -> Result<Offset, LogError>;

    /// Returns true if the topic exists.
    fn topic_exists(&self, topic: &TopicName) -> Result<bool, LogError> {
        match self.describe_topic(topic) {
            Ok(_) => Ok(true),
            Err(LogError::TopicNotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// Resolves the target partition for an append, validating explicit choices.
pub(crate) fn resolve_partition(
    spec: &TopicSpec,
    partitioner: &Partitioner,
    partition: Option<PartitionId>,
    key: Option<&[u8]>,
) -> Result<PartitionId, LogError> {
    match partition {
        Some(p) if p.as_u32() < spec.partitions => Ok(p),
        Some(p) => Err(LogError::PartitionOutOfRange {
            topic: spec.name.clone(),
            partition: p,
            partitions: spec.partitions,
        }),
        None => Ok(partitioner.select(key, spec.partitions)),
    }
}
