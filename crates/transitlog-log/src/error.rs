//! Log and admin error types.

use transitlog_types::{Offset, PartitionId, TopicName};

/// Errors from reading or appending to the log.
#[derive(thiserror::Error, Debug)]
pub enum LogError {
    #[error("topic not found: {0}")]
    TopicNotFound(TopicName),

    #[error("partition {partition} out of range for topic {topic} ({partitions} partitions)")]
    PartitionOutOfRange {
        topic: TopicName,
        partition: PartitionId,
        partitions: u32,
    },

    /// The broker refused the record.
    #[error("append to {topic} rejected: {reason}")]
    Rejected { topic: TopicName, reason: String },

    #[error("filesystem error")]
    Io(#[from] std::io::Error),

    #[error("unexpected end of file")]
    UnexpectedEof,

    #[error("corrupted record: CRC mismatch")]
    CorruptedRecord,

    #[error("record offset mismatch in {topic}/{partition}: expected {expected}, found {found}")]
    OffsetMismatch {
        topic: TopicName,
        partition: PartitionId,
        expected: Offset,
        found: Offset,
    },

    #[error("invalid topic manifest: {0}")]
    Manifest(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl LogError {
    pub(crate) fn poisoned() -> Self {
        Self::Internal("lock poisoned".to_string())
    }
}

/// Errors from topic administration.
#[derive(thiserror::Error, Debug)]
pub enum AdminError {
    #[error("topic already exists: {0}")]
    TopicAlreadyExists(TopicName),

    #[error("invalid topic {topic}: {reason}")]
    InvalidTopic { topic: TopicName, reason: String },

    /// The broker refused to create the topic.
    #[error("create topic {topic} rejected: {reason}")]
    Rejected { topic: TopicName, reason: String },

    #[error(transparent)]
    Log(#[from] LogError),
}

impl AdminError {
    /// Returns true if this error only says the topic is already there.
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::TopicAlreadyExists(_))
    }
}

impl From<std::io::Error> for AdminError {
    fn from(e: std::io::Error) -> Self {
        Self::Log(LogError::Io(e))
    }
}
