//! Stream error types.

use transitlog_log::{AdminError, LogError};
use transitlog_types::{Offset, PartitionId, TopicName};

#[derive(thiserror::Error, Debug)]
pub enum StreamError {
    #[error(transparent)]
    Log(#[from] LogError),

    #[error(transparent)]
    Admin(#[from] AdminError),

    /// A record payload could not be decoded.
    #[error("undecodable record at {topic}/{partition}@{offset}")]
    Decode {
        topic: TopicName,
        partition: PartitionId,
        offset: Offset,
        #[source]
        source: serde_json::Error,
    },

    #[error("changelog record without a key at {topic}@{offset}")]
    MissingKey { topic: TopicName, offset: Offset },

    #[error("failed to encode table entry")]
    Encode(#[source] serde_json::Error),

    #[error("changelog {topic} must have exactly one partition, found {partitions}")]
    InvalidChangelog { topic: TopicName, partitions: u32 },
}

impl StreamError {
    /// Returns true if the error is confined to one bad record.
    pub fn is_malformed_record(&self) -> bool {
        matches!(self, Self::Decode { .. })
    }
}
