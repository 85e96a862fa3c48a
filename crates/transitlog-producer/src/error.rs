//! Producer error types.

use transitlog_log::AdminError;
use transitlog_schema::SchemaError;
use transitlog_types::TopicName;

/// A topic could not be provisioned.
#[derive(thiserror::Error, Debug)]
pub enum ProvisionError {
    #[error("failed to create topic {topic}")]
    Admin {
        topic: TopicName,
        #[source]
        source: AdminError,
    },

    #[error("internal error: {0}")]
    Internal(String),
}

/// A record was refused before it was buffered.
#[derive(thiserror::Error, Debug)]
pub enum ProducerError {
    #[error("failed to serialize record for {topic}")]
    Serialize {
        topic: TopicName,
        #[source]
        source: SchemaError,
    },
}

/// Why a buffered record never reached the log.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("delivery to {topic} failed: {reason}")]
    Rejected { topic: TopicName, reason: String },

    /// The producer was dropped with the record still buffered.
    #[error("producer dropped before delivering to {topic}")]
    Dropped { topic: TopicName },
}
