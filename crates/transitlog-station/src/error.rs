//! Station error types.

use transitlog_producer::{ProducerError, ProvisionError};
use transitlog_schema::SchemaError;

#[derive(thiserror::Error, Debug)]
pub enum StationError {
    #[error("failed to provision station topic")]
    Provision(#[from] ProvisionError),

    #[error("failed to publish arrival")]
    Publish(#[from] ProducerError),

    #[error("failed to register arrival schemas")]
    Schema(#[from] SchemaError),
}
