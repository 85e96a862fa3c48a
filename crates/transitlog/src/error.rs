use thiserror::Error;
use transitlog_log::{AdminError, LogError};
use transitlog_schema::SchemaError;
use transitlog_station::StationError;
use transitlog_stream::StreamError;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("log error: {0}")]
    Log(#[from] LogError),

    #[error("topic administration failed: {0}")]
    Admin(#[from] AdminError),

    #[error("schema registration failed: {0}")]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Station(#[from] StationError),

    #[error(transparent)]
    Stream(#[from] StreamError),
}

pub type Result<T> = std::result::Result<T, RuntimeError>;
