use thiserror::Error;

use crate::providers::{LogFetchError, TransportError};
use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("State store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("State store holds an unreadable entry: {0}")]
    StoreCorrupt(String),

    #[error("Pipeline {pipeline_id} kept changing underneath us ({attempts} attempts)")]
    StoreContention { pipeline_id: u64, attempts: u32 },

    #[error("Chat transport rejected the message: {0}")]
    TransportRejected(#[from] TransportError),

    #[error("Failed to fetch job output: {0}")]
    LogFetch(#[from] LogFetchError),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<StoreError> for RelayError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(msg) => Self::StoreUnavailable(msg),
            StoreError::Corrupt(msg) => Self::StoreCorrupt(msg),
            StoreError::Conflict { pipeline_id, .. } => Self::StoreContention {
                pipeline_id,
                attempts: 1,
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, RelayError>;
