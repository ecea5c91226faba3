//! Outbound collaborators: the chat platform that hosts the pipeline
//! message and the CI system that serves job output.

pub mod gitlab;
pub mod slack;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::pipeline::{JobId, MessageRef};

pub use gitlab::GitLabClient;
pub use slack::SlackClient;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("rejected by chat platform: {0}")]
    Rejected(String),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("unexpected response: {0}")]
    Malformed(String),
}

#[derive(Debug, Error)]
pub enum LogFetchError {
    #[error("job {job_id} output unavailable (status {status})")]
    Status { job_id: JobId, status: u16 },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("invalid request: {0}")]
    Request(String),
}

/// Posts and edits rich chat messages.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Posts a new message and returns where it landed.
    async fn create_message(
        &self,
        channel: &str,
        blocks: &[Value],
        text: &str,
    ) -> Result<MessageRef, TransportError>;

    /// Replaces the content of an existing message.
    async fn update_message(
        &self,
        message: &MessageRef,
        blocks: &[Value],
        text: &str,
    ) -> Result<(), TransportError>;
}

/// Fetches the raw console output of a CI job.
#[async_trait]
pub trait JobLogSource: Send + Sync {
    async fn fetch_job_text(&self, job_id: JobId) -> Result<String, LogFetchError>;
}

/// No log source configured: every fetch fails, so diagnostic controls stay
/// clickable and the failure is logged.
#[async_trait]
impl<L: JobLogSource> JobLogSource for Option<L> {
    async fn fetch_job_text(&self, job_id: JobId) -> Result<String, LogFetchError> {
        match self {
            Some(source) => source.fetch_job_text(job_id).await,
            None => Err(LogFetchError::Request(format!(
                "no GitLab project configured to fetch job {job_id}"
            ))),
        }
    }
}
