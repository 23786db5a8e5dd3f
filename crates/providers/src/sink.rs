use async_trait::async_trait;
use quiz_core::model::{GradingResult, SubmissionPayload};
use thiserror::Error;

/// Errors surfaced by result sinks.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SinkError {
    #[error("result sink is not configured")]
    Disabled,

    #[error("submission rejected: {0}")]
    Rejected(String),

    #[error("result sink request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("connection error: {0}")]
    Connection(String),
}

/// Consumer of finished attempts. Grades the payload and reports the outcome.
#[async_trait]
pub trait ResultSink: Send + Sync {
    /// Deliver a submission and return its grading.
    ///
    /// Must be safe to call again with the same payload after a failure.
    ///
    /// # Errors
    ///
    /// Returns `SinkError` if the submission could not be delivered or was rejected.
    async fn submit(&self, payload: &SubmissionPayload) -> Result<GradingResult, SinkError>;
}
