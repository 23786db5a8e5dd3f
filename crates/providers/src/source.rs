use async_trait::async_trait;
use quiz_core::model::{RawQuestion, SessionConfig};
use thiserror::Error;

/// Errors surfaced by question sources.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SourceError {
    #[error("question source is not configured")]
    Disabled,

    #[error("question source returned an empty response")]
    EmptyResponse,

    #[error("question source response could not be parsed: {0}")]
    Malformed(String),

    #[error("question source request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("connection error: {0}")]
    Connection(String),
}

/// Provider of question-shaped records for a session configuration.
///
/// Implementations should honor `config.question_count()` and return complete
/// records, but callers validate and filter the result regardless.
#[async_trait]
pub trait QuestionSource: Send + Sync {
    /// Generate questions for the given configuration.
    ///
    /// # Errors
    ///
    /// Returns `SourceError` when the provider cannot be reached or its answer is unusable.
    async fn generate(&self, config: &SessionConfig) -> Result<Vec<RawQuestion>, SourceError>;
}
