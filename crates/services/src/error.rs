//! Shared error types for the services crate.

use thiserror::Error;

use providers::{SinkError, SourceError};
use quiz_core::model::{ConfigError, QuestionId};

use crate::sessions::{SessionEvent, SessionState};

/// Errors emitted by the assessment session and its workflow.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(#[from] ConfigError),

    #[error("no valid questions in source response")]
    NoValidQuestions,

    #[error("`{event}` is not allowed while the session is {state}")]
    InvalidStateTransition {
        state: SessionState,
        event: SessionEvent,
    },

    #[error("option {option} is out of range for question {question_id} ({options} options)")]
    InvalidOption {
        question_id: QuestionId,
        option: usize,
        options: usize,
    },

    #[error("question source failed: {0}")]
    SourceFailure(#[from] SourceError),

    #[error("result delivery failed: {0}")]
    SinkFailure(#[from] SinkError),
}
