use serde::{Deserialize, Serialize};
use thiserror::Error;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("subject cannot be empty")]
    EmptySubject,

    #[error("topic cannot be empty")]
    EmptyTopic,

    #[error("difficulty cannot be empty")]
    EmptyDifficulty,

    #[error("question count must be > 0")]
    InvalidQuestionCount,

    #[error("time limit must be > 0 seconds")]
    InvalidTimeLimit,
}

//
// ─── DRAFT ─────────────────────────────────────────────────────────────────────
//

/// Unvalidated session configuration as entered by the learner.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SessionConfigDraft {
    pub subject: String,
    pub topic: String,
    pub difficulty: String,
    pub question_count: u32,
    pub time_limit_seconds: u32,
}

impl SessionConfigDraft {
    #[must_use]
    pub fn new(
        subject: impl Into<String>,
        topic: impl Into<String>,
        difficulty: impl Into<String>,
        question_count: u32,
        time_limit_seconds: u32,
    ) -> Self {
        Self {
            subject: subject.into(),
            topic: topic.into(),
            difficulty: difficulty.into(),
            question_count,
            time_limit_seconds,
        }
    }

    /// Validate and normalize the draft.
    ///
    /// Text fields are trimmed and passed through otherwise verbatim.
    ///
    /// # Errors
    ///
    /// Returns the first `ConfigError` found, checking fields in declaration order.
    pub fn validate(self) -> Result<SessionConfig, ConfigError> {
        let subject = normalize(self.subject).ok_or(ConfigError::EmptySubject)?;
        let topic = normalize(self.topic).ok_or(ConfigError::EmptyTopic)?;
        let difficulty = normalize(self.difficulty).ok_or(ConfigError::EmptyDifficulty)?;

        if self.question_count == 0 {
            return Err(ConfigError::InvalidQuestionCount);
        }
        if self.time_limit_seconds == 0 {
            return Err(ConfigError::InvalidTimeLimit);
        }

        Ok(SessionConfig {
            subject,
            topic,
            difficulty,
            question_count: self.question_count,
            time_limit_seconds: self.time_limit_seconds,
        })
    }
}

//
// ─── CONFIG ────────────────────────────────────────────────────────────────────
//

/// Validated, immutable configuration of one assessment attempt.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfig {
    subject: String,
    topic: String,
    difficulty: String,
    question_count: u32,
    time_limit_seconds: u32,
}

impl SessionConfig {
    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    #[must_use]
    pub fn difficulty(&self) -> &str {
        &self.difficulty
    }

    #[must_use]
    pub fn question_count(&self) -> u32 {
        self.question_count
    }

    #[must_use]
    pub fn time_limit_seconds(&self) -> u32 {
        self.time_limit_seconds
    }
}

fn normalize(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
