use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use quiz_core::model::{
    GradingResult, QuestionFeedback, QuestionId, RawQuestion, SessionConfig, SubmissionPayload,
};

use crate::sink::{ResultSink, SinkError};
use crate::source::{QuestionSource, SourceError};

//
// ─── QUESTION SOURCE ───────────────────────────────────────────────────────────
//

/// Question source serving a fixed list of records, for tests and offline demos.
#[derive(Clone, Default)]
pub struct StaticQuestionSource {
    records: Arc<Mutex<Vec<RawQuestion>>>,
    calls: Arc<Mutex<usize>>,
    fail_with: Arc<Mutex<Option<String>>>,
}

impl StaticQuestionSource {
    #[must_use]
    pub fn new(records: Vec<RawQuestion>) -> Self {
        Self {
            records: Arc::new(Mutex::new(records)),
            calls: Arc::new(Mutex::new(0)),
            fail_with: Arc::new(Mutex::new(None)),
        }
    }

    /// A source that always answers with an empty list.
    #[must_use]
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Make every following call fail with a connection error.
    #[must_use]
    pub fn failing(self, message: impl Into<String>) -> Self {
        if let Ok(mut guard) = self.fail_with.lock() {
            *guard = Some(message.into());
        }
        self
    }

    /// Number of `generate` calls received so far.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.lock().map(|guard| *guard).unwrap_or(0)
    }
}

#[async_trait]
impl QuestionSource for StaticQuestionSource {
    async fn generate(&self, config: &SessionConfig) -> Result<Vec<RawQuestion>, SourceError> {
        {
            let mut calls = self
                .calls
                .lock()
                .map_err(|e| SourceError::Connection(e.to_string()))?;
            *calls += 1;
        }

        let failure = self
            .fail_with
            .lock()
            .map_err(|e| SourceError::Connection(e.to_string()))?
            .clone();
        if let Some(message) = failure {
            return Err(SourceError::Connection(message));
        }

        let guard = self
            .records
            .lock()
            .map_err(|e| SourceError::Connection(e.to_string()))?;
        let limit = usize::try_from(config.question_count()).unwrap_or(usize::MAX);
        Ok(guard.iter().take(limit).cloned().collect())
    }
}

//
// ─── RESULT SINK ───────────────────────────────────────────────────────────────
//

#[derive(Default)]
struct SinkState {
    received: Vec<SubmissionPayload>,
    failures_left: usize,
}

/// Result sink that records every payload and grades against an answer key.
///
/// Stands in for the external grading service in tests.
#[derive(Clone, Default)]
pub struct RecordingSink {
    answer_key: Arc<HashMap<QuestionId, usize>>,
    state: Arc<Mutex<SinkState>>,
}

impl RecordingSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_answer_key<I>(mut self, key: I) -> Self
    where
        I: IntoIterator<Item = (QuestionId, usize)>,
    {
        self.answer_key = Arc::new(key.into_iter().collect());
        self
    }

    /// Reject the next `count` submissions with a connection error.
    pub fn fail_next(&self, count: usize) {
        if let Ok(mut state) = self.state.lock() {
            state.failures_left = count;
        }
    }

    /// Number of `submit` calls received, failed ones included.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.state
            .lock()
            .map(|state| state.received.len())
            .unwrap_or(0)
    }

    /// Every payload received so far, in arrival order.
    #[must_use]
    pub fn received(&self) -> Vec<SubmissionPayload> {
        self.state
            .lock()
            .map(|state| state.received.clone())
            .unwrap_or_default()
    }

    fn grade(&self, payload: &SubmissionPayload) -> GradingResult {
        let feedback: Vec<QuestionFeedback> = payload
            .answers
            .iter()
            .map(|entry| {
                let expected = self.answer_key.get(&entry.question_id).copied();
                QuestionFeedback {
                    question_id: entry.question_id.clone(),
                    correct: expected == Some(entry.selected_answer),
                    correct_answer: expected,
                }
            })
            .collect();
        let correct = feedback.iter().filter(|item| item.correct).count();

        GradingResult {
            correct: u32::try_from(correct).unwrap_or(u32::MAX),
            answered: u32::try_from(payload.answers.len()).unwrap_or(u32::MAX),
            total: payload.config.question_count(),
            feedback,
        }
    }
}

#[async_trait]
impl ResultSink for RecordingSink {
    async fn submit(&self, payload: &SubmissionPayload) -> Result<GradingResult, SinkError> {
        {
            let mut state = self
                .state
                .lock()
                .map_err(|e| SinkError::Connection(e.to_string()))?;
            state.received.push(payload.clone());
            if state.failures_left > 0 {
                state.failures_left -= 1;
                return Err(SinkError::Connection("injected failure".into()));
            }
        }
        Ok(self.grade(payload))
    }
}
