use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::config::SessionConfig;
use crate::model::ids::QuestionId;

//
// ─── PAYLOAD ───────────────────────────────────────────────────────────────────
//

/// One answered question as sent to the result sink.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerEntry {
    pub question_id: QuestionId,
    pub selected_answer: usize,
    pub time_spent_seconds: u64,
}

/// How the session left the active state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SubmissionTrigger {
    Manual,
    Timeout,
}

/// Write-once artifact built at the end of an attempt.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionPayload {
    pub answers: Vec<AnswerEntry>,
    pub total_time_spent_seconds: u64,
    pub config: SessionConfig,
    pub started_at: DateTime<Utc>,
    pub submitted_at: DateTime<Utc>,
    pub trigger: SubmissionTrigger,
}

impl SubmissionPayload {
    #[must_use]
    pub fn answered_count(&self) -> usize {
        self.answers.len()
    }

    #[must_use]
    pub fn entry(&self, id: &QuestionId) -> Option<&AnswerEntry> {
        self.answers.iter().find(|entry| &entry.question_id == id)
    }
}

//
// ─── GRADING ───────────────────────────────────────────────────────────────────
//

/// Per-question verdict returned by the result sink.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionFeedback {
    pub question_id: QuestionId,
    pub correct: bool,
    #[serde(default)]
    pub correct_answer: Option<usize>,
}

/// Graded outcome of a submission, produced by the external sink.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradingResult {
    pub correct: u32,
    pub answered: u32,
    pub total: u32,
    #[serde(default)]
    pub feedback: Vec<QuestionFeedback>,
}

impl GradingResult {
    /// Share of correct answers over all questions, in percent.
    #[must_use]
    pub fn percentage(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        f64::from(self.correct) * 100.0 / f64::from(self.total)
    }
}
