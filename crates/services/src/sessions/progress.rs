use serde::Serialize;

use super::state::SessionState;

/// Aggregated view of session progress, useful for UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionProgress {
    pub state: SessionState,
    pub total: usize,
    pub answered: usize,
    pub flagged: usize,
    pub current_index: Option<usize>,
    pub remaining_seconds: u32,
}

impl SessionProgress {
    #[must_use]
    pub fn unanswered(&self) -> usize {
        self.total.saturating_sub(self.answered)
    }
}

/// Status of one question in the navigation palette.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionSlot {
    pub index: usize,
    pub current: bool,
    pub answered: bool,
    pub flagged: bool,
}
