use std::cell::Cell;
use std::collections::BTreeSet;

use quiz_core::model::{Question, QuestionSet};
use tracing::warn;

/// Result of a navigation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Move {
    pub from: usize,
    pub to: usize,
}

impl Move {
    #[must_use]
    pub fn changed(&self) -> bool {
        self.from != self.to
    }
}

/// Owns the current-question pointer and the review flags.
///
/// The pointer is clamped on every move and healed on every read, so an index
/// outside `[0, len - 1]` is never observable from outside.
#[derive(Debug)]
pub struct Navigator {
    questions: QuestionSet,
    current: Cell<usize>,
    flags: BTreeSet<usize>,
}

#[allow(clippy::len_without_is_empty)]
impl Navigator {
    #[must_use]
    pub fn new(questions: QuestionSet) -> Self {
        Self {
            questions,
            current: Cell::new(0),
            flags: BTreeSet::new(),
        }
    }

    /// Rehydrate a navigator from saved state.
    ///
    /// Flags outside the question list are dropped. The index is taken as-is and
    /// healed on first inspection.
    #[must_use]
    pub fn from_persisted(
        questions: QuestionSet,
        current: usize,
        flags: impl IntoIterator<Item = usize>,
    ) -> Self {
        let len = questions.len();
        Self {
            questions,
            current: Cell::new(current),
            flags: flags.into_iter().filter(|index| *index < len).collect(),
        }
    }

    #[must_use]
    pub fn questions(&self) -> &QuestionSet {
        &self.questions
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    /// Current index, reset to 0 (with a warning) if it was found out of range.
    #[must_use]
    pub fn current_index(&self) -> usize {
        let index = self.current.get();
        if index < self.questions.len() {
            return index;
        }
        warn!(
            index,
            len = self.questions.len(),
            "current question index out of range, resetting to 0"
        );
        self.current.set(0);
        0
    }

    #[must_use]
    pub fn current_question(&self) -> &Question {
        let index = self.current_index();
        self.questions
            .get(index)
            .unwrap_or_else(|| self.questions.first())
    }

    #[must_use]
    pub fn is_first(&self) -> bool {
        self.current_index() == 0
    }

    #[must_use]
    pub fn is_last(&self) -> bool {
        self.current_index() == self.questions.last_index()
    }

    /// Move to `index`, clamped into the valid range.
    pub fn go_to(&mut self, index: isize) -> Move {
        let from = self.current_index();
        let last = self.questions.last_index();
        let to = usize::try_from(index).map_or(0, |index| index.min(last));
        self.current.set(to);
        Move { from, to }
    }

    pub fn next(&mut self) -> Move {
        let from = self.current_index();
        if self.is_last() {
            return Move { from, to: from };
        }
        self.step(from, from + 1)
    }

    pub fn previous(&mut self) -> Move {
        let from = self.current_index();
        if from == 0 {
            return Move { from, to: from };
        }
        self.step(from, from - 1)
    }

    fn step(&mut self, from: usize, to: usize) -> Move {
        self.current.set(to);
        Move { from, to }
    }

    /// Flip the review flag on `index`.
    ///
    /// Returns the new flag state, or `None` when `index` is not a question.
    pub fn toggle_flag(&mut self, index: usize) -> Option<bool> {
        if index >= self.questions.len() {
            return None;
        }
        if self.flags.remove(&index) {
            Some(false)
        } else {
            self.flags.insert(index);
            Some(true)
        }
    }

    #[must_use]
    pub fn is_flagged(&self, index: usize) -> bool {
        self.flags.contains(&index)
    }

    #[must_use]
    pub fn flags(&self) -> &BTreeSet<usize> {
        &self.flags
    }
}
