use std::collections::HashMap;

use chrono::{DateTime, Utc};
use quiz_core::model::QuestionId;
use quiz_core::time::whole_seconds_between;
use tracing::debug;

//
// ─── PER-QUESTION TIME ─────────────────────────────────────────────────────────
//

/// Time committed to one question at a checkpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkpoint {
    pub question_id: QuestionId,
    pub delta_seconds: u64,
    pub total_seconds: u64,
}

/// Attributes wall-clock time to whichever question is on screen.
///
/// Time is committed only at checkpoints, in whole floored seconds, to the
/// question being left. Entries appear the first time a question is left.
#[derive(Debug, Default)]
pub struct TimeLedger {
    timings: HashMap<QuestionId, u64>,
    viewing: Option<(QuestionId, DateTime<Utc>)>,
    frozen: bool,
}

impl TimeLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start timing the first question of an attempt.
    pub fn begin(&mut self, question_id: &QuestionId, now: DateTime<Utc>) {
        self.timings.clear();
        self.frozen = false;
        self.viewing = Some((question_id.clone(), now));
    }

    /// Commit time for the question on screen, then start timing `entered`.
    ///
    /// `entered` may be the same question (answer selection). No-op once frozen.
    pub fn checkpoint(&mut self, entered: &QuestionId, now: DateTime<Utc>) -> Option<Checkpoint> {
        if self.frozen {
            return None;
        }
        let committed = self.commit(now);
        self.viewing = Some((entered.clone(), now));
        committed
    }

    /// Take the final checkpoint and stop accepting time.
    pub fn freeze(&mut self, now: DateTime<Utc>) -> Option<Checkpoint> {
        if self.frozen {
            return None;
        }
        let committed = self.commit(now);
        self.viewing = None;
        self.frozen = true;
        committed
    }

    fn commit(&mut self, now: DateTime<Utc>) -> Option<Checkpoint> {
        let (question_id, started_at) = self.viewing.take()?;
        let delta_seconds = whole_seconds_between(started_at, now);
        let total = self.timings.entry(question_id.clone()).or_insert(0);
        *total = total.saturating_add(delta_seconds);
        debug!(question = %question_id, delta_seconds, total_seconds = *total, "time checkpoint");
        Some(Checkpoint {
            total_seconds: *total,
            question_id,
            delta_seconds,
        })
    }

    #[must_use]
    pub fn time_spent(&self, question_id: &QuestionId) -> Option<u64> {
        self.timings.get(question_id).copied()
    }

    #[must_use]
    pub fn timings(&self) -> &HashMap<QuestionId, u64> {
        &self.timings
    }

    /// Sum of all committed time.
    #[must_use]
    pub fn total_recorded(&self) -> u64 {
        self.timings.values().sum()
    }

    /// Question currently being timed.
    #[must_use]
    pub fn viewing(&self) -> Option<&QuestionId> {
        self.viewing.as_ref().map(|(id, _)| id)
    }

    #[must_use]
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

//
// ─── COUNTDOWN ─────────────────────────────────────────────────────────────────
//

/// Outcome of one countdown tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownTick {
    Running { remaining: u32 },
    /// Reached zero on this tick. Reported exactly once.
    Expired,
    Stopped,
}

/// Global per-attempt countdown, advanced by discrete one-second ticks.
#[derive(Debug, Default)]
pub struct Countdown {
    remaining: u32,
    running: bool,
}

impl Countdown {
    #[must_use]
    pub fn start(seconds: u32) -> Self {
        Self {
            remaining: seconds,
            running: true,
        }
    }

    pub fn tick(&mut self) -> CountdownTick {
        if !self.running {
            return CountdownTick::Stopped;
        }
        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            self.running = false;
            return CountdownTick::Expired;
        }
        CountdownTick::Running {
            remaining: self.remaining,
        }
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    #[must_use]
    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running
    }
}
