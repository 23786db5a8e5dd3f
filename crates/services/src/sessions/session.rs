use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use quiz_core::model::{
    GradingResult, Question, QuestionId, QuestionSet, RawQuestion,
    SessionConfig, SessionConfigDraft, SubmissionPayload, SubmissionTrigger,
};
use quiz_core::Clock;
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

use super::assembler::{Assembly, assemble};
use super::ledger::{Countdown, CountdownTick, TimeLedger};
use super::navigator::{Move, Navigator};
use super::progress::{QuestionSlot, SessionProgress};
use super::state::{SessionEvent, SessionState};
use crate::error::SessionError;

//
// ─── OUTCOMES ──────────────────────────────────────────────────────────────────
//

/// Result of handing a source response to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The session is now active.
    Activated { questions: usize, dropped: usize },
    /// The session had left `Loading` before the response arrived.
    Discarded,
}

/// Result of one countdown tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    Running { remaining: u32 },
    /// The countdown reached zero and the session was submitted.
    Expired(SubmissionPayload),
    /// The session is not active; nothing happened.
    Discarded,
}

/// Result of a submit request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Submitted(SubmissionPayload),
    AlreadySubmitted,
}

#[derive(Debug, Clone, Default)]
enum Delivery {
    #[default]
    Pending,
    /// Held by the live [`DeliveryClaim`]. A dead reference means the claim was
    /// dropped before it finished.
    InFlight(Weak<()>),
    Delivered(GradingResult),
}

/// Exclusive right to hand the stored payload to the result sink.
#[derive(Debug)]
pub(crate) struct DeliveryClaim {
    payload: SubmissionPayload,
    token: Arc<()>,
}

impl DeliveryClaim {
    pub(crate) fn payload(&self) -> &SubmissionPayload {
        &self.payload
    }
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// One timed assessment attempt, from configuration to results.
///
/// All mutation goes through the methods below, which consult the lifecycle
/// table in [`SessionState::transition`] before touching any state.
pub struct Session {
    clock: Clock,
    state: SessionState,
    config: Option<SessionConfig>,
    navigator: Option<Navigator>,
    answers: HashMap<QuestionId, usize>,
    ledger: TimeLedger,
    countdown: Countdown,
    started_at: Option<DateTime<Utc>>,
    payload: Option<SubmissionPayload>,
    delivery: Delivery,
    attempt: u64,
    countdown_task: Option<AbortHandle>,
}

impl Session {
    #[must_use]
    pub fn new(clock: Clock) -> Self {
        Self {
            clock,
            state: SessionState::Configuring,
            config: None,
            navigator: None,
            answers: HashMap::new(),
            ledger: TimeLedger::new(),
            countdown: Countdown::default(),
            started_at: None,
            payload: None,
            delivery: Delivery::Pending,
            attempt: 0,
            countdown_task: None,
        }
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    #[must_use]
    pub fn config(&self) -> Option<&SessionConfig> {
        self.config.as_ref()
    }

    #[must_use]
    pub fn clock(&self) -> Clock {
        self.clock
    }

    /// Mutable access to the session clock, for drivers that advance a fixed clock.
    pub fn clock_mut(&mut self) -> &mut Clock {
        &mut self.clock
    }

    #[must_use]
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// Number of attempts activated on this session so far.
    #[must_use]
    pub fn attempt(&self) -> u64 {
        self.attempt
    }

    fn transition(&mut self, event: SessionEvent) -> Result<(), SessionError> {
        let next = self.state.transition(event)?;
        if next != self.state {
            info!(from = %self.state, to = %next, %event, "session transition");
        }
        self.state = next;
        Ok(())
    }

    fn guard(&self, event: SessionEvent) -> Result<(), SessionError> {
        self.state.transition(event).map(|_| ())
    }

    //
    // ─── LOADING ──────────────────────────────────────────────────────────────
    //

    /// Validate the configuration and move to `Loading`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidStateTransition` outside `Configuring`, and
    /// `InvalidConfiguration` if the draft fails validation (the session stays
    /// in `Configuring`).
    pub fn start(&mut self, draft: SessionConfigDraft) -> Result<&SessionConfig, SessionError> {
        self.guard(SessionEvent::Start)?;
        let config = draft.validate().inspect_err(|err| {
            debug!(%err, "rejected session configuration");
        })?;
        self.transition(SessionEvent::Start)?;
        Ok(self.config.insert(config))
    }

    /// Accept the question source response.
    ///
    /// Responses arriving after the session left `Loading` are discarded.
    ///
    /// # Errors
    ///
    /// Returns `NoValidQuestions` if nothing survives filtering; the session falls
    /// back to `Configuring`.
    pub fn questions_ready(&mut self, raw: Vec<RawQuestion>) -> Result<LoadOutcome, SessionError> {
        if self.state != SessionState::Loading {
            debug!(state = %self.state, "discarding late question response");
            return Ok(LoadOutcome::Discarded);
        }

        let loaded = match QuestionSet::from_raw(raw) {
            Ok(loaded) => loaded,
            Err(err) => {
                warn!(%err, "question source returned no usable questions");
                self.abandon_load()?;
                return Err(SessionError::NoValidQuestions);
            }
        };
        if loaded.dropped > 0 {
            warn!(dropped = loaded.dropped, "dropped malformed question records");
        }

        let time_limit = self
            .config
            .as_ref()
            .map_or(0, SessionConfig::time_limit_seconds);
        let now = self.clock.now();
        let count = loaded.questions.len();

        self.transition(SessionEvent::QuestionsReady)?;
        self.attempt += 1;
        self.ledger.begin(loaded.questions.first().id(), now);
        self.navigator = Some(Navigator::new(loaded.questions));
        self.countdown = Countdown::start(time_limit);
        self.started_at = Some(now);

        Ok(LoadOutcome::Activated {
            questions: count,
            dropped: loaded.dropped,
        })
    }

    /// Return to `Configuring` after the question source failed.
    ///
    /// # Errors
    ///
    /// Returns `InvalidStateTransition` outside `Loading`.
    pub fn load_failed(&mut self) -> Result<(), SessionError> {
        self.abandon_load()
    }

    fn abandon_load(&mut self) -> Result<(), SessionError> {
        self.transition(SessionEvent::LoadFailed)?;
        self.config = None;
        Ok(())
    }

    //
    // ─── NAVIGATION ───────────────────────────────────────────────────────────
    //

    fn navigator_for(&mut self, event: SessionEvent) -> Result<&mut Navigator, SessionError> {
        self.guard(event)?;
        let state = self.state;
        self.navigator
            .as_mut()
            .ok_or(SessionError::InvalidStateTransition { state, event })
    }

    fn navigate(&mut self, apply: impl FnOnce(&mut Navigator) -> Move) -> Result<usize, SessionError> {
        let now = self.clock.now();
        let navigator = self.navigator_for(SessionEvent::Navigate)?;
        let step = apply(&mut *navigator);
        if step.changed() {
            let entered = navigator.current_question().id().clone();
            self.ledger.checkpoint(&entered, now);
        }
        Ok(step.to)
    }

    /// Jump to a question. Out-of-range indices are clamped.
    ///
    /// # Errors
    ///
    /// Returns `InvalidStateTransition` unless the session is active.
    pub fn go_to(&mut self, index: isize) -> Result<usize, SessionError> {
        self.navigate(|nav| nav.go_to(index))
    }

    /// # Errors
    ///
    /// Returns `InvalidStateTransition` unless the session is active.
    pub fn next(&mut self) -> Result<usize, SessionError> {
        self.navigate(Navigator::next)
    }

    /// # Errors
    ///
    /// Returns `InvalidStateTransition` unless the session is active.
    pub fn previous(&mut self) -> Result<usize, SessionError> {
        self.navigate(Navigator::previous)
    }

    /// Flip the review flag on a question. Unknown indices return `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidStateTransition` unless the session is active.
    pub fn toggle_flag(&mut self, index: usize) -> Result<Option<bool>, SessionError> {
        let navigator = self.navigator_for(SessionEvent::Flag)?;
        Ok(navigator.toggle_flag(index))
    }

    #[must_use]
    pub fn navigator(&self) -> Option<&Navigator> {
        self.navigator.as_ref()
    }

    #[must_use]
    pub fn questions(&self) -> Option<&QuestionSet> {
        self.navigator.as_ref().map(Navigator::questions)
    }

    #[must_use]
    pub fn current_index(&self) -> Option<usize> {
        self.navigator.as_ref().map(Navigator::current_index)
    }

    #[must_use]
    pub fn current_question(&self) -> Option<&Question> {
        self.navigator.as_ref().map(Navigator::current_question)
    }

    //
    // ─── ANSWERS ──────────────────────────────────────────────────────────────
    //

    /// Record the learner's choice for the current question.
    ///
    /// # Errors
    ///
    /// Returns `InvalidStateTransition` unless active, or `InvalidOption` if the
    /// question has no option at `option`.
    pub fn select_answer(&mut self, option: usize) -> Result<(), SessionError> {
        let now = self.clock.now();
        let navigator = self.navigator_for(SessionEvent::Answer)?;
        let question = navigator.current_question();
        if option >= question.option_count() {
            return Err(SessionError::InvalidOption {
                question_id: question.id().clone(),
                option,
                options: question.option_count(),
            });
        }
        let question_id = question.id().clone();

        self.ledger.checkpoint(&question_id, now);
        self.answers.insert(question_id, option);
        Ok(())
    }

    /// Remove the answer for the current question, if any.
    ///
    /// # Errors
    ///
    /// Returns `InvalidStateTransition` unless the session is active.
    pub fn clear_answer(&mut self) -> Result<bool, SessionError> {
        let now = self.clock.now();
        let navigator = self.navigator_for(SessionEvent::Answer)?;
        let question_id = navigator.current_question().id().clone();

        self.ledger.checkpoint(&question_id, now);
        Ok(self.answers.remove(&question_id).is_some())
    }

    #[must_use]
    pub fn answer_for(&self, question_id: &QuestionId) -> Option<usize> {
        self.answers.get(question_id).copied()
    }

    #[must_use]
    pub fn answers(&self) -> &HashMap<QuestionId, usize> {
        &self.answers
    }

    #[must_use]
    pub fn timings(&self) -> &HashMap<QuestionId, u64> {
        self.ledger.timings()
    }

    //
    // ─── TIME ─────────────────────────────────────────────────────────────────
    //

    /// Advance the countdown by one second, submitting on expiry.
    pub fn tick(&mut self) -> TickOutcome {
        if self.guard(SessionEvent::Tick).is_err() {
            debug!(state = %self.state, "discarding countdown tick");
            return TickOutcome::Discarded;
        }
        match self.countdown.tick() {
            CountdownTick::Running { remaining } => TickOutcome::Running { remaining },
            CountdownTick::Expired => {
                info!("time limit reached, submitting");
                match self.complete(SubmissionTrigger::Timeout) {
                    Ok(payload) => TickOutcome::Expired(payload),
                    Err(err) => {
                        warn!(%err, "timeout submission failed");
                        TickOutcome::Discarded
                    }
                }
            }
            CountdownTick::Stopped => TickOutcome::Discarded,
        }
    }

    /// Tick on behalf of the countdown started for `attempt`.
    ///
    /// Ticks from a countdown belonging to an earlier attempt are discarded.
    pub(crate) fn tick_for(&mut self, attempt: u64) -> TickOutcome {
        if attempt != self.attempt {
            debug!(attempt, current = self.attempt, "discarding tick from stale countdown");
            return TickOutcome::Discarded;
        }
        self.tick()
    }

    /// Register the task driving the countdown, stopping any previous one.
    pub(crate) fn attach_countdown(&mut self, task: AbortHandle) {
        if let Some(previous) = self.countdown_task.replace(task) {
            previous.abort();
        }
    }

    fn stop_countdown_task(&mut self) {
        if let Some(task) = self.countdown_task.take() {
            task.abort();
        }
    }

    #[must_use]
    pub fn remaining_seconds(&self) -> u32 {
        self.countdown.remaining()
    }

    /// True while active with at most `threshold_seconds` left.
    #[must_use]
    pub fn is_low_time(&self, threshold_seconds: u32) -> bool {
        self.state.is_active() && self.countdown.remaining() <= threshold_seconds
    }

    //
    // ─── SUBMISSION ───────────────────────────────────────────────────────────
    //

    /// Finish the attempt and build the payload.
    ///
    /// A second call after completion is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `InvalidStateTransition` in `Configuring` or `Loading`.
    pub fn submit(&mut self) -> Result<SubmitOutcome, SessionError> {
        if self.state.is_completed() {
            debug!("submit ignored, session already completed");
            return Ok(SubmitOutcome::AlreadySubmitted);
        }
        let payload = self.complete(SubmissionTrigger::Manual)?;
        Ok(SubmitOutcome::Submitted(payload))
    }

    fn complete(&mut self, trigger: SubmissionTrigger) -> Result<SubmissionPayload, SessionError> {
        let next = self.state.transition(SessionEvent::Submit)?;
        let (Some(navigator), Some(config)) = (self.navigator.as_ref(), self.config.as_ref()) else {
            return Err(SessionError::InvalidStateTransition {
                state: self.state,
                event: SessionEvent::Submit,
            });
        };

        let now = self.clock.now();
        self.ledger.freeze(now);
        self.countdown.stop();
        if let Some(task) = self.countdown_task.take() {
            task.abort();
        }

        let payload = assemble(Assembly {
            questions: navigator.questions(),
            answers: &self.answers,
            ledger: &self.ledger,
            config,
            started_at: self.started_at.unwrap_or(now),
            submitted_at: now,
            trigger,
        });

        self.state = next;
        info!(
            answered = payload.answers.len(),
            total_seconds = payload.total_time_spent_seconds,
            ?trigger,
            "session completed"
        );
        Ok(self.payload.insert(payload).clone())
    }

    /// The submission payload, once completed.
    #[must_use]
    pub fn payload(&self) -> Option<&SubmissionPayload> {
        self.payload.as_ref()
    }

    #[must_use]
    pub fn grading(&self) -> Option<&GradingResult> {
        match &self.delivery {
            Delivery::Delivered(result) => Some(result),
            _ => None,
        }
    }

    /// Claim the payload for delivery.
    ///
    /// Returns `None` while another claim is alive or after a successful delivery.
    /// A claim dropped without being finished is taken over.
    pub(crate) fn begin_delivery(&mut self) -> Result<Option<DeliveryClaim>, SessionError> {
        self.guard(SessionEvent::Deliver)?;
        match &self.delivery {
            Delivery::Delivered(_) => return Ok(None),
            Delivery::InFlight(holder) if holder.strong_count() > 0 => return Ok(None),
            Delivery::InFlight(_) => warn!("taking over abandoned delivery"),
            Delivery::Pending => {}
        }
        let Some(payload) = self.payload.clone() else {
            return Ok(None);
        };
        let token = Arc::new(());
        self.delivery = Delivery::InFlight(Arc::downgrade(&token));
        Ok(Some(DeliveryClaim { payload, token }))
    }

    /// Record the sink's answer for `claim`. `None` releases the payload for retry.
    pub(crate) fn finish_delivery(&mut self, claim: DeliveryClaim, result: Option<GradingResult>) {
        if !self.state.is_completed() {
            return;
        }
        let Delivery::InFlight(holder) = &self.delivery else {
            return;
        };
        if !holder.ptr_eq(&Arc::downgrade(&claim.token)) {
            return;
        }
        self.delivery = match result {
            Some(result) => Delivery::Delivered(result),
            None => Delivery::Pending,
        };
    }

    /// Return to `Configuring`, discarding the attempt.
    ///
    /// # Errors
    ///
    /// Returns `InvalidStateTransition` unless the session is completed.
    pub fn reset(&mut self) -> Result<(), SessionError> {
        self.transition(SessionEvent::Reset)?;
        self.stop_countdown_task();
        let attempt = self.attempt;
        *self = Self::new(self.clock);
        self.attempt = attempt;
        Ok(())
    }

    //
    // ─── VIEWS ────────────────────────────────────────────────────────────────
    //

    #[must_use]
    pub fn progress(&self) -> SessionProgress {
        SessionProgress {
            state: self.state,
            total: self.navigator.as_ref().map_or(0, Navigator::len),
            answered: self.answers.len(),
            flagged: self.navigator.as_ref().map_or(0, |nav| nav.flags().len()),
            current_index: self.current_index(),
            remaining_seconds: self.countdown.remaining(),
        }
    }

    /// Per-question status for the navigation palette.
    #[must_use]
    pub fn palette(&self) -> Vec<QuestionSlot> {
        let Some(navigator) = self.navigator.as_ref() else {
            return Vec::new();
        };
        let current = navigator.current_index();
        navigator
            .questions()
            .iter()
            .enumerate()
            .map(|(index, question)| QuestionSlot {
                index,
                current: index == current,
                answered: self.answers.contains_key(question.id()),
                flagged: navigator.is_flagged(index),
            })
            .collect()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state)
            .field("config", &self.config)
            .field("questions_len", &self.navigator.as_ref().map(Navigator::len))
            .field("current", &self.current_index())
            .field("answers_len", &self.answers.len())
            .field("remaining_seconds", &self.countdown.remaining())
            .field("started_at", &self.started_at)
            .field("delivered", &self.grading().is_some())
            .finish_non_exhaustive()
    }
}
