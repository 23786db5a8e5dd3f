use std::sync::Arc;
use std::time::Duration;

use providers::{QuestionSource, ResultSink};
use quiz_core::model::{GradingResult, SessionConfigDraft};
use quiz_core::Clock;
use rand::seq::SliceRandom;
use tokio::sync::{Mutex, mpsc};
use tracing::{info, warn};

use super::countdown::{CountdownEvent, CountdownHandle, SharedSession, TICK_PERIOD, spawn_countdown};
use super::session::{LoadOutcome, Session, SubmitOutcome};
use super::state::SessionEvent;
use crate::error::SessionError;

/// Orchestrates an attempt against the external question source and result sink.
///
/// The session itself stays synchronous; this service owns the two async
/// boundaries and re-checks the session state after each await.
#[derive(Clone)]
pub struct AssessmentService {
    clock: Clock,
    source: Arc<dyn QuestionSource>,
    sink: Arc<dyn ResultSink>,
    shuffle_questions: bool,
    tick_period: Duration,
}

impl AssessmentService {
    #[must_use]
    pub fn new(clock: Clock, source: Arc<dyn QuestionSource>, sink: Arc<dyn ResultSink>) -> Self {
        Self {
            clock,
            source,
            sink,
            shuffle_questions: false,
            tick_period: TICK_PERIOD,
        }
    }

    #[must_use]
    pub fn with_shuffle_questions(mut self, shuffle_questions: bool) -> Self {
        self.shuffle_questions = shuffle_questions;
        self
    }

    #[must_use]
    pub fn with_tick_period(mut self, tick_period: Duration) -> Self {
        self.tick_period = tick_period;
        self
    }

    #[must_use]
    pub fn new_session(&self) -> SharedSession {
        Arc::new(Mutex::new(Session::new(self.clock)))
    }

    /// Validate the configuration, fetch questions and activate the session.
    ///
    /// The session lock is released while the source is queried.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` or `InvalidStateTransition` from `start`,
    /// `SourceFailure` if the source errors, and `NoValidQuestions` if its answer is
    /// unusable. The session is back in `Configuring` after the last two.
    pub async fn begin(
        &self,
        session: &SharedSession,
        draft: SessionConfigDraft,
    ) -> Result<LoadOutcome, SessionError> {
        let config = session.lock().await.start(draft)?.clone();

        let mut raw = match self.source.generate(&config).await {
            Ok(raw) => raw,
            Err(err) => {
                warn!(%err, "question source failed");
                let mut session = session.lock().await;
                if session.state().accepts(SessionEvent::LoadFailed) {
                    session.load_failed()?;
                }
                return Err(err.into());
            }
        };
        if self.shuffle_questions {
            raw.shuffle(&mut rand::rng());
        }

        session.lock().await.questions_ready(raw)
    }

    /// Start the real-time countdown for the session's current attempt.
    pub async fn start_countdown(
        &self,
        session: &SharedSession,
    ) -> (CountdownHandle, mpsc::UnboundedReceiver<CountdownEvent>) {
        spawn_countdown(Arc::clone(session), self.tick_period).await
    }

    /// Submit the attempt and deliver it to the result sink.
    ///
    /// Only the call that completes the session delivers; later calls return the
    /// grading already received, if any, without contacting the sink.
    ///
    /// # Errors
    ///
    /// Returns `InvalidStateTransition` before the session is active, and
    /// `SinkFailure` if delivery fails (the payload is kept for [`Self::deliver`]).
    pub async fn submit(
        &self,
        session: &SharedSession,
    ) -> Result<Option<GradingResult>, SessionError> {
        let outcome = session.lock().await.submit()?;
        match outcome {
            SubmitOutcome::Submitted(_) => self.deliver(session).await,
            SubmitOutcome::AlreadySubmitted => Ok(session.lock().await.grading().cloned()),
        }
    }

    /// Deliver the stored payload of a completed session.
    ///
    /// Used after a timeout and to retry a failed or abandoned delivery. Returns the
    /// existing grading if already delivered, or `None` while another delivery is
    /// in flight.
    ///
    /// # Errors
    ///
    /// Returns `InvalidStateTransition` unless completed, or `SinkFailure`.
    pub async fn deliver(
        &self,
        session: &SharedSession,
    ) -> Result<Option<GradingResult>, SessionError> {
        let claim = {
            let mut guard = session.lock().await;
            if let Some(grading) = guard.grading() {
                return Ok(Some(grading.clone()));
            }
            match guard.begin_delivery()? {
                Some(claim) => claim,
                None => return Ok(None),
            }
        };

        // Dropping this future releases the claim, so a later call can retry.
        let delivered = self.sink.submit(claim.payload()).await;
        match delivered {
            Ok(grading) => {
                info!(
                    correct = grading.correct,
                    total = grading.total,
                    "submission graded"
                );
                session
                    .lock()
                    .await
                    .finish_delivery(claim, Some(grading.clone()));
                Ok(Some(grading))
            }
            Err(err) => {
                warn!(%err, "result delivery failed, payload retained");
                session.lock().await.finish_delivery(claim, None);
                Err(err.into())
            }
        }
    }

    /// Discard a completed attempt and return to `Configuring`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidStateTransition` unless the session is completed.
    pub async fn reset(&self, session: &SharedSession) -> Result<(), SessionError> {
        session.lock().await.reset()
    }
}
