use std::fmt;

use serde::Serialize;

use crate::error::SessionError;

/// Lifecycle of one assessment attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionState {
    Configuring,
    Loading,
    Active,
    Completed,
}

/// Every event a session can receive, used to guard transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    Start,
    QuestionsReady,
    LoadFailed,
    Navigate,
    Answer,
    Flag,
    Tick,
    Submit,
    Deliver,
    Reset,
}

impl SessionState {
    /// Target state for `event`, or `InvalidStateTransition` if the event is not
    /// legal here. Events that act within a state map back onto it.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidStateTransition` for any pair outside the table.
    pub fn transition(self, event: SessionEvent) -> Result<SessionState, SessionError> {
        use SessionEvent as E;
        use SessionState as S;

        let next = match (self, event) {
            (S::Configuring, E::Start) => S::Loading,
            (S::Loading, E::QuestionsReady) => S::Active,
            (S::Loading, E::LoadFailed) => S::Configuring,
            (S::Active, E::Navigate | E::Answer | E::Flag | E::Tick) => S::Active,
            (S::Active, E::Submit) => S::Completed,
            (S::Completed, E::Deliver) => S::Completed,
            (S::Completed, E::Reset) => S::Configuring,
            (state, event) => {
                return Err(SessionError::InvalidStateTransition { state, event });
            }
        };
        Ok(next)
    }

    #[must_use]
    pub fn accepts(self, event: SessionEvent) -> bool {
        self.transition(event).is_ok()
    }

    #[must_use]
    pub fn is_active(self) -> bool {
        self == SessionState::Active
    }

    #[must_use]
    pub fn is_completed(self) -> bool {
        self == SessionState::Completed
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SessionState::Configuring => "configuring",
            SessionState::Loading => "loading",
            SessionState::Active => "active",
            SessionState::Completed => "completed",
        };
        f.write_str(label)
    }
}

impl fmt::Display for SessionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SessionEvent::Start => "start",
            SessionEvent::QuestionsReady => "questions ready",
            SessionEvent::LoadFailed => "load failed",
            SessionEvent::Navigate => "navigate",
            SessionEvent::Answer => "answer",
            SessionEvent::Flag => "flag",
            SessionEvent::Tick => "tick",
            SessionEvent::Submit => "submit",
            SessionEvent::Deliver => "deliver",
            SessionEvent::Reset => "reset",
        };
        f.write_str(label)
    }
}
