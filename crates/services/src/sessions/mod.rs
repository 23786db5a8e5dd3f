mod assembler;
mod countdown;
mod ledger;
mod navigator;
mod progress;
mod session;
mod state;
mod workflow;

// Public API of the session subsystem.
pub use crate::error::SessionError;
pub use assembler::fallback_average;
pub use countdown::{CountdownEvent, CountdownHandle, SharedSession, TICK_PERIOD, spawn_countdown};
pub use ledger::{Checkpoint, Countdown, CountdownTick, TimeLedger};
pub use navigator::{Move, Navigator};
pub use progress::{QuestionSlot, SessionProgress};
pub use session::{LoadOutcome, Session, SubmitOutcome, TickOutcome};
pub use state::{SessionEvent, SessionState};
pub use workflow::AssessmentService;
