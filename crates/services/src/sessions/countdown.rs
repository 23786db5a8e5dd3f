use std::sync::Arc;
use std::time::Duration;

use quiz_core::model::SubmissionPayload;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::debug;

use super::session::{Session, TickOutcome};

/// Session shared between the event handlers and the countdown task.
pub type SharedSession = Arc<Mutex<Session>>;

/// Real-time tick period of the countdown.
pub const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Events published by the countdown task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CountdownEvent {
    Tick { remaining: u32 },
    Expired(SubmissionPayload),
}

/// Owns the countdown task. Dropping the handle stops the countdown.
#[derive(Debug)]
pub struct CountdownHandle {
    task: JoinHandle<()>,
}

impl CountdownHandle {
    pub fn cancel(&self) {
        self.task.abort();
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for CountdownHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Drive the current attempt's countdown every `period` until it leaves `Active`.
///
/// The task is bound to the attempt active when it is spawned and registered
/// with the session, which aborts it on submit or reset. Spawning another
/// countdown for the same session stops this one.
pub async fn spawn_countdown(
    session: SharedSession,
    period: Duration,
) -> (CountdownHandle, mpsc::UnboundedReceiver<CountdownEvent>) {
    let (events, receiver) = mpsc::unbounded_channel();
    let mut guard = session.lock().await;
    let attempt = guard.attempt();
    let task = tokio::spawn(run_countdown(Arc::clone(&session), attempt, period, events));
    guard.attach_countdown(task.abort_handle());
    drop(guard);
    (CountdownHandle { task }, receiver)
}

async fn run_countdown(
    session: SharedSession,
    attempt: u64,
    period: Duration,
    events: mpsc::UnboundedSender<CountdownEvent>,
) {
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        let outcome = session.lock().await.tick_for(attempt);
        match outcome {
            TickOutcome::Running { remaining } => {
                let _ = events.send(CountdownEvent::Tick { remaining });
            }
            TickOutcome::Expired(payload) => {
                let _ = events.send(CountdownEvent::Expired(payload));
                break;
            }
            TickOutcome::Discarded => {
                debug!(attempt, "attempt no longer active, stopping countdown");
                break;
            }
        }
    }
}
