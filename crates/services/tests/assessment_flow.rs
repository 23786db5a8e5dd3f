use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use providers::{
    QuestionSource, RecordingSink, ResultSink, SinkError, SourceError, StaticQuestionSource,
};
use quiz_core::model::{
    GradingResult, QuestionId, RawQuestion, SessionConfig, SessionConfigDraft, SubmissionPayload,
};
use quiz_core::time::fixed_now;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use services::{
    AssessmentService, Clock, CountdownEvent, LoadOutcome, SessionError, SessionState,
};

fn records(count: usize) -> Vec<RawQuestion> {
    (0..count)
        .map(|i| {
            RawQuestion::new(
                format!("q{i}"),
                format!("What does snippet {i} print?"),
                ["1", "2", "3", "4"],
            )
        })
        .collect()
}

fn draft(count: u32, time_limit_seconds: u32) -> SessionConfigDraft {
    SessionConfigDraft::new("Rust", "iterators", "medium", count, time_limit_seconds)
}

fn service(source: StaticQuestionSource, sink: RecordingSink) -> AssessmentService {
    AssessmentService::new(Clock::fixed(fixed_now()), Arc::new(source), Arc::new(sink))
}

#[tokio::test]
async fn full_attempt_is_graded_once() {
    let sink = RecordingSink::new()
        .with_answer_key([(QuestionId::new("q0"), 1), (QuestionId::new("q2"), 3)]);
    let service = service(StaticQuestionSource::new(records(3)), sink.clone());
    let session = service.new_session();

    let outcome = service.begin(&session, draft(3, 300)).await.unwrap();
    assert_eq!(
        outcome,
        LoadOutcome::Activated {
            questions: 3,
            dropped: 0
        }
    );

    {
        let mut guard = session.lock().await;
        guard.clock_mut().advance_secs(10);
        guard.select_answer(1).unwrap();
        guard.go_to(2).unwrap();
        guard.clock_mut().advance_secs(20);
        guard.select_answer(3).unwrap();
        guard.clock_mut().advance_secs(5);
    }

    let grading = service.submit(&session).await.unwrap().unwrap();
    assert_eq!(grading.correct, 2);
    assert_eq!(grading.answered, 2);
    assert_eq!(grading.total, 3);

    let again = service.submit(&session).await.unwrap();
    assert_eq!(again, Some(grading));
    assert_eq!(sink.calls(), 1);

    let payload = &sink.received()[0];
    let ids: Vec<_> = payload
        .answers
        .iter()
        .map(|entry| entry.question_id.as_str())
        .collect();
    assert_eq!(ids, vec!["q0", "q2"]);
    assert_eq!(payload.answers[0].time_spent_seconds, 10);
    assert_eq!(payload.answers[1].time_spent_seconds, 25);
    assert_eq!(payload.total_time_spent_seconds, 35);
}

#[tokio::test]
async fn empty_provider_response_returns_to_configuring() {
    let service = service(StaticQuestionSource::empty(), RecordingSink::new());
    let session = service.new_session();

    let err = service.begin(&session, draft(5, 60)).await.unwrap_err();
    assert!(matches!(err, SessionError::NoValidQuestions));
    assert_eq!(session.lock().await.state(), SessionState::Configuring);

    let retry = service.begin(&session, draft(5, 60)).await.unwrap_err();
    assert!(matches!(retry, SessionError::NoValidQuestions));
}

#[tokio::test]
async fn malformed_records_are_filtered_before_activation() {
    let mut raw = records(4);
    raw[0].id = None;
    raw[2].options = Some(Vec::new());
    let service = service(StaticQuestionSource::new(raw), RecordingSink::new());
    let session = service.new_session();

    let outcome = service.begin(&session, draft(4, 60)).await.unwrap();
    assert_eq!(
        outcome,
        LoadOutcome::Activated {
            questions: 2,
            dropped: 2
        }
    );
    let guard = session.lock().await;
    assert_eq!(guard.current_question().unwrap().id().as_str(), "q1");
}

#[tokio::test]
async fn source_failure_returns_to_configuring() {
    let source = StaticQuestionSource::new(records(2)).failing("provider offline");
    let service = service(source.clone(), RecordingSink::new());
    let session = service.new_session();

    let err = service.begin(&session, draft(2, 60)).await.unwrap_err();
    assert!(matches!(err, SessionError::SourceFailure(_)));
    assert_eq!(session.lock().await.state(), SessionState::Configuring);
    assert_eq!(source.calls(), 1);
}

#[tokio::test]
async fn invalid_configuration_never_reaches_source() {
    let source = StaticQuestionSource::new(records(2));
    let service = service(source.clone(), RecordingSink::new());
    let session = service.new_session();

    let err = service
        .begin(&session, SessionConfigDraft::new("Rust", " ", "easy", 2, 60))
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::InvalidConfiguration(_)));
    assert_eq!(source.calls(), 0);
}

#[tokio::test]
async fn sink_failure_keeps_payload_for_retry() {
    let sink = RecordingSink::new().with_answer_key([(QuestionId::new("q0"), 0)]);
    sink.fail_next(1);
    let service = service(StaticQuestionSource::new(records(2)), sink.clone());
    let session = service.new_session();
    service.begin(&session, draft(2, 60)).await.unwrap();
    session.lock().await.select_answer(0).unwrap();

    let err = service.submit(&session).await.unwrap_err();
    assert!(matches!(err, SessionError::SinkFailure(_)));
    {
        let guard = session.lock().await;
        assert_eq!(guard.state(), SessionState::Completed);
        assert!(guard.payload().is_some());
        assert!(guard.grading().is_none());
    }

    assert_eq!(service.submit(&session).await.unwrap(), None);
    assert_eq!(sink.calls(), 1);

    let grading = service.deliver(&session).await.unwrap().unwrap();
    assert_eq!(grading.correct, 1);
    let received = sink.received();
    assert_eq!(received.len(), 2);
    assert_eq!(received[0], received[1]);

    assert_eq!(service.deliver(&session).await.unwrap(), Some(grading));
    assert_eq!(sink.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn timeout_auto_submits_empty_attempt() {
    let sink = RecordingSink::new();
    let service = service(StaticQuestionSource::new(records(3)), sink.clone())
        .with_tick_period(Duration::from_secs(1));
    let session = service.new_session();
    service.begin(&session, draft(3, 1)).await.unwrap();

    let (_countdown, mut events) = service.start_countdown(&session).await;
    let Some(CountdownEvent::Expired(payload)) = events.recv().await else {
        panic!("expected expiry");
    };
    assert!(payload.answers.is_empty());
    assert_eq!(session.lock().await.state(), SessionState::Completed);

    let grading = service.deliver(&session).await.unwrap().unwrap();
    assert_eq!(grading.answered, 0);
    assert_eq!(service.submit(&session).await.unwrap(), Some(grading));
    assert_eq!(sink.calls(), 1);
}

#[tokio::test]
async fn reset_after_completion_allows_new_attempt() {
    let source = StaticQuestionSource::new(records(2));
    let service = service(source.clone(), RecordingSink::new());
    let session = service.new_session();

    assert!(service.reset(&session).await.is_err());
    service.begin(&session, draft(2, 60)).await.unwrap();
    service.submit(&session).await.unwrap();
    service.reset(&session).await.unwrap();

    assert_eq!(session.lock().await.state(), SessionState::Configuring);
    service.begin(&session, draft(2, 60)).await.unwrap();
    assert_eq!(source.calls(), 2);
}

#[tokio::test]
async fn shuffled_load_keeps_every_question() {
    let service = service(StaticQuestionSource::new(records(6)), RecordingSink::new())
        .with_shuffle_questions(true);
    let session = service.new_session();
    service.begin(&session, draft(6, 60)).await.unwrap();

    let guard = session.lock().await;
    let mut ids: Vec<_> = guard
        .questions()
        .unwrap()
        .iter()
        .map(|question| question.id().as_str().to_owned())
        .collect();
    ids.sort();
    assert_eq!(ids, vec!["q0", "q1", "q2", "q3", "q4", "q5"]);
}

#[tokio::test]
async fn random_session_conserves_time_and_answers() {
    let sink = RecordingSink::new();
    let service = service(StaticQuestionSource::new(records(5)), sink.clone());
    let session = service.new_session();
    service.begin(&session, draft(5, 3_600)).await.unwrap();

    let mut rng = StdRng::seed_from_u64(42);
    let mut elapsed = 0_i64;
    {
        let mut guard = session.lock().await;
        for _ in 0..200 {
            let secs = rng.random_range(0..5);
            elapsed += secs;
            guard.clock_mut().advance_secs(secs);
            match rng.random_range(0..5) {
                0 => {
                    guard.next().unwrap();
                }
                1 => {
                    guard.previous().unwrap();
                }
                2 => {
                    guard.go_to(rng.random_range(-100i32..=100) as isize).unwrap();
                }
                3 => {
                    guard.select_answer(rng.random_range(0..4)).unwrap();
                }
                _ => {
                    guard.toggle_flag(rng.random_range(0..5)).unwrap();
                }
            }
            let index = guard.current_index().unwrap();
            assert!(index < 5);
        }
    }

    service.submit(&session).await.unwrap();
    let guard = session.lock().await;
    let payload = guard.payload().unwrap();

    let recorded: u64 = guard.timings().values().sum();
    assert_eq!(recorded, u64::try_from(elapsed).unwrap());
    assert_eq!(payload.total_time_spent_seconds, recorded);

    let mut payload_ids: Vec<_> = payload
        .answers
        .iter()
        .map(|entry| entry.question_id.clone())
        .collect();
    let mut answer_ids: Vec<_> = guard.answers().keys().cloned().collect();
    payload_ids.sort();
    answer_ids.sort();
    assert_eq!(payload_ids, answer_ids);
    for entry in &payload.answers {
        assert_eq!(
            Some(entry.time_spent_seconds),
            guard.timings().get(&entry.question_id).copied()
        );
    }
    assert_eq!(sink.calls(), 1);
}

/// Source that completes only after the session has already been reset elsewhere.
struct SlowSource {
    records: Vec<RawQuestion>,
}

#[async_trait]
impl QuestionSource for SlowSource {
    async fn generate(&self, _config: &SessionConfig) -> Result<Vec<RawQuestion>, SourceError> {
        tokio::time::sleep(Duration::from_millis(50)).await;
        Ok(self.records.clone())
    }
}

#[tokio::test(start_paused = true)]
async fn late_questions_are_discarded_after_session_moved_on() {
    let service = AssessmentService::new(
        Clock::fixed(fixed_now()),
        Arc::new(SlowSource { records: records(2) }),
        Arc::new(RecordingSink::new()),
    );
    let session = service.new_session();

    let loading = {
        let service = service.clone();
        let session = Arc::clone(&session);
        tokio::spawn(async move { service.begin(&session, draft(2, 60)).await })
    };
    tokio::task::yield_now().await;
    assert_eq!(session.lock().await.state(), SessionState::Loading);

    // Simulate the loader being torn down while the request is pending.
    session.lock().await.load_failed().unwrap();

    let outcome = loading.await.unwrap().unwrap();
    assert_eq!(outcome, LoadOutcome::Discarded);
    assert_eq!(session.lock().await.state(), SessionState::Configuring);
}

#[tokio::test(start_paused = true)]
async fn countdown_from_previous_attempt_does_not_touch_the_next() {
    let service = service(StaticQuestionSource::new(records(2)), RecordingSink::new());
    let session = service.new_session();
    service.begin(&session, draft(2, 60)).await.unwrap();
    let (_first, mut first_events) = service.start_countdown(&session).await;

    tokio::time::sleep(Duration::from_millis(300)).await;
    service.submit(&session).await.unwrap();
    service.reset(&session).await.unwrap();
    service.begin(&session, draft(2, 60)).await.unwrap();
    let (_second, mut second_events) = service.start_countdown(&session).await;

    tokio::time::sleep(Duration::from_millis(1_050)).await;
    assert_eq!(session.lock().await.remaining_seconds(), 59);
    assert_eq!(first_events.recv().await, None);
    assert_eq!(
        second_events.recv().await,
        Some(CountdownEvent::Tick { remaining: 59 })
    );
}

/// Sink whose first call hangs long enough for callers to give up on it.
#[derive(Default)]
struct HangingOnceSink {
    calls: AtomicUsize,
}

#[async_trait]
impl ResultSink for HangingOnceSink {
    async fn submit(&self, payload: &SubmissionPayload) -> Result<GradingResult, SinkError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            tokio::time::sleep(Duration::from_secs(30)).await;
        }
        Ok(GradingResult {
            correct: 0,
            answered: u32::try_from(payload.answers.len()).unwrap(),
            total: payload.config.question_count(),
            feedback: Vec::new(),
        })
    }
}

#[tokio::test(start_paused = true)]
async fn abandoned_delivery_can_be_retried() {
    let sink = Arc::new(HangingOnceSink::default());
    let service = AssessmentService::new(
        Clock::fixed(fixed_now()),
        Arc::new(StaticQuestionSource::new(records(2))),
        Arc::clone(&sink) as Arc<dyn ResultSink>,
    );
    let session = service.new_session();
    service.begin(&session, draft(2, 60)).await.unwrap();
    session.lock().await.select_answer(1).unwrap();

    let timed_out = tokio::time::timeout(Duration::from_secs(1), service.submit(&session)).await;
    assert!(timed_out.is_err());
    assert_eq!(session.lock().await.state(), SessionState::Completed);

    let grading = tokio::time::timeout(Duration::from_secs(1), service.deliver(&session))
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(grading.answered, 1);
    assert_eq!(sink.calls.load(Ordering::SeqCst), 2);
    assert_eq!(service.submit(&session).await.unwrap(), Some(grading));
}
