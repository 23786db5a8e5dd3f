use std::collections::HashMap;

use chrono::{DateTime, Utc};
use quiz_core::model::{
    AnswerEntry, QuestionId, QuestionSet, SessionConfig, SubmissionPayload, SubmissionTrigger,
};
use quiz_core::time::whole_seconds_between;
use tracing::debug;

use super::ledger::TimeLedger;

/// Everything the assembler reads from a finished attempt.
pub(crate) struct Assembly<'a> {
    pub questions: &'a QuestionSet,
    pub answers: &'a HashMap<QuestionId, usize>,
    pub ledger: &'a TimeLedger,
    pub config: &'a SessionConfig,
    pub started_at: DateTime<Utc>,
    pub submitted_at: DateTime<Utc>,
    pub trigger: SubmissionTrigger,
}

/// Even share of the elapsed time per answered question, floored.
///
/// Zero elapsed time or zero answers yield 0.
#[must_use]
pub fn fallback_average(total_elapsed_seconds: u64, answered: usize) -> u64 {
    match u64::try_from(answered) {
        Ok(0) | Err(_) => 0,
        Ok(answered) => total_elapsed_seconds / answered,
    }
}

/// Build the submission payload from the final session state.
///
/// Only answered questions are emitted, in question order. An answered question
/// without a ledger entry gets the fallback average.
pub(crate) fn assemble(input: Assembly<'_>) -> SubmissionPayload {
    let total_time_spent_seconds = whole_seconds_between(input.started_at, input.submitted_at);
    let fallback = fallback_average(total_time_spent_seconds, input.answers.len());

    let mut entries: Vec<(usize, AnswerEntry)> = input
        .answers
        .iter()
        .map(|(question_id, selected)| {
            let time_spent_seconds = input.ledger.time_spent(question_id).unwrap_or_else(|| {
                debug!(question = %question_id, fallback, "no timing recorded, using average");
                fallback
            });
            let position = input.questions.position(question_id).unwrap_or(usize::MAX);
            (
                position,
                AnswerEntry {
                    question_id: question_id.clone(),
                    selected_answer: *selected,
                    time_spent_seconds,
                },
            )
        })
        .collect();
    entries.sort_by_key(|(position, _)| *position);

    SubmissionPayload {
        answers: entries.into_iter().map(|(_, entry)| entry).collect(),
        total_time_spent_seconds,
        config: input.config.clone(),
        started_at: input.started_at,
        submitted_at: input.submitted_at,
        trigger: input.trigger,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use quiz_core::model::{RawQuestion, SessionConfigDraft};
    use quiz_core::time::fixed_now;

    fn questions() -> QuestionSet {
        let raw = ["q0", "q1", "q2", "q3"]
            .into_iter()
            .map(|id| RawQuestion::new(id, "Prompt", ["a", "b"]))
            .collect();
        QuestionSet::from_raw(raw).unwrap().questions
    }

    fn config() -> SessionConfig {
        SessionConfigDraft::new("Rust", "traits", "medium", 4, 120)
            .validate()
            .unwrap()
    }

    #[test]
    fn fallback_average_floors_and_never_divides_by_zero() {
        assert_eq!(fallback_average(10, 3), 3);
        assert_eq!(fallback_average(0, 4), 0);
        assert_eq!(fallback_average(25, 0), 0);
    }

    #[test]
    fn emits_answered_questions_in_question_order() {
        let questions = questions();
        let start = fixed_now();
        let mut ledger = TimeLedger::new();
        ledger.begin(&QuestionId::new("q0"), start);
        ledger.checkpoint(&QuestionId::new("q2"), start + Duration::seconds(5));
        ledger.freeze(start + Duration::seconds(12));

        let answers: HashMap<QuestionId, usize> =
            [(QuestionId::new("q2"), 1), (QuestionId::new("q0"), 0)]
                .into_iter()
                .collect();

        let payload = assemble(Assembly {
            questions: &questions,
            answers: &answers,
            ledger: &ledger,
            config: &config(),
            started_at: start,
            submitted_at: start + Duration::seconds(12),
            trigger: SubmissionTrigger::Manual,
        });

        let ids: Vec<_> = payload
            .answers
            .iter()
            .map(|entry| entry.question_id.as_str())
            .collect();
        assert_eq!(ids, vec!["q0", "q2"]);
        assert_eq!(payload.answers[0].time_spent_seconds, 5);
        assert_eq!(payload.answers[1].time_spent_seconds, 7);
        assert_eq!(payload.answers[1].selected_answer, 1);
        assert_eq!(payload.total_time_spent_seconds, 12);
    }

    #[test]
    fn untimed_answer_gets_fallback_average() {
        let questions = questions();
        let start = fixed_now();
        let mut ledger = TimeLedger::new();
        ledger.begin(&QuestionId::new("q0"), start);
        ledger.freeze(start + Duration::seconds(4));

        let answers: HashMap<QuestionId, usize> = [
            (QuestionId::new("q0"), 1),
            (QuestionId::new("q1"), 0),
            (QuestionId::new("q3"), 1),
        ]
        .into_iter()
        .collect();

        let payload = assemble(Assembly {
            questions: &questions,
            answers: &answers,
            ledger: &ledger,
            config: &config(),
            started_at: start,
            submitted_at: start + Duration::seconds(31),
            trigger: SubmissionTrigger::Timeout,
        });

        assert_eq!(payload.answers.len(), 3);
        assert_eq!(payload.answers[0].time_spent_seconds, 4);
        assert_eq!(payload.answers[1].time_spent_seconds, 10);
        assert_eq!(payload.answers[2].time_spent_seconds, 10);
    }

    #[test]
    fn empty_answers_produce_valid_payload() {
        let questions = questions();
        let answers = HashMap::new();
        let ledger = TimeLedger::new();
        let payload = assemble(Assembly {
            questions: &questions,
            answers: &answers,
            ledger: &ledger,
            config: &config(),
            started_at: fixed_now(),
            submitted_at: fixed_now(),
            trigger: SubmissionTrigger::Timeout,
        });
        assert!(payload.answers.is_empty());
        assert_eq!(payload.total_time_spent_seconds, 0);
    }
}
