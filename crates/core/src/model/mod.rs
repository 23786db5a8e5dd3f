mod config;
mod ids;
mod question;
mod submission;

pub use config::{ConfigError, SessionConfig, SessionConfigDraft};
pub use ids::{ParseIdError, QuestionId};
pub use question::{LoadedQuestions, Question, QuestionSet, QuestionSetError, RawQuestion};
pub use submission::{
    AnswerEntry, GradingResult, QuestionFeedback, SubmissionPayload, SubmissionTrigger,
};
