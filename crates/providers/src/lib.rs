#![forbid(unsafe_code)]

//! Adapters for the two collaborators of an assessment session: where the
//! questions come from and where the finished attempt goes.

pub mod ai_source;
pub mod http_sink;
pub mod memory;
pub mod sink;
pub mod source;

pub use ai_source::{AiQuestionSource, GeneratorConfig};
pub use http_sink::{HttpResultSink, ResultSinkConfig};
pub use memory::{RecordingSink, StaticQuestionSource};
pub use sink::{ResultSink, SinkError};
pub use source::{QuestionSource, SourceError};
