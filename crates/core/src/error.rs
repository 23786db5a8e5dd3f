use thiserror::Error;

use crate::model::{ConfigError, QuestionSetError};

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    QuestionSet(#[from] QuestionSetError),
}
