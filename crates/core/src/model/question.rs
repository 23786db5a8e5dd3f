use std::collections::HashSet;

use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::model::ids::QuestionId;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionSetError {
    #[error("no valid questions ({dropped} records dropped)")]
    NoValidQuestions { dropped: usize },
}

//
// ─── RAW RECORD ────────────────────────────────────────────────────────────────
//

/// Question-shaped record as delivered by a question source.
///
/// Every field is optional: sources are not trusted to honor their contract.
/// Numeric ids and options are read as text. Values of any other shape leave the
/// field unset (or the option blank) so the record is dropped on its own instead
/// of failing the whole response.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawQuestion {
    #[serde(deserialize_with = "lenient_text")]
    pub id: Option<String>,
    #[serde(alias = "promptText", alias = "question", deserialize_with = "lenient_text")]
    pub prompt: Option<String>,
    #[serde(alias = "choices", deserialize_with = "lenient_options")]
    pub options: Option<Vec<String>>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Text(String),
    Signed(i64),
    Unsigned(u64),
    Float(f64),
    Other(IgnoredAny),
}

impl Scalar {
    fn into_text(self) -> Option<String> {
        match self {
            Self::Text(text) => Some(text),
            Self::Signed(n) => Some(n.to_string()),
            Self::Unsigned(n) => Some(n.to_string()),
            Self::Float(n) => Some(n.to_string()),
            Self::Other(_) => None,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OptionList {
    List(Vec<Scalar>),
    Other(IgnoredAny),
}

fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Scalar>::deserialize(deserializer)?.and_then(Scalar::into_text))
}

fn lenient_options<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<OptionList>::deserialize(deserializer)? {
        Some(OptionList::List(items)) => Some(
            items
                .into_iter()
                .map(|item| item.into_text().unwrap_or_default())
                .collect(),
        ),
        Some(OptionList::Other(_)) | None => None,
    })
}

impl RawQuestion {
    #[must_use]
    pub fn new<I, S>(id: impl Into<String>, prompt: impl Into<String>, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: Some(id.into()),
            prompt: Some(prompt.into()),
            options: Some(options.into_iter().map(Into::into).collect()),
        }
    }

    /// Convert into a `Question`, or `None` if the record is unusable.
    ///
    /// Options keep their positions since answers are reported by index, so a
    /// record with any blank option is dropped rather than compacted.
    #[must_use]
    pub fn into_question(self) -> Option<Question> {
        let id = QuestionId::new(self.id?);
        if id.is_blank() {
            return None;
        }
        let prompt = self.prompt?.trim().to_string();
        if prompt.is_empty() {
            return None;
        }
        let options: Vec<String> = self
            .options?
            .into_iter()
            .map(|option| option.trim().to_string())
            .collect();
        if options.is_empty() || options.iter().any(String::is_empty) {
            return None;
        }
        Some(Question {
            id,
            prompt,
            options,
        })
    }
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

/// A validated multiple-choice question. Never mutated once loaded.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    id: QuestionId,
    prompt: String,
    options: Vec<String>,
}

impl Question {
    #[must_use]
    pub fn id(&self) -> &QuestionId {
        &self.id
    }

    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    #[must_use]
    pub fn options(&self) -> &[String] {
        &self.options
    }

    #[must_use]
    pub fn option_count(&self) -> usize {
        self.options.len()
    }
}

//
// ─── QUESTION SET ──────────────────────────────────────────────────────────────
//

/// Ordered, non-empty list of questions with unique ids.
///
/// The only constructor filters untrusted records, so an empty set cannot exist.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QuestionSet {
    questions: Vec<Question>,
}

/// Outcome of filtering a source response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoadedQuestions {
    pub questions: QuestionSet,
    pub dropped: usize,
}

#[allow(clippy::len_without_is_empty)]
impl QuestionSet {
    /// Filter raw records into a question set.
    ///
    /// Records missing an id or a prompt, with no options, or with a blank option
    /// are dropped, as are records repeating an id already accepted.
    ///
    /// # Errors
    ///
    /// Returns `QuestionSetError::NoValidQuestions` if nothing survives filtering.
    pub fn from_raw(raw: Vec<RawQuestion>) -> Result<LoadedQuestions, QuestionSetError> {
        let received = raw.len();
        let mut seen = HashSet::with_capacity(received);
        let questions: Vec<Question> = raw
            .into_iter()
            .filter_map(RawQuestion::into_question)
            .filter(|question| seen.insert(question.id.clone()))
            .collect();
        let dropped = received - questions.len();

        if questions.is_empty() {
            return Err(QuestionSetError::NoValidQuestions { dropped });
        }

        Ok(LoadedQuestions {
            questions: Self { questions },
            dropped,
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn last_index(&self) -> usize {
        self.questions.len() - 1
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Question> {
        self.questions.get(index)
    }

    #[must_use]
    pub fn first(&self) -> &Question {
        &self.questions[0]
    }

    #[must_use]
    pub fn position(&self, id: &QuestionId) -> Option<usize> {
        self.questions.iter().position(|question| &question.id == id)
    }

    #[must_use]
    pub fn contains(&self, id: &QuestionId) -> bool {
        self.position(id).is_some()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Question> {
        self.questions.iter()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[Question] {
        &self.questions
    }
}

impl<'a> IntoIterator for &'a QuestionSet {
    type Item = &'a Question;
    type IntoIter = std::slice::Iter<'a, Question>;

    fn into_iter(self) -> Self::IntoIter {
        self.questions.iter()
    }
}
