use std::env;

use async_trait::async_trait;
use quiz_core::model::{RawQuestion, SessionConfig};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::source::{QuestionSource, SourceError};

#[derive(Clone, Debug)]
pub struct GeneratorConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
}

impl GeneratorConfig {
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let api_key = env::var("QUIZ_AI_API_KEY").ok()?;
        if api_key.trim().is_empty() {
            return None;
        }
        let base_url =
            env::var("QUIZ_AI_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".into());
        let model = env::var("QUIZ_AI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".into());
        Some(Self {
            base_url,
            api_key,
            model,
        })
    }
}

/// Question source backed by an OpenAI-compatible chat completion endpoint.
#[derive(Clone)]
pub struct AiQuestionSource {
    client: Client,
    config: Option<GeneratorConfig>,
}

impl AiQuestionSource {
    #[must_use]
    pub fn from_env() -> Self {
        Self::new(GeneratorConfig::from_env())
    }

    #[must_use]
    pub fn new(config: Option<GeneratorConfig>) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.config.is_some()
    }
}

#[async_trait]
impl QuestionSource for AiQuestionSource {
    async fn generate(&self, session: &SessionConfig) -> Result<Vec<RawQuestion>, SourceError> {
        let config = self.config.as_ref().ok_or(SourceError::Disabled)?;

        let url = format!(
            "{}/chat/completions",
            config.base_url.trim_end_matches('/')
        );
        let payload = ChatRequest {
            model: config.model.clone(),
            messages: vec![ChatMessage {
                role: "user",
                content: build_prompt(session),
            }],
            temperature: 0.4,
        };

        debug!(
            subject = session.subject(),
            topic = session.topic(),
            count = session.question_count(),
            "requesting generated questions"
        );
        let response = self
            .client
            .post(url)
            .bearer_auth(&config.api_key)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            warn!(status = %response.status(), "question generation failed");
            return Err(SourceError::HttpStatus(response.status()));
        }

        let body: ChatResponse = response.json().await?;
        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(SourceError::EmptyResponse)?;

        parse_questions(&content)
    }
}

fn build_prompt(session: &SessionConfig) -> String {
    format!(
        "Write {count} multiple-choice questions about {topic} ({subject}) at {difficulty} \
         difficulty. Reply with JSON only: an array of objects with fields \"id\" (string, \
         unique), \"prompt\" (string) and \"options\" (array of 4 strings).",
        count = session.question_count(),
        topic = session.topic(),
        subject = session.subject(),
        difficulty = session.difficulty(),
    )
}

#[derive(Deserialize)]
#[serde(untagged)]
enum GeneratedBody {
    List(Vec<serde_json::Value>),
    Wrapped { questions: Vec<serde_json::Value> },
}

/// Extract question records from a model reply.
///
/// Accepts a bare JSON array or an object with a `questions` array, optionally
/// wrapped in a Markdown code fence or surrounded by prose. Each record is
/// decoded on its own; one that is not question-shaped comes back empty and is
/// dropped later by question filtering.
fn parse_questions(content: &str) -> Result<Vec<RawQuestion>, SourceError> {
    let body = strip_code_fence(content.trim());
    let json = match (body.find(['[', '{']), body.rfind([']', '}'])) {
        (Some(start), Some(end)) if start < end => &body[start..=end],
        _ => return Err(SourceError::EmptyResponse),
    };

    let parsed: GeneratedBody =
        serde_json::from_str(json).map_err(|e| SourceError::Malformed(e.to_string()))?;
    let (GeneratedBody::List(records) | GeneratedBody::Wrapped { questions: records }) = parsed;
    Ok(records
        .into_iter()
        .map(|record| {
            serde_json::from_value(record).unwrap_or_else(|err| {
                debug!(%err, "unreadable question record");
                RawQuestion::default()
            })
        })
        .collect())
}

fn strip_code_fence(content: &str) -> &str {
    let Some(rest) = content.strip_prefix("```") else {
        return content;
    };
    let rest = rest.split_once('\n').map_or("", |(_, body)| body);
    rest.trim_end().strip_suffix("```").unwrap_or(rest)
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Debug, Deserialize)]
struct ChatMessageResponse {
    content: Option<String>,
}
