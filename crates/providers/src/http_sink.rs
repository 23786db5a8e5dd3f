use std::env;

use async_trait::async_trait;
use quiz_core::model::{GradingResult, SubmissionPayload};
use reqwest::{Client, StatusCode};
use tracing::{debug, warn};

use crate::sink::{ResultSink, SinkError};

#[derive(Clone, Debug)]
pub struct ResultSinkConfig {
    pub url: String,
    pub token: Option<String>,
}

impl ResultSinkConfig {
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let url = env::var("QUIZ_RESULTS_URL").ok()?;
        if url.trim().is_empty() {
            return None;
        }
        let token = env::var("QUIZ_RESULTS_TOKEN")
            .ok()
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty());
        Some(Self { url, token })
    }
}

/// Result sink that POSTs the payload as JSON to a grading endpoint.
#[derive(Clone)]
pub struct HttpResultSink {
    client: Client,
    config: Option<ResultSinkConfig>,
}

impl HttpResultSink {
    #[must_use]
    pub fn from_env() -> Self {
        Self::new(ResultSinkConfig::from_env())
    }

    #[must_use]
    pub fn new(config: Option<ResultSinkConfig>) -> Self {
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
impl ResultSink for HttpResultSink {
    async fn submit(&self, payload: &SubmissionPayload) -> Result<GradingResult, SinkError> {
        let config = self.config.as_ref().ok_or(SinkError::Disabled)?;

        let mut request = self.client.post(&config.url).json(payload);
        if let Some(token) = config.token.as_deref() {
            request = request.bearer_auth(token);
        }

        debug!(answers = payload.answers.len(), "delivering submission");
        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::UNPROCESSABLE_ENTITY || status == StatusCode::BAD_REQUEST {
            let reason = response.text().await.unwrap_or_default();
            warn!(%status, "submission rejected");
            return Err(SinkError::Rejected(reason));
        }
        if !status.is_success() {
            warn!(%status, "submission delivery failed");
            return Err(SinkError::HttpStatus(status));
        }

        Ok(response.json().await?)
    }
}
