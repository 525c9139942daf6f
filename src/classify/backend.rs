//! Remote triage backend: an OpenAI-compatible chat-completions endpoint.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;

use super::prompt::TriagePrompt;
use crate::config::{Config, SecretString};
use crate::error::{ClassifyError, ConfigError};
use crate::triage::TriageResult;

/// Longest backend error body kept in an error message.
const MAX_ERROR_BODY: usize = 512;

/// One attempt at triaging a prompt.
///
/// Implementations perform a single request; retries live in
/// [`super::ClassifierClient`].
#[async_trait]
pub trait TriageBackend: Send + Sync {
    async fn complete(&self, prompt: &TriagePrompt) -> Result<TriageResult, ClassifyError>;
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    max_completion_tokens: u32,
    response_format: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Chat-completions client.
pub struct OpenAiBackend {
    client: reqwest::Client,
    endpoint: String,
    api_key: SecretString,
    model: String,
    max_completion_tokens: u32,
    timeout: Duration,
}

impl OpenAiBackend {
    pub fn new(
        client: reqwest::Client,
        base_url: &str,
        api_key: SecretString,
        model: impl Into<String>,
        max_completion_tokens: u32,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            api_key,
            model: model.into(),
            max_completion_tokens,
            timeout,
        }
    }

    /// Build the backend from configuration.
    ///
    /// An empty API key is accepted with a warning: the run still proceeds
    /// and the resulting authentication failures surface as an error report.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let api_key = config.api_key()?;
        if api_key.is_empty() {
            tracing::warn!("No OpenAI API key configured; triage requests will be rejected");
        }

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| ConfigError::ValidationError(format!("HTTP client: {}", e)))?;

        Ok(Self::new(
            client,
            &config.openai_base_url,
            api_key,
            config.openai_model.clone(),
            config.max_completion_tokens,
            config.request_timeout(),
        ))
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

impl std::fmt::Debug for OpenAiBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiBackend")
            .field("endpoint", &self.endpoint)
            .field("api_key", &self.api_key)
            .field("model", &self.model)
            .field("max_completion_tokens", &self.max_completion_tokens)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[async_trait]
impl TriageBackend for OpenAiBackend {
    async fn complete(&self, prompt: &TriagePrompt) -> Result<TriageResult, ClassifyError> {
        let request = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &prompt.system,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt.user,
                },
            ],
            max_completion_tokens: self.max_completion_tokens,
            response_format: json!({"type": "json_object"}),
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(self.api_key.expose())
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message: String = body.trim().chars().take(MAX_ERROR_BODY).collect();
            return Err(ClassifyError::Backend {
                status: status.as_u16(),
                message,
            });
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| self.request_error(e))?;

        let content = chat
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(ClassifyError::EmptyCompletion)?;

        TriageResult::from_completion(&content)
            .map_err(|e| ClassifyError::InvalidResponse(e.to_string()))
    }
}

impl OpenAiBackend {
    fn request_error(&self, e: reqwest::Error) -> ClassifyError {
        if e.is_timeout() {
            ClassifyError::Timeout(self.timeout.as_secs())
        } else if e.is_decode() {
            ClassifyError::InvalidResponse(e.to_string())
        } else {
            ClassifyError::Request(e.to_string())
        }
    }
}
