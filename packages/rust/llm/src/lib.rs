//! Chat-completions client: the completion collaborator.
//!
//! Speaks the OpenAI-compatible `/chat/completions` request shape: the
//! assembled prompt goes out as a single system-role message with fixed
//! sampling parameters, and the first choice's content comes back. Any
//! non-2xx status, transport failure, or malformed body is a
//! [`AnswerForgeError::Completion`]; retry policy, if any, belongs to the
//! caller.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use answerforge_shared::{AnswerForgeError, CompletionConfig, Result};

/// User-Agent string for completion requests.
const USER_AGENT: &str = concat!("AnswerForge/", env!("CARGO_PKG_VERSION"));

/// Characters of an error response body kept for diagnostics.
const ERROR_BODY_PREVIEW: usize = 200;

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: String,
}

// ---------------------------------------------------------------------------
// CompletionClient
// ---------------------------------------------------------------------------

/// HTTP client for an OpenAI-compatible chat-completions endpoint.
pub struct CompletionClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
    max_tokens: u32,
    temperature: f32,
    timeout: Duration,
}

impl CompletionClient {
    /// Build a client from config plus the resolved API key.
    pub fn new(config: &CompletionConfig, api_key: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| {
                AnswerForgeError::Completion(format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            timeout: config.timeout(),
        })
    }

    /// The model identifier sent with every request.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Configured output length bound.
    pub fn max_tokens(&self) -> u32 {
        self.max_tokens
    }

    /// Configured sampling temperature.
    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    /// One completion with the configured sampling parameters and timeout.
    pub async fn complete(&self, prompt: &str) -> Result<String> {
        self.complete_with(prompt, self.max_tokens, self.temperature, self.timeout)
            .await
    }

    /// One completion with explicit sampling parameters and timeout.
    ///
    /// Used by the question generator, which boosts token budget and
    /// temperature relative to the answering defaults.
    #[instrument(skip_all, fields(model = %self.model, max_tokens, prompt_len = prompt.len()))]
    pub async fn complete_with(
        &self,
        prompt: &str,
        max_tokens: u32,
        temperature: f32,
        timeout: Duration,
    ) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "system",
                content: prompt,
            }],
            max_tokens,
            temperature,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .timeout(timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| AnswerForgeError::Completion(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let preview: String = body.chars().take(ERROR_BODY_PREVIEW).collect();
            return Err(AnswerForgeError::Completion(format!(
                "HTTP {status}: {preview}"
            )));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| AnswerForgeError::Completion(format!("invalid response body: {e}")))?;

        let content = body
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| {
                AnswerForgeError::Completion("response contained no choices".into())
            })?;

        debug!(content_len = content.len(), "completion received");
        Ok(content.trim().to_string())
    }
}
