//! Chat-completions backend over HTTP (OpenAI-compatible APIs).

use super::{Backend, BackendError, DecodingParams, GenerationRequest};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default API base URL.
pub const DEFAULT_API_URL: &str = "https://api.openai.com/v1";

/// Longest error body kept in a [`BackendError::Status`].
const MAX_ERROR_BODY: usize = 512;

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    #[serde(flatten)]
    params: DecodingParams,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

/// HTTP client for a chat-completions endpoint.
#[derive(Clone)]
pub struct OpenAiBackend {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
    params: DecodingParams,
    timeout: Duration,
}

impl OpenAiBackend {
    /// Create a backend for `api_url` (e.g. `https://api.openai.com/v1`).
    pub fn new(api_url: &str, api_key: Option<String>, model: &str, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("llm-web/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();

        Self {
            client,
            endpoint: format!("{}/chat/completions", api_url.trim_end_matches('/')),
            api_key,
            model: model.to_string(),
            params: DecodingParams::default(),
            timeout,
        }
    }

    /// Override the generated-token cap.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.params.max_tokens = max_tokens;
        self
    }

    /// Full chat-completions URL.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn classify(&self, err: reqwest::Error) -> BackendError {
        if err.is_timeout() {
            BackendError::Timeout(self.timeout)
        } else {
            BackendError::Transport(err.to_string())
        }
    }
}

#[async_trait]
impl Backend for OpenAiBackend {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, BackendError> {
        let body = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &request.system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: &request.user_content,
                },
            ],
            params: self.params,
        };

        let mut builder = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let resp = builder.send().await.map_err(|e| self.classify(e))?;
        let status = resp.status();
        if !status.is_success() {
            let mut text = resp.text().await.unwrap_or_default();
            if text.len() > MAX_ERROR_BODY {
                let mut cut = MAX_ERROR_BODY;
                while !text.is_char_boundary(cut) {
                    cut -= 1;
                }
                text.truncate(cut);
            }
            return Err(BackendError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        let parsed: ChatResponse = resp.json().await.map_err(|e| {
            if e.is_timeout() {
                BackendError::Timeout(self.timeout)
            } else {
                BackendError::Decode(e.to_string())
            }
        })?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(BackendError::EmptyCompletion)
    }

    fn model(&self) -> &str {
        &self.model
    }
}
