//! Generative text backend abstraction.
//!
//! The pipeline only needs `generate(system, user) -> text`. [`Backend`]
//! is the seam; [`openai::OpenAiBackend`] speaks the chat-completions
//! protocol over HTTP.

pub mod openai;

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

/// Default cap on generated tokens.
pub const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Default bound on a single backend round-trip.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// A two-turn prompt for the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationRequest {
    /// Filled system template.
    pub system_prompt: String,
    /// JSON object carrying the URL and any form fields.
    pub user_content: String,
}

/// Decoding settings sent with every request.
///
/// Fixed to deterministic decoding so repeated generations for the same
/// prompt stay as close to reproducible as the backend allows.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DecodingParams {
    pub temperature: f32,
    pub top_p: f32,
    pub frequency_penalty: f32,
    pub presence_penalty: f32,
    pub max_tokens: u32,
}

impl Default for DecodingParams {
    fn default() -> Self {
        Self {
            temperature: 0.0,
            top_p: 1.0,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

/// Errors from the backend. Each one fails only the request that hit it.
#[derive(thiserror::Error, Debug)]
pub enum BackendError {
    #[error("backend request failed: {0}")]
    Transport(String),

    #[error("backend timed out after {0:?}")]
    Timeout(Duration),

    #[error("backend returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("backend response had no completion text")]
    EmptyCompletion,

    #[error("malformed backend response: {0}")]
    Decode(String),
}

/// An opaque text generator.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Produce one completion for `request`.
    async fn generate(&self, request: &GenerationRequest) -> Result<String, BackendError>;

    /// Model identifier, for logging.
    fn model(&self) -> &str;
}
