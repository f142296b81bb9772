//! Server configuration, resolved once at startup into an [`AppContext`].

use crate::backend::openai::{OpenAiBackend, DEFAULT_API_URL};
use crate::backend::{DEFAULT_MAX_TOKENS, DEFAULT_TIMEOUT};
use crate::cache::{CacheStore, StoragePolicy};
use crate::pipeline::{AppContext, DEFAULT_INDEX_HTML};
use crate::synth::prompt::PromptTemplates;
use anyhow::{Context, Result};
use clap::Args;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Flags for `llm-web serve`.
#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:5000")]
    pub bind: SocketAddr,

    /// Base URL of the chat-completions API
    #[arg(long, env = "OPENAI_BASE_URL", default_value = DEFAULT_API_URL)]
    pub api_url: String,

    /// API key sent as a bearer token
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Model to request completions from
    #[arg(long, default_value = "gpt-4o")]
    pub model_name: String,

    /// Keep the cache in a temporary directory removed on exit
    #[arg(long)]
    pub no_persistent_cache: bool,

    /// Persistent cache directory (default: user cache dir / llm-web)
    #[arg(long)]
    pub cache_dir: Option<PathBuf>,

    /// System prompt template for pages and scripts
    #[arg(long)]
    pub base_prompt: Option<PathBuf>,

    /// System prompt template for stylesheets
    #[arg(long)]
    pub css_prompt: Option<PathBuf>,

    /// Entry document served at `/`
    #[arg(long)]
    pub index: Option<PathBuf>,

    /// Seconds to wait for one completion
    #[arg(long, default_value_t = DEFAULT_TIMEOUT.as_secs())]
    pub backend_timeout_secs: u64,

    /// Cap on generated tokens per completion
    #[arg(long, default_value_t = DEFAULT_MAX_TOKENS)]
    pub max_tokens: u32,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub log_json: bool,
}

impl Default for ServeArgs {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 5000)),
            api_url: DEFAULT_API_URL.to_string(),
            api_key: None,
            model_name: "gpt-4o".to_string(),
            no_persistent_cache: false,
            cache_dir: None,
            base_prompt: None,
            css_prompt: None,
            index: None,
            backend_timeout_secs: DEFAULT_TIMEOUT.as_secs(),
            max_tokens: DEFAULT_MAX_TOKENS,
            log_json: false,
        }
    }
}

impl ServeArgs {
    /// Where the cache lives under these flags.
    pub fn storage_policy(&self) -> StoragePolicy {
        if self.no_persistent_cache {
            StoragePolicy::Ephemeral
        } else {
            StoragePolicy::Persistent(
                self.cache_dir
                    .clone()
                    .unwrap_or_else(StoragePolicy::default_persistent_dir),
            )
        }
    }

    /// Load templates, open the cache and build the backend client.
    pub fn into_context(self) -> Result<Arc<AppContext>> {
        let templates =
            PromptTemplates::load(self.base_prompt.as_deref(), self.css_prompt.as_deref())?;
        let index_html = match self.index.as_deref() {
            Some(path) => read_index(path)?,
            None => DEFAULT_INDEX_HTML.to_string(),
        };

        let policy = self.storage_policy();
        let cache = CacheStore::open(policy).context("failed to open the response cache")?;
        tracing::debug!(records = cache.len(), "existing cache records");

        if self.api_key.is_none() {
            tracing::warn!("no API key configured; requests are sent unauthenticated");
        }
        let backend = OpenAiBackend::new(
            &self.api_url,
            self.api_key,
            &self.model_name,
            Duration::from_secs(self.backend_timeout_secs),
        )
        .with_max_tokens(self.max_tokens);
        tracing::info!(endpoint = backend.endpoint(), model = %self.model_name, "backend configured");

        Ok(Arc::new(AppContext::new(
            templates,
            index_html,
            cache,
            Arc::new(backend),
        )))
    }
}

fn read_index(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .with_context(|| format!("failed to read entry document {}", path.display()))
}
