//! Request pipeline: resolve → cache → synthesize → rewrite → augment → store.

use crate::backend::{Backend, BackendError};
use crate::cache::flight::InFlight;
use crate::cache::{cache_key, CacheEntry, CacheStore};
use crate::loader;
use crate::resolver::VirtualUrl;
use crate::rewrite::{self, RewriteContext, RewriteOutcome};
use crate::synth::prompt::PromptTemplates;
use crate::synth::{self, content_type, FormFields};
use std::sync::Arc;
use tracing::Instrument;

/// Built-in entry document.
pub const DEFAULT_INDEX_HTML: &str = include_str!("../assets/index.html");

/// Everything a request needs, built once at startup.
pub struct AppContext {
    pub templates: PromptTemplates,
    pub index_html: String,
    pub cache: CacheStore,
    pub backend: Arc<dyn Backend>,
    inflight: InFlight,
}

/// A response body with its type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivered {
    pub content: String,
    pub content_type: String,
    pub from_cache: bool,
}

/// Why a virtual request failed.
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl AppContext {
    pub fn new(
        templates: PromptTemplates,
        index_html: String,
        cache: CacheStore,
        backend: Arc<dyn Backend>,
    ) -> Self {
        Self {
            templates,
            index_html,
            cache,
            backend,
            inflight: InFlight::new(),
        }
    }

    /// Serve one virtual URL.
    ///
    /// A cache hit returns the stored record as is. On a miss the document is
    /// generated, rewritten, augmented and stored; concurrent misses for the
    /// same URL wait for the first one instead of generating again.
    pub async fn serve(&self, url: &VirtualUrl, form: &FormFields) -> Result<Delivered, PipelineError> {
        let full_url = url.full_url();
        let span = tracing::info_span!(
            "virtual_request",
            id = %uuid::Uuid::new_v4(),
            url = %full_url,
        );

        async {
            if let Some(hit) = self.lookup(&full_url).await {
                return Ok(hit);
            }

            let _flight = self.inflight.acquire(&cache_key(&full_url)).await;
            if let Some(hit) = self.lookup(&full_url).await {
                tracing::debug!("filled by a concurrent request");
                return Ok(hit);
            }

            let delivered = self.generate(url, form).await.map_err(|e| {
                tracing::error!("generation failed: {e}");
                e
            })?;
            self.store(&full_url, &delivered).await;
            Ok(delivered)
        }
        .instrument(span)
        .await
    }

    async fn lookup(&self, full_url: &str) -> Option<Delivered> {
        let entry = self.cache.get(full_url).await;
        match entry {
            Some(entry) => {
                tracing::debug!(content_type = %entry.content_type, "cache hit");
                Some(Delivered {
                    content: entry.content,
                    content_type: entry.content_type,
                    from_cache: true,
                })
            }
            None => {
                tracing::debug!("cache miss");
                None
            }
        }
    }

    async fn generate(&self, url: &VirtualUrl, form: &FormFields) -> Result<Delivered, PipelineError> {
        let inferred = content_type::infer(url.file_path());
        let generated =
            synth::synthesize(self.backend.as_ref(), &self.templates, url, &inferred, form).await?;

        let mut content = generated.content;
        let content_type = generated.content_type;

        if content_type::is_markup(&content_type) {
            let ctx = RewriteContext::new(&format!("{}/", url.domain));
            content = match rewrite::rewrite(&content, &ctx) {
                RewriteOutcome::Rewritten { text, stats } => {
                    tracing::debug!(lazy_sections = stats.placeholders, "links contained");
                    text
                }
                RewriteOutcome::Fallback { original, error } => {
                    tracing::warn!("link rewrite skipped: {error}");
                    original
                }
            };
        }

        if content_type == content_type::TEXT_HTML {
            content = loader::inject(&content);
        }

        Ok(Delivered {
            content,
            content_type,
            from_cache: false,
        })
    }

    /// Best-effort write; failure only costs a future cache hit.
    async fn store(&self, full_url: &str, delivered: &Delivered) {
        let entry = CacheEntry {
            content: delivered.content.clone(),
            content_type: delivered.content_type.clone(),
        };
        if let Err(e) = self.cache.put(full_url, &entry).await {
            tracing::warn!("cache write failed: {e}");
        }
    }
}
