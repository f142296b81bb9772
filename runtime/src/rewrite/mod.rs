//! Link containment for generated markup.
//!
//! Every link-bearing attribute is rewritten so the browser resolves it
//! through this server under the current virtual domain, and inline
//! scripts have their literal `http://` / `https://` tokens funnelled back
//! through the catch-all route. Image sources are left alone so absolute
//! image URLs still render.
//!
//! Rewriting is best-effort: [`rewrite`] never fails, it returns a
//! [`RewriteOutcome::Fallback`] carrying the untouched input.

pub mod dom;

use crate::loader;
use dom::{Document, NodeRewrite};
use regex::Regex;
use std::sync::OnceLock;

/// Attributes whose values are link targets.
pub const LINK_ATTRIBUTES: [&str; 4] = ["href", "src", "action", loader::SOURCE_ATTR];

/// Why a rewrite pass was abandoned.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RewriteError {
    #[error("markup nested deeper than {0} elements")]
    TooDeep(usize),

    #[error("rewriting dropped all content of a non-empty document")]
    ContentLost,
}

/// What a successful pass touched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RewriteStats {
    /// Link attributes changed.
    pub links: usize,
    /// Inline scripts changed.
    pub scripts: usize,
    /// Elements carrying a lazy-section source.
    pub placeholders: usize,
}

/// Result of a rewrite pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RewriteOutcome {
    Rewritten { text: String, stats: RewriteStats },
    Fallback {
        original: String,
        error: RewriteError,
    },
}

impl RewriteOutcome {
    /// The text to deliver: rewritten, or the original on fallback.
    pub fn into_text(self) -> String {
        match self {
            Self::Rewritten { text, .. } => text,
            Self::Fallback { original, .. } => original,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback { .. })
    }
}

/// Scope of one rewrite pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteContext {
    /// Current virtual domain without its trailing `/`; empty for the root.
    current_domain: String,
}

impl RewriteContext {
    /// Context for `domain`, given with or without one trailing `/`.
    /// `"/"` and `""` denote the root.
    pub fn new(domain: &str) -> Self {
        let current_domain = domain.strip_suffix('/').unwrap_or(domain).to_string();
        Self { current_domain }
    }

    /// Context for the root domain.
    pub fn root() -> Self {
        Self::new("/")
    }

    pub fn is_root(&self) -> bool {
        self.current_domain.is_empty()
    }

    pub fn current_domain(&self) -> &str {
        &self.current_domain
    }

    /// New value for a link target, or `None` to keep it.
    ///
    /// - `#anchor` stays.
    /// - `/path` becomes `/<domain>/path` (kept as is under the root).
    /// - anything else, relative or with a scheme, becomes `/<value>`.
    pub fn rewrite_link(&self, value: &str) -> Option<String> {
        if value.is_empty() || value.starts_with('#') {
            return None;
        }
        if value.starts_with('/') {
            if self.is_root() {
                None
            } else {
                Some(format!("/{}{value}", self.current_domain))
            }
        } else {
            Some(format!("/{value}"))
        }
    }
}

/// Route literal scheme tokens in script text back through the server.
///
/// Plain textual substitution, case-sensitive on `http://` and `https://`.
pub fn rewrite_script_text(text: &str) -> Option<String> {
    static SCHEME: OnceLock<Regex> = OnceLock::new();
    let re = SCHEME.get_or_init(|| Regex::new(r"https?://").expect("valid regex"));
    if !re.is_match(text) {
        return None;
    }
    Some(re.replace_all(text, "/https://").into_owned())
}

struct LinkContainment<'a> {
    ctx: &'a RewriteContext,
    stats: RewriteStats,
}

impl NodeRewrite for LinkContainment<'_> {
    fn attribute(&mut self, element: &str, name: &str, value: &str) -> Option<String> {
        if name == loader::SOURCE_ATTR {
            self.stats.placeholders += 1;
        }
        if element == "img" || !LINK_ATTRIBUTES.contains(&name) {
            return None;
        }
        let new = self.ctx.rewrite_link(value)?;
        self.stats.links += 1;
        Some(new)
    }

    fn raw_text(&mut self, element: &str, text: &str) -> Option<String> {
        if element != "script" {
            return None;
        }
        let new = rewrite_script_text(text)?;
        self.stats.scripts += 1;
        Some(new)
    }
}

/// Rewrite all links in `markup` for `ctx`.
pub fn rewrite(markup: &str, ctx: &RewriteContext) -> RewriteOutcome {
    match try_rewrite(markup, ctx) {
        Ok((text, stats)) => RewriteOutcome::Rewritten { text, stats },
        Err(error) => RewriteOutcome::Fallback {
            original: markup.to_string(),
            error,
        },
    }
}

fn try_rewrite(markup: &str, ctx: &RewriteContext) -> Result<(String, RewriteStats), RewriteError> {
    let mut doc = Document::parse(markup);
    doc.check_depth()?;

    let mut pass = LinkContainment {
        ctx,
        stats: RewriteStats::default(),
    };
    doc.apply(&mut pass);
    let out = doc.serialize();

    if out.trim().is_empty() && !markup.trim().is_empty() {
        return Err(RewriteError::ContentLost);
    }

    tracing::debug!(
        domain = ctx.current_domain(),
        links = pass.stats.links,
        scripts = pass.stats.scripts,
        placeholders = pass.stats.placeholders,
        "rewrote links"
    );
    Ok((out, pass.stats))
}
