//! Content synthesis: prompt selection, the backend round-trip, and
//! interpretation of the completion.

pub mod content_type;
pub mod prompt;

use crate::backend::{Backend, BackendError};
use crate::resolver::VirtualUrl;
use prompt::PromptTemplates;
use std::collections::BTreeMap;
use std::time::Instant;

/// Submitted form fields, one value per name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormFields(BTreeMap<String, String>);

impl FormFields {
    /// Collect pairs; the first value of a repeated name is kept.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut fields = BTreeMap::new();
        for (k, v) in pairs {
            fields.entry(k.into()).or_insert_with(|| v.into());
        }
        Self(fields)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// JSON object of the fields.
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.0).unwrap_or_else(|_| "{}".to_string())
    }
}

/// A generated document and its final content type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Synthesized {
    pub content: String,
    pub content_type: String,
}

/// Generate the document for `url`.
///
/// `inferred_type` comes from [`content_type::infer`]; the completion may
/// override it with a leading content-type line. Backend errors propagate
/// unchanged and are never retried here.
pub async fn synthesize(
    backend: &dyn Backend,
    templates: &PromptTemplates,
    url: &VirtualUrl,
    inferred_type: &str,
    form: &FormFields,
) -> Result<Synthesized, BackendError> {
    let full_url = url.full_url();
    let request = templates.build_request(&full_url, inferred_type, form);

    tracing::info!(
        model = backend.model(),
        content_type = inferred_type,
        form_fields = form.len(),
        "generating"
    );
    let started = Instant::now();
    let raw = backend.generate(&request).await?;
    tracing::info!(
        elapsed_ms = started.elapsed().as_millis() as u64,
        bytes = raw.len(),
        "generated"
    );

    Ok(interpret(raw, inferred_type))
}

/// Turn a raw completion into the delivered body and type.
///
/// A first line that declares a content type is stripped and replaces
/// `inferred_type`. Scripts and stylesheets are entity-unescaped because
/// the backend sometimes encodes code punctuation.
pub fn interpret(raw: String, inferred_type: &str) -> Synthesized {
    let (content_type, mut content) = split_declaration(raw, inferred_type);

    if content_type::needs_unescape(&content_type) {
        content = html_escape::decode_html_entities(&content).into_owned();
    }

    Synthesized {
        content,
        content_type,
    }
}

fn split_declaration(raw: String, inferred_type: &str) -> (String, String) {
    let (first, rest) = match raw.split_once('\n') {
        Some((first, rest)) => (first, rest),
        None => return (inferred_type.to_string(), raw),
    };
    match content_type::parse_declaration(first.trim_end_matches('\r')) {
        Some(declared) => (declared, rest.to_string()),
        None => (inferred_type.to_string(), raw),
    }
}
