//! System prompt templates and user-turn construction.

use super::FormFields;
use crate::backend::GenerationRequest;
use crate::synth::content_type;
use anyhow::{Context, Result};
use std::path::Path;

const URL_PATH: &str = "{{URL_PATH}}";
const FILE_TYPE: &str = "{{FILE_TYPE}}";
const OPTIONAL_DATA: &str = "{{OPTIONAL_DATA}}";

const DEFAULT_BASE_PROMPT: &str = include_str!("../../assets/base_prompt.txt");
const DEFAULT_CSS_PROMPT: &str = include_str!("../../assets/css_prompt.txt");

/// The two system prompt templates.
#[derive(Debug, Clone)]
pub struct PromptTemplates {
    /// Pages, scripts and everything that is not a stylesheet.
    pub base: String,
    /// Stylesheets.
    pub css: String,
}

impl Default for PromptTemplates {
    fn default() -> Self {
        Self {
            base: DEFAULT_BASE_PROMPT.to_string(),
            css: DEFAULT_CSS_PROMPT.to_string(),
        }
    }
}

impl PromptTemplates {
    /// Load templates from files, falling back to the built-in defaults.
    pub fn load(base: Option<&Path>, css: Option<&Path>) -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            base: match base {
                Some(p) => read_template(p)?,
                None => defaults.base,
            },
            css: match css {
                Some(p) => read_template(p)?,
                None => defaults.css,
            },
        })
    }

    /// Template for `content_type`.
    pub fn select(&self, content_type: &str) -> &str {
        if content_type::is_stylesheet(content_type) {
            &self.css
        } else {
            &self.base
        }
    }

    /// Build the two-turn request for one virtual URL.
    pub fn build_request(
        &self,
        full_url: &str,
        content_type: &str,
        form: &FormFields,
    ) -> GenerationRequest {
        let optional = if form.is_empty() {
            String::new()
        } else {
            format!("form data: {}", form.to_json())
        };

        let system_prompt = self
            .select(content_type)
            .replace(URL_PATH, full_url)
            .replace(FILE_TYPE, content_type)
            .replace(OPTIONAL_DATA, &optional);

        GenerationRequest {
            system_prompt,
            user_content: user_content(full_url, form),
        }
    }
}

fn read_template(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .with_context(|| format!("failed to read prompt template: {}", path.display()))
}

/// JSON object `{url, ...form}` for the user turn.
///
/// The URL is entity-unescaped; rewritten links can carry `&amp;` from the
/// markup they were lifted from. A form field named `url` wins over the URL.
fn user_content(full_url: &str, form: &FormFields) -> String {
    let mut obj = serde_json::Map::new();
    obj.insert(
        "url".to_string(),
        serde_json::Value::String(html_escape::decode_html_entities(full_url).into_owned()),
    );
    for (name, value) in form.iter() {
        obj.insert(name.to_string(), serde_json::Value::String(value.to_string()));
    }
    serde_json::Value::Object(obj).to_string()
}
