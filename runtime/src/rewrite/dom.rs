//! Minimal DOM layer over `scraper`.
//!
//! A [`NodeRewrite`] hook visits every attribute and every raw-text run
//! (script, style, ...) and may substitute a new value in place. Output goes
//! through html5ever's serializer.

use super::RewriteError;
use scraper::{ElementRef, Html, Node, Selector};

/// Deepest element nesting accepted.
pub const MAX_DEPTH: usize = 512;

const RAW_TEXT_ELEMENTS: &[&str] = &[
    "script", "style", "xmp", "iframe", "noembed", "noframes", "plaintext", "noscript",
];

/// Edits applied to a parsed tree.
pub trait NodeRewrite {
    /// Replacement for attribute `name="value"` on `element`, if any.
    ///
    /// `name` is qualified (`xlink:href`) when the attribute has a prefix.
    fn attribute(&mut self, element: &str, name: &str, value: &str) -> Option<String>;

    /// Replacement for raw text inside `element`, if any.
    fn raw_text(&mut self, element: &str, text: &str) -> Option<String>;
}

/// A parsed markup tree.
pub struct Document {
    html: Html,
    full: bool,
}

impl Document {
    /// Parse `markup` as a full document when it looks like one
    /// (doctype, `<html>`, `<head>` or `<body>`), else as a body fragment.
    pub fn parse(markup: &str) -> Self {
        let lower = markup.to_ascii_lowercase();
        let full = ["<!doctype", "<html", "<head", "<body"]
            .iter()
            .any(|tag| lower.contains(tag));
        let html = if full {
            Html::parse_document(markup)
        } else {
            Html::parse_fragment(markup)
        };
        Self { html, full }
    }

    /// Whether the input was parsed as a full document.
    pub fn is_full_document(&self) -> bool {
        self.full
    }

    /// Elements matching `selector`, in document order.
    pub fn select<'a>(&'a self, selector: &'a Selector) -> impl Iterator<Item = ElementRef<'a>> + 'a {
        self.html.select(selector)
    }

    /// Fail with [`RewriteError::TooDeep`] when elements nest past [`MAX_DEPTH`].
    pub fn check_depth(&self) -> Result<(), RewriteError> {
        let mut stack = vec![(self.html.tree.root(), 0usize)];
        while let Some((node, depth)) = stack.pop() {
            if depth > MAX_DEPTH {
                return Err(RewriteError::TooDeep(MAX_DEPTH));
            }
            for child in node.children() {
                let next = if child.value().is_element() { depth + 1 } else { depth };
                stack.push((child, next));
            }
        }
        Ok(())
    }

    /// Apply `edits` to every attribute and raw-text node.
    pub fn apply(&mut self, edits: &mut dyn NodeRewrite) {
        let ids: Vec<_> = self.html.tree.nodes().map(|node| node.id()).collect();

        for id in ids {
            let raw_parent = self.html.tree.get(id).and_then(|node| {
                if !node.value().is_text() {
                    return None;
                }
                let parent = node.parent()?;
                let name = parent.value().as_element()?.name();
                RAW_TEXT_ELEMENTS.contains(&name).then(|| name.to_string())
            });

            let Some(mut node) = self.html.tree.get_mut(id) else {
                continue;
            };
            match node.value() {
                Node::Element(element) => {
                    let name = element.name().to_string();
                    for (attr, value) in element.attrs.iter_mut() {
                        let qualified = match &attr.prefix {
                            Some(prefix) => format!("{}:{}", prefix, attr.local),
                            None => attr.local.to_string(),
                        };
                        if let Some(new) = edits.attribute(&name, &qualified, value) {
                            value.clear();
                            value.push_slice(&new);
                        }
                    }
                }
                Node::Text(text) => {
                    if let Some(parent) = raw_parent {
                        if let Some(new) = edits.raw_text(&parent, &text.text) {
                            text.text.clear();
                            text.text.push_slice(&new);
                        }
                    }
                }
                _ => {}
            }
        }
    }

    /// Serialize back to markup.
    pub fn serialize(&self) -> String {
        if self.full {
            self.html.html()
        } else {
            // Fragments hang off a synthetic <html> wrapper.
            self.html.root_element().inner_html()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fragment_round_trip() {
        let doc = Document::parse(r#"<p class="x">a &amp; b<br><a href="/y">y</a></p>"#);
        assert!(!doc.is_full_document());
        assert_eq!(
            doc.serialize(),
            r#"<p class="x">a &amp; b<br><a href="/y">y</a></p>"#
        );
    }

    #[test]
    fn test_full_document_keeps_doctype_and_body() {
        let doc = Document::parse("<!DOCTYPE html><html><head><title>t</title></head><body><p>x</p></body></html>");
        assert!(doc.is_full_document());
        let out = doc.serialize();
        assert!(out.starts_with("<!DOCTYPE html><html><head><title>t</title></head>"));
        assert!(out.contains("<body><p>x</p></body>"));
    }

    #[test]
    fn test_script_text_is_not_escaped() {
        let doc = Document::parse("<script>if (a < b && c) {}</script>");
        assert_eq!(doc.serialize(), "<script>if (a < b && c) {}</script>");
    }

    #[test]
    fn test_attribute_quotes_are_escaped() {
        let doc = Document::parse(r#"<div title='say "hi"'></div>"#);
        assert_eq!(doc.serialize(), r#"<div title="say &quot;hi&quot;"></div>"#);
    }

    #[test]
    fn test_namespaced_svg_attributes_survive() {
        let doc = Document::parse(concat!(
            r#"<svg xmlns:xlink="http://www.w3.org/1999/xlink">"#,
            r##"<use xlink:href="#icon"></use></svg>"##
        ));
        let out = doc.serialize();
        assert!(out.contains(r#"xmlns:xlink="http://www.w3.org/1999/xlink""#), "{out}");
        assert!(out.contains(r##"xlink:href="#icon""##), "{out}");
    }

    #[test]
    fn test_edits_apply_to_attributes_and_raw_text() {
        struct Upper;
        impl NodeRewrite for Upper {
            fn attribute(&mut self, element: &str, name: &str, value: &str) -> Option<String> {
                (element == "a" && name == "href").then(|| value.to_uppercase())
            }
            fn raw_text(&mut self, element: &str, text: &str) -> Option<String> {
                (element == "script").then(|| text.to_uppercase())
            }
        }

        let mut doc =
            Document::parse(r#"<a href="/x">x</a><script>go()</script><style>p{}</style><p>go()</p>"#);
        doc.apply(&mut Upper);
        assert_eq!(
            doc.serialize(),
            r#"<a href="/X">x</a><script>GO()</script><style>p{}</style><p>go()</p>"#
        );
    }

    #[test]
    fn test_edit_hook_sees_qualified_names() {
        struct Names(Vec<String>);
        impl NodeRewrite for Names {
            fn attribute(&mut self, _: &str, name: &str, _: &str) -> Option<String> {
                self.0.push(name.to_string());
                None
            }
            fn raw_text(&mut self, _: &str, _: &str) -> Option<String> {
                None
            }
        }

        let mut doc = Document::parse(r##"<svg><a xlink:href="#a"></a></svg>"##);
        let mut names = Names(Vec::new());
        doc.apply(&mut names);
        assert_eq!(names.0, ["xlink:href"]);
    }

    #[test]
    fn test_select_uses_css_selectors() {
        let doc = Document::parse(r#"<div data-k="1"></div><span></span><div data-k="2"></div>"#);
        let sel = Selector::parse("[data-k]").unwrap();
        let values: Vec<_> = doc.select(&sel).filter_map(|e| e.value().attr("data-k")).collect();
        assert_eq!(values, ["1", "2"]);
    }

    #[test]
    fn test_excessive_nesting_is_rejected() {
        let doc = Document::parse(&"<div>".repeat(MAX_DEPTH + 10));
        assert!(matches!(doc.check_depth(), Err(RewriteError::TooDeep(_))));

        let shallow = Document::parse(&"<div>".repeat(10));
        assert!(shallow.check_depth().is_ok());
    }
}
