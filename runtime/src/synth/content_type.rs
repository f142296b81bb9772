//! Content-type inference for virtual paths.

use regex::Regex;
use std::sync::OnceLock;

pub const TEXT_HTML: &str = "text/html";
pub const TEXT_CSS: &str = "text/css";
pub const TEXT_JAVASCRIPT: &str = "text/javascript";

/// Infer the MIME type of a virtual path from its extension.
///
/// Unknown or missing extensions are `text/html`: most of the virtual web
/// is pages.
pub fn infer(path: &str) -> String {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    if is_server_page(path) {
        return TEXT_HTML.to_string();
    }
    match mime_guess::from_path(path).first() {
        Some(mime) => normalize(mime.essence_str()),
        None => TEXT_HTML.to_string(),
    }
}

/// Server-side page extensions; these render to HTML on any real site.
const SERVER_PAGE_EXTENSIONS: &[&str] = &[
    "php", "php3", "php4", "php5", "phtml", "asp", "aspx", "jsp", "jspx", "cgi", "pl", "cfm",
    "shtml", "do", "action",
];

fn is_server_page(path: &str) -> bool {
    std::path::Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            SERVER_PAGE_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
}

/// Canonicalize a MIME type: lowercase essence, legacy script types mapped
/// to `text/javascript`.
pub fn normalize(mime: &str) -> String {
    let essence = mime
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    match essence.as_str() {
        "application/javascript" | "application/x-javascript" | "application/ecmascript" => {
            TEXT_JAVASCRIPT.to_string()
        }
        _ => essence,
    }
}

/// Whether link rewriting applies to this type.
pub fn is_markup(content_type: &str) -> bool {
    matches!(
        content_type,
        TEXT_HTML | "application/xhtml+xml" | "image/svg+xml"
    )
}

/// Whether generated output of this type gets the entity-unescape pass.
pub fn needs_unescape(content_type: &str) -> bool {
    matches!(content_type, TEXT_JAVASCRIPT | TEXT_CSS)
}

/// Whether the stylesheet template applies.
pub fn is_stylesheet(content_type: &str) -> bool {
    content_type.contains("css")
}

/// Parse a leading content-type declaration line.
///
/// Accepts `Content-Type: <type>` and a bare `<type>`, with optional
/// parameters. A bare type must be one `mime_guess` knows, so a first line
/// like `total/count` stays part of the body. Returns the normalized type.
pub fn parse_declaration(line: &str) -> Option<String> {
    static DECL: OnceLock<Regex> = OnceLock::new();
    let re = DECL.get_or_init(|| {
        Regex::new(r"(?i)^\s*(content-type\s*:\s*)?([a-z]+/[a-z0-9.+\-]+)\s*(?:;.*)?$")
            .expect("valid regex")
    });
    let caps = re.captures(line)?;
    let mime = caps.get(2)?.as_str();
    let explicit = caps.get(1).is_some();
    let normalized = normalize(mime);
    if explicit || is_known(&normalized) || is_known(&mime.to_ascii_lowercase()) {
        Some(normalized)
    } else {
        None
    }
}

fn is_known(mime: &str) -> bool {
    matches!(mime, TEXT_HTML | TEXT_CSS | TEXT_JAVASCRIPT)
        || mime_guess::get_mime_extensions_str(mime).is_some()
}
