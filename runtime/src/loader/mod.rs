//! Lazy-section loader.
//!
//! Generated pages may defer parts of themselves to placeholder elements
//! carrying [`SOURCE_ATTR`]. Delivered HTML gets [`LOADER_SCRIPT`] inserted
//! before `</body>`; in the browser it POSTs each placeholder's attributes
//! to its source URL and splices the result in, including placeholders that
//! arrive with fetched content.
//!
//! Each placeholder moves `unprocessed -> loading -> resolved | failed`,
//! recorded in [`PROCESSED_ATTR`]. The `loading` mark is set synchronously
//! before the fetch starts, so a re-scan never fetches the same element twice.

/// Attribute naming the URL a placeholder is filled from.
pub const SOURCE_ATTR: &str = "data-dynamic-content-url";
/// Marker set on a placeholder once it has been claimed.
pub const PROCESSED_ATTR: &str = "data-processed";
/// Optional structure hint; selects an extra stylesheet.
pub const STRUCTURE_ATTR: &str = "data-structure";

/// Client-side loader source.
pub const LOADER_SCRIPT: &str = include_str!("lazy_sections.js");

const BODY_CLOSE: &str = "</body>";

/// Insert the loader before the last `</body>`.
///
/// Returns the document unchanged when there is no `</body>`.
pub fn inject(html: &str) -> String {
    match html.rfind(BODY_CLOSE) {
        Some(at) => {
            let mut out = String::with_capacity(html.len() + LOADER_SCRIPT.len() + 32);
            out.push_str(&html[..at]);
            out.push_str("<script>\n");
            out.push_str(LOADER_SCRIPT);
            out.push_str("</script>\n");
            out.push_str(&html[at..]);
            out
        }
        None => html.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Body of the JS function declared as `const <name> = ...`, up to the
    /// next top-level `const`.
    fn js_function(name: &str) -> &'static str {
        let start = LOADER_SCRIPT
            .find(&format!("const {name} = "))
            .unwrap_or_else(|| panic!("no {name} in loader"));
        let rest = &LOADER_SCRIPT[start + 1..];
        let end = rest.find("\n    const ").map_or(rest.len(), |i| i + 1);
        &LOADER_SCRIPT[start..start + end]
    }

    #[test]
    fn test_inject_before_body_close() {
        let out = inject("<html><body><p>x</p></body></html>");
        let script_at = out.find("<script>").unwrap();
        let body_at = out.find("</body>").unwrap();
        assert!(script_at < body_at);
        assert!(out.contains(SOURCE_ATTR));
        assert!(out.ends_with("</body></html>"));
    }

    #[test]
    fn test_inject_without_body_is_noop() {
        assert_eq!(inject("<p>fragment</p>"), "<p>fragment</p>");
        assert_eq!(inject("<BODY>x</BODY>"), "<BODY>x</BODY>");
    }

    #[test]
    fn test_inject_once_for_repeated_body_close() {
        let out = inject("<body>a</body><body>b</body>");
        assert_eq!(out.matches("MutationObserver").count(), 1);
        assert!(out.starts_with("<body>a</body><body>b<script>"));
    }

    #[test]
    fn test_script_cannot_close_its_own_tag() {
        let lower = LOADER_SCRIPT.to_ascii_lowercase();
        assert!(!lower.contains("</script"));
        assert!(!lower.contains("</body"));
    }

    #[test]
    fn test_script_uses_shared_markers() {
        assert!(LOADER_SCRIPT.contains(&format!("SOURCE_ATTR = '{SOURCE_ATTR}'")));
        assert!(LOADER_SCRIPT.contains(&format!("PROCESSED_ATTR = '{PROCESSED_ATTR}'")));
        assert!(LOADER_SCRIPT.contains(&format!("STRUCTURE_ATTR = '{STRUCTURE_ATTR}'")));
        for marker in ["LOADING = 'loading'", "RESOLVED = 'resolved'", "FAILED = 'failed'"] {
            assert!(LOADER_SCRIPT.contains(marker), "{marker}");
        }
    }

    #[test]
    fn test_claim_marks_before_returning() {
        let claim = js_function("claim");
        let guard = claim.find("hasAttribute(PROCESSED_ATTR)").unwrap();
        let mark = claim.find("setAttribute(PROCESSED_ATTR, LOADING)").unwrap();
        assert!(guard < mark);
        assert!(!claim.contains("fetch"), "claim must stay synchronous");
    }

    #[test]
    fn test_scan_claims_before_any_fetch() {
        let scan = js_function("loadAllSections");
        let claim = scan.find("if (!claim(element)) return;").unwrap();
        for loader in ["loadStylesheet(", "loadScript(", "loadSection("] {
            let at = scan.find(loader).unwrap_or_else(|| panic!("{loader}"));
            assert!(claim < at, "{loader} runs before the claim");
        }
        assert!(!scan.contains("fetch("));
    }

    #[test]
    fn test_observer_only_rescans() {
        let start = LOADER_SCRIPT.find("new MutationObserver").unwrap();
        let end = LOADER_SCRIPT[start..].find("});").unwrap();
        let callback = &LOADER_SCRIPT[start..start + end];
        assert!(callback.contains("loadAllSections()"));
        assert!(!callback.contains("fetch"));
        for loader in ["loadStylesheet", "loadScript", "loadSection"] {
            assert!(!callback.contains(loader), "{loader}");
        }
    }

    #[test]
    fn test_failures_settle_without_retry() {
        let fail = js_function("fail");
        assert!(fail.contains("settle(element, FAILED)"));
        assert!(fail.contains("console.error"));
        assert!(!fail.contains("fetch"));
        assert!(!fail.contains("removeAttribute"));
    }

    #[test]
    fn test_sections_keep_their_element() {
        let section = js_function("loadSection");
        assert!(section.contains("replaceChildren"));
        assert!(section.contains("encodeURIComponent(structure)"));
        assert!(!section.contains("element.remove()"));
    }
}
