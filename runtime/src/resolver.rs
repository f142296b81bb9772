//! Virtual URL resolution.
//!
//! Turns the raw catch-all path of an inbound request into the
//! [`VirtualUrl`] that identifies a synthetic resource. The same value is
//! the cache key and the prompt content, so its canonical form must be
//! stable for a given request.

use std::fmt;

/// Name of the last path segment that short-circuits to an empty response.
const FAVICON: &str = "favicon.ico";

/// A resource address inside the fictitious web.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualUrl {
    /// Virtual host, e.g. `en.wikipedia.org`. Never empty.
    pub domain: String,
    /// Path below the domain, without the leading `/`.
    pub path: String,
    /// Query string without the `?`.
    pub query: Option<String>,
    /// Fragment without the `#`. Never part of [`VirtualUrl::full_url`].
    pub fragment: Option<String>,
}

/// What an inbound path resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    /// Root request: serve the static entry document.
    Index,
    /// Favicon request: empty 200, no generation.
    Favicon,
    /// Everything else enters the pipeline.
    Virtual(VirtualUrl),
}

impl VirtualUrl {
    /// `domain/path[?query]`, the cache key and prompt URL.
    pub fn full_url(&self) -> String {
        let mut url = format!("{}/{}", self.domain, self.path);
        if let Some(query) = &self.query {
            url.push('?');
            url.push_str(query);
        }
        url
    }

    /// Path component used for content-type inference.
    pub fn file_path(&self) -> &str {
        &self.path
    }
}

impl fmt::Display for VirtualUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_url())?;
        if let Some(fragment) = &self.fragment {
            write!(f, "#{fragment}")?;
        }
        Ok(())
    }
}

/// Resolve an inbound request into a [`Resolved`] target.
///
/// `raw_path` is the catch-all path as the transport decoded it, with or
/// without a leading `/`. `query` and `fragment` are the raw request parts,
/// when the transport carries them.
pub fn resolve(raw_path: &str, query: Option<&str>, fragment: Option<&str>) -> Resolved {
    if raw_path.trim_start_matches('/').is_empty() {
        return Resolved::Index;
    }
    if is_favicon(raw_path) {
        return Resolved::Favicon;
    }

    let mut combined = raw_path.to_string();
    if let Some(q) = query.filter(|q| !q.is_empty()) {
        combined.push('?');
        combined.push_str(q);
    }
    if let Some(frag) = fragment.filter(|f| !f.is_empty()) {
        combined.push('#');
        combined.push_str(frag);
    }

    let stripped = strip_schemes(&combined);
    let stripped = stripped.trim_start_matches('/');
    if stripped.is_empty() {
        return Resolved::Index;
    }

    match split_virtual(stripped) {
        Some(url) => Resolved::Virtual(url),
        None => Resolved::Index,
    }
}

/// Remove every literal `http://` / `https://` token.
///
/// Rewritten script URLs arrive as `/https://host/...`, so the scheme can sit
/// anywhere in the path, not only at the front.
fn strip_schemes(url: &str) -> String {
    url.replace("https://", "").replace("http://", "")
}

/// Split `domain[/path][?query][#fragment]` into its parts.
///
/// The query is cut at its first `#` before the fragment is taken, so a
/// fragment can never leak into the cache key.
fn split_virtual(url: &str) -> Option<VirtualUrl> {
    let domain_end = url.find(['/', '?', '#']).unwrap_or(url.len());
    let domain = &url[..domain_end];
    if domain.is_empty() {
        return None;
    }

    let mut rest = &url[domain_end..];
    if let Some(after_slash) = rest.strip_prefix('/') {
        rest = after_slash;
    }

    let (path, query_and_fragment) = match rest.find(['?', '#']) {
        Some(i) => (&rest[..i], Some(&rest[i..])),
        None => (rest, None),
    };

    let (query, fragment) = match query_and_fragment {
        Some(tail) if tail.starts_with('?') => {
            let tail = &tail[1..];
            match tail.split_once('#') {
                Some((q, f)) => (Some(q.to_string()), Some(f.to_string())),
                None => (Some(tail.to_string()), None),
            }
        }
        Some(tail) => (None, Some(tail[1..].to_string())),
        None => (None, None),
    };

    Some(VirtualUrl {
        domain: domain.to_string(),
        path: path.to_string(),
        query: query.filter(|q| !q.is_empty()),
        fragment: fragment.filter(|f| !f.is_empty()),
    })
}

/// Whether the last segment of `path` is `favicon.ico`.
///
/// The transport hands over an already percent-decoded path.
fn is_favicon(path: &str) -> bool {
    let without_query = path.split(['?', '#']).next().unwrap_or_default();
    let last = without_query.rsplit('/').next().unwrap_or_default();
    last.eq_ignore_ascii_case(FAVICON)
}
