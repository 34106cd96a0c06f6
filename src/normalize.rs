//! Canonicalisation of scraped asset URLs.
//!
//! Image-proxy wrappers (`/_next/image?url=...`) are unwrapped to the URL they
//! carry; direct CDN URLs are trimmed of the HTML-entity and quote debris that
//! naive regex extraction leaves behind. Anything else is rejected.

use url::Url;

use crate::config::Source;

pub const IMAGE_EXTENSIONS: [&str; 7] = [".jpg", ".jpeg", ".png", ".gif", ".svg", ".webp", ".avif"];

const MAX_PROXY_DEPTH: usize = 4;

#[derive(Debug, Clone)]
pub struct Normalizer {
    cdn_host: String,
    proxy_paths: Vec<String>,
}

impl Normalizer {
    pub fn new(cdn_host: impl Into<String>, proxy_paths: Vec<String>) -> Self {
        Self {
            cdn_host: cdn_host.into().to_ascii_lowercase(),
            proxy_paths,
        }
    }

    pub fn from_source(source: &Source) -> Self {
        Self::new(source.cdn_host.clone(), source.proxy_paths.clone())
    }

    pub fn cdn_host(&self) -> &str {
        &self.cdn_host
    }

    /// Map a raw URL to its canonical CDN form, or `None` to reject it.
    pub fn normalize(&self, raw: &str) -> Option<String> {
        self.normalize_depth(raw.trim(), 0)
    }

    fn normalize_depth(&self, raw: &str, depth: usize) -> Option<String> {
        if self.is_proxy(raw) {
            if depth >= MAX_PROXY_DEPTH {
                return None;
            }
            let inner = proxied_url(raw)?;
            return self.normalize_depth(inner.trim(), depth + 1);
        }

        let cleaned = strip_artifacts(raw);
        let parsed = Url::parse(cleaned).ok()?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return None;
        }
        let host = parsed.host_str()?.to_ascii_lowercase();
        if host != self.cdn_host {
            return None;
        }
        if !has_image_extension(cleaned) {
            return None;
        }
        Some(cleaned.to_string())
    }

    fn is_proxy(&self, raw: &str) -> bool {
        let path = raw.split(['?', '#']).next().unwrap_or(raw);
        self.proxy_paths.iter().any(|p| path.contains(p.as_str()))
    }
}

/// Value of the `url` query parameter, percent-decoded.
fn proxied_url(raw: &str) -> Option<String> {
    let (_, query) = raw.split_once('?')?;
    let query = query.split('#').next().unwrap_or(query);
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(k, _)| k == "url")
        .map(|(_, v)| v.into_owned())
        .filter(|v| !v.is_empty())
}

fn strip_artifacts(raw: &str) -> &str {
    let s = raw.split("&#").next().unwrap_or(raw);
    let s = s.split('\'').next().unwrap_or(s);
    let s = s.split('"').next().unwrap_or(s);
    s.trim_end_matches([')', '\\', ';', ',']).trim()
}

/// True when the URL ends with a recognised image extension (case-insensitive).
pub fn has_image_extension(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    IMAGE_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}
