//! Candidate extraction from fetched HTML.
//!
//! Two extractors feed the same candidate set: a regex scan over the raw text
//! (always on) and a structural scan over the parsed DOM (enabled by
//! `source.structural_html`). Which ones run is decided once in
//! [`extractors_for`].

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use std::collections::BTreeSet;

use crate::config::Source;

static VIMEO_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"vimeo\.com/(?:video/)?(\d+)").expect("vimeo regex"));

static CSS_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"url\(['"]?([^'")]+)['"]?\)"#).expect("css url regex"));

static IMG: Lazy<Selector> = Lazy::new(|| Selector::parse("img").expect("img selector"));
static STYLED: Lazy<Selector> = Lazy::new(|| Selector::parse("[style]").expect("style selector"));

pub trait AssetExtractor: Send + Sync {
    fn name(&self) -> &'static str;
    /// Raw candidate URLs found in `html`; not yet normalised.
    fn extract(&self, html: &str) -> Vec<String>;
}

/// Scans raw text for `http(s)://<cdn_host><media_prefix>...` runs.
#[derive(Debug)]
pub struct RegexExtractor {
    pattern: Regex,
}

impl RegexExtractor {
    pub fn new(cdn_host: &str, media_prefix: &str) -> Result<Self, regex::Error> {
        let pattern = Regex::new(&format!(
            r#"https?://{}{}[^\s"'\)>]+"#,
            regex::escape(cdn_host),
            regex::escape(media_prefix)
        ))?;
        Ok(Self { pattern })
    }
}

impl AssetExtractor for RegexExtractor {
    fn name(&self) -> &'static str {
        "regex"
    }

    fn extract(&self, html: &str) -> Vec<String> {
        self.pattern
            .find_iter(html)
            .map(|m| m.as_str().trim_end_matches(['"', '\'', ')']).to_string())
            .collect()
    }
}

/// `img[src]`, `img[data-src]` and inline `style` background URLs that mention
/// the CDN host (directly or inside a proxy query string).
#[derive(Debug)]
pub struct StructuralExtractor {
    cdn_host: String,
}

impl StructuralExtractor {
    pub fn new(cdn_host: &str) -> Self {
        Self {
            cdn_host: cdn_host.to_string(),
        }
    }
}

impl AssetExtractor for StructuralExtractor {
    fn name(&self) -> &'static str {
        "structural"
    }

    fn extract(&self, html: &str) -> Vec<String> {
        let document = Html::parse_document(html);

        let mut out = Vec::new();
        for img in document.select(&IMG) {
            let src = img
                .value()
                .attr("src")
                .filter(|s| !s.is_empty())
                .or_else(|| img.value().attr("data-src"));
            if let Some(src) = src {
                if src.contains(&self.cdn_host) {
                    out.push(src.to_string());
                }
            }
        }

        for el in document.select(&STYLED) {
            let Some(style) = el.value().attr("style") else {
                continue;
            };
            for caps in CSS_URL.captures_iter(style) {
                let url = &caps[1];
                if url.contains(&self.cdn_host) {
                    out.push(url.to_string());
                }
            }
        }
        out
    }
}

/// Build the extractor chain for this run.
pub fn extractors_for(source: &Source) -> Result<Vec<Box<dyn AssetExtractor>>, regex::Error> {
    let mut chain: Vec<Box<dyn AssetExtractor>> = vec![Box::new(RegexExtractor::new(
        &source.cdn_host,
        &source.media_prefix,
    )?)];
    if source.structural_html {
        chain.push(Box::new(StructuralExtractor::new(&source.cdn_host)));
    }
    Ok(chain)
}

/// Distinct Vimeo ids in order of first appearance.
pub fn extract_video_ids(html: &str) -> Vec<String> {
    let mut seen = BTreeSet::new();
    VIMEO_ID
        .captures_iter(html)
        .map(|c| c[1].to_string())
        .filter(|id| seen.insert(id.clone()))
        .collect()
}
