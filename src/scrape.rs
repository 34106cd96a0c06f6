use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::classify::{categorize, filename_from_url};
use crate::config::Source;
use crate::extract::{extract_video_ids, extractors_for, AssetExtractor};
use crate::http::Fetcher;
use crate::model::{AssetCandidate, VideoRef};
use crate::normalize::Normalizer;

/// Raw findings from one page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageAssets {
    pub images: Vec<String>,
    pub videos: Vec<String>,
}

/// Deduplicated scrape result. `images` is keyed and sorted by canonical URL.
#[derive(Debug, Clone, Default)]
pub struct ScrapeResult {
    pub images: Vec<AssetCandidate>,
    pub videos: Vec<VideoRef>,
    pub pages_failed: usize,
}

pub struct Scraper {
    fetcher: Arc<dyn Fetcher>,
    source: Source,
    page_urls: Vec<String>,
    normalizer: Normalizer,
    extractors: Vec<Box<dyn AssetExtractor>>,
}

impl Scraper {
    pub fn new(fetcher: Arc<dyn Fetcher>, source: Source, page_urls: Vec<String>) -> Result<Self> {
        let extractors = extractors_for(&source).context("invalid CDN extraction pattern")?;
        if !source.structural_html {
            info!("structural HTML parsing disabled; using regex extraction only");
        }
        Ok(Self {
            fetcher,
            normalizer: Normalizer::from_source(&source),
            source,
            page_urls,
            extractors,
        })
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    /// Known assets plus the speculative enumeration, before normalisation.
    pub fn seed_urls(&self) -> Vec<String> {
        let mut urls = self.source.known_assets.clone();
        if let Some(e) = &self.source.enumeration {
            let guessed = e.urls();
            info!(count = guessed.len(), "enumerated speculative asset urls");
            urls.extend(guessed);
        }
        urls
    }

    /// Fetch one page and extract raw candidates. A failed fetch yields an
    /// empty result after logging; it never aborts the crawl.
    #[instrument(skip_all, fields(url = %url))]
    pub async fn scrape_page(&self, url: &str) -> Option<PageAssets> {
        let res = match self.fetcher.get(url).await {
            Ok(res) => res,
            Err(err) => {
                warn!(%err, "failed to fetch page");
                return None;
            }
        };
        if !res.is_success() {
            warn!(status = res.status, "page returned error status");
            return None;
        }

        let html = res.text();
        let mut images = Vec::new();
        for ex in &self.extractors {
            images.extend(ex.extract(&html));
        }
        let videos = extract_video_ids(&html);
        info!(images = images.len(), videos = videos.len(), "scraped page");
        Some(PageAssets { images, videos })
    }

    /// Crawl every configured page and return deduplicated candidates.
    #[instrument(skip_all)]
    pub async fn scrape_all(&self) -> ScrapeResult {
        let mut raw = self.seed_urls();
        let mut videos = self.source.known_videos.clone();
        let mut pages_failed = 0;

        for url in &self.page_urls {
            info!(%url, "scraping");
            match self.scrape_page(url).await {
                Some(page) => {
                    raw.extend(page.images);
                    for id in page.videos {
                        if !videos.iter().any(|v| v.id == id) {
                            videos.push(VideoRef::discovered(&id));
                        }
                    }
                }
                None => pages_failed += 1,
            }
        }

        ScrapeResult {
            images: resolve_candidates(&self.normalizer, raw),
            videos: dedupe_videos(videos),
            pages_failed,
        }
    }
}

/// Normalise raw URLs, drop rejects and collapse duplicates by canonical URL.
pub fn resolve_candidates<I>(normalizer: &Normalizer, raw: I) -> Vec<AssetCandidate>
where
    I: IntoIterator<Item = String>,
{
    let mut by_canonical: BTreeMap<String, AssetCandidate> = BTreeMap::new();
    for url in raw {
        let Some(canonical) = normalizer.normalize(&url) else {
            continue;
        };
        by_canonical
            .entry(canonical.clone())
            .or_insert_with(|| candidate_for(url, canonical));
    }
    by_canonical.into_values().collect()
}

/// Candidate whose URL is trusted as-is (e.g. listed by the CMS API).
pub fn trusted_candidate(url: &str) -> AssetCandidate {
    candidate_for(url.to_string(), url.to_string())
}

fn candidate_for(url: String, canonical: String) -> AssetCandidate {
    let filename = filename_from_url(&canonical);
    let category = categorize(&filename, &canonical);
    AssetCandidate {
        url,
        canonical_url: Some(canonical),
        filename: Some(filename),
        category: Some(category),
    }
}

/// Keep the first reference for each id, preserving order.
pub fn dedupe_videos(videos: Vec<VideoRef>) -> Vec<VideoRef> {
    let mut out: Vec<VideoRef> = Vec::with_capacity(videos.len());
    for v in videos {
        if !out.iter().any(|o| o.id == v.id) {
            out.push(v);
        }
    }
    out
}
