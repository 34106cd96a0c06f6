//! One import run: collect candidates, download and persist each, then
//! publish the video manifest and rewrite the template.
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::classify::{categorize, filename_from_url};
use crate::cms::{self, CmsSession, ReqwestSession};
use crate::config::Config;
use crate::download::Downloader;
use crate::http::Fetcher;
use crate::model::{
    AssetCandidate, AssetsByCategory, Category, CategoryFilter, ImportReport, SourceSelector,
    VideoRef,
};
use crate::persist::Persister;
use crate::scrape::{dedupe_videos, trusted_candidate, Scraper};
use crate::store::ImageStore;
use crate::template;

#[derive(Debug, Clone)]
pub struct ImportOptions {
    pub source: SourceSelector,
    pub category: CategoryFilter,
    pub dry_run: bool,
    pub update_template: bool,
    pub strict_template: bool,
    pub skip_failed: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            source: SourceSelector::Scrape,
            category: CategoryFilter::All,
            dry_run: false,
            update_template: true,
            strict_template: false,
            skip_failed: true,
        }
    }
}

/// Candidates and videos gathered from the selected sources.
#[derive(Debug, Clone, Default)]
pub struct Collected {
    pub images: Vec<AssetCandidate>,
    pub videos: Vec<VideoRef>,
}

pub struct Importer {
    cfg: Config,
    fetcher: Arc<dyn Fetcher>,
    store: Option<Arc<dyn ImageStore>>,
    cms_session: Option<Arc<dyn CmsSession>>,
}

impl Importer {
    pub fn new(cfg: Config, fetcher: Arc<dyn Fetcher>, store: Option<Arc<dyn ImageStore>>) -> Self {
        Self {
            cfg,
            fetcher,
            store,
            cms_session: None,
        }
    }

    /// Talk to the CMS through `session` instead of a fresh reqwest client.
    pub fn with_cms_session(mut self, session: Arc<dyn CmsSession>) -> Self {
        self.cms_session = Some(session);
        self
    }

    pub fn output_dir(&self) -> PathBuf {
        PathBuf::from(&self.cfg.app.output_dir)
    }

    #[instrument(skip_all)]
    pub async fn collect(&self, source: SourceSelector) -> Result<Collected> {
        let mut by_canonical: BTreeMap<String, AssetCandidate> = BTreeMap::new();
        let mut videos = Vec::new();

        if source.scrapes() {
            info!(site = %self.cfg.source.site_url, "scraping site for assets");
            let scraper = Scraper::new(
                self.fetcher.clone(),
                self.cfg.source.clone(),
                self.cfg.page_urls(),
            )?;
            let scraped = scraper.scrape_all().await;
            if scraped.pages_failed > 0 {
                warn!(failed = scraped.pages_failed, "some pages could not be scraped");
            }
            for c in scraped.images {
                let key = c.fetch_url().to_string();
                by_canonical.entry(key).or_insert(c);
            }
            videos.extend(scraped.videos);
        }

        if source.uses_cms() {
            info!(base = %self.cfg.cms.base_url, "fetching assets from CMS API");
            for url in self.cms_images().await {
                by_canonical
                    .entry(url.clone())
                    .or_insert_with(|| trusted_candidate(&url));
            }
        }

        Ok(Collected {
            images: by_canonical.into_values().collect(),
            videos: dedupe_videos(videos),
        })
    }

    async fn cms_images(&self) -> Vec<String> {
        let session: Arc<dyn CmsSession> = match &self.cms_session {
            Some(session) => session.clone(),
            None => match ReqwestSession::new(&self.cfg.http) {
                Ok(session) => Arc::new(session),
                Err(err) => {
                    warn!(?err, "failed to build CMS client");
                    return Vec::new();
                }
            },
        };
        cms::fetch_cms_images(&self.cfg.cms, session).await
    }

    /// Run the whole import. In dry-run mode nothing is downloaded or written.
    #[instrument(skip_all)]
    pub async fn run(&self, opts: &ImportOptions) -> Result<ImportReport> {
        let collected = self.collect(opts.source).await?;
        info!(
            images = collected.images.len(),
            videos = collected.videos.len(),
            "collected candidates"
        );

        let mut report = ImportReport {
            image_candidates: collected
                .images
                .iter()
                .map(|c| c.fetch_url().to_string())
                .collect(),
            videos: collected.videos.clone(),
            dry_run: opts.dry_run,
            ..Default::default()
        };
        if opts.dry_run {
            return Ok(report);
        }

        let persister = Persister::new(self.output_dir(), self.store.clone());
        info!(dir = %persister.output_dir().display(), "creating directory structure");
        persister.ensure_dirs().await?;

        let downloader = Downloader::new(
            self.fetcher.clone(),
            self.cfg.http.max_retries,
            opts.skip_failed,
        );
        self.process_images(&collected.images, &downloader, &persister, opts.category, &mut report)
            .await;

        persister
            .write_video_manifest(&collected.videos)
            .await
            .context("failed to save video metadata")?;

        if opts.update_template {
            let path = PathBuf::from(&self.cfg.app.template_path);
            report.template = Some(
                template::apply(&path, &report.assets, &collected.videos, opts.strict_template)
                    .await?,
            );
        }

        info!(
            downloaded = report.success_count,
            skipped = report.skip_count,
            "import complete"
        );
        Ok(report)
    }

    async fn process_images(
        &self,
        images: &[AssetCandidate],
        downloader: &Downloader,
        persister: &Persister,
        filter: CategoryFilter,
        report: &mut ImportReport,
    ) {
        let mut assets = AssetsByCategory::new();
        for c in images {
            let url = c.fetch_url();
            let filename = c
                .filename
                .clone()
                .unwrap_or_else(|| filename_from_url(url));
            let category = c
                .category
                .unwrap_or_else(|| categorize(&filename, url));
            if !filter.admits(category) {
                continue;
            }
            if filename.is_empty() {
                report.skip_count += 1;
                continue;
            }

            let content = match downloader.download(url).await {
                Ok(Some(bytes)) => bytes,
                Ok(None) => {
                    report.skip_count += 1;
                    continue;
                }
                Err(err) => {
                    warn!(%err, "download failed");
                    report.skip_count += 1;
                    continue;
                }
            };
            info!(%filename, bytes = content.len(), "downloaded");

            match persister.persist(&content, &filename, category, url).await {
                Ok(asset) => {
                    assets.entry(category).or_insert_with(Vec::new).push(asset);
                    report.success_count += 1;
                }
                Err(err) => {
                    warn!(?err, %filename, "failed to persist asset");
                    report.skip_count += 1;
                }
            }
        }
        report.assets = assets;
    }
}

/// Count of persisted assets per category, for the summary.
pub fn category_counts(assets: &AssetsByCategory) -> Vec<(Category, usize)> {
    assets.iter().map(|(c, a)| (*c, a.len())).collect()
}
