//! Splices generated asset markup into the support page template.
//!
//! Each region is a tab pane whose body is a "Coming Soon" placeholder. The
//! placeholder is replaced textually; a region with no assets is left alone.

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

use crate::model::{AssetRef, AssetsByCategory, Category, VideoRef};

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("template not found: {0}")]
    Missing(String),
    #[error("placeholder for region {0} not found in template")]
    PlaceholderMissing(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    Videos,
    FactCards,
    PostCards,
}

impl Region {
    pub const ALL: [Region; 3] = [Region::Videos, Region::FactCards, Region::PostCards];

    pub fn name(&self) -> &'static str {
        match self {
            Region::Videos => "videos",
            Region::FactCards => "fact-cards",
            Region::PostCards => "post-cards",
        }
    }

    fn pattern(&self) -> &'static Regex {
        match self {
            Region::Videos => &VIDEOS_PLACEHOLDER,
            Region::FactCards => &FACTS_PLACEHOLDER,
            Region::PostCards => &POSTS_PLACEHOLDER,
        }
    }
}

fn placeholder(pane_id: &str, label: &str) -> Regex {
    Regex::new(&format!(
        r#"(<div class="tab-pane fade" id="{}"[^>]*>)\s*<div class="text-center py-5 text-muted">{} Content Coming Soon\.\.\.</div>"#,
        regex::escape(pane_id),
        regex::escape(label)
    ))
    .expect("placeholder regex")
}

static VIDEOS_PLACEHOLDER: Lazy<Regex> = Lazy::new(|| placeholder("videos-content", "Videos"));
static FACTS_PLACEHOLDER: Lazy<Regex> = Lazy::new(|| placeholder("facts-content", "Fact Cards"));
static POSTS_PLACEHOLDER: Lazy<Regex> = Lazy::new(|| placeholder("post-content", "Post Cards"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionOutcome {
    Applied,
    NoAssets,
    PlaceholderMissing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteReport {
    pub regions: Vec<(Region, RegionOutcome)>,
    pub written: bool,
}

impl RewriteReport {
    pub fn outcome(&self, region: Region) -> Option<RegionOutcome> {
        self.regions
            .iter()
            .find(|(r, _)| *r == region)
            .map(|(_, o)| *o)
    }

    pub fn applied(&self) -> usize {
        self.regions
            .iter()
            .filter(|(_, o)| *o == RegionOutcome::Applied)
            .count()
    }

    pub fn missing(&self) -> Vec<Region> {
        self.regions
            .iter()
            .filter(|(_, o)| *o == RegionOutcome::PlaceholderMissing)
            .map(|(r, _)| *r)
            .collect()
    }
}

/// Rewrite `content` in memory. Returns the new text and per-region outcomes.
pub fn rewrite(
    content: &str,
    assets: &AssetsByCategory,
    videos: &[VideoRef],
) -> (String, Vec<(Region, RegionOutcome)>) {
    let mut out = content.to_string();
    let mut regions = Vec::with_capacity(Region::ALL.len());

    for region in Region::ALL {
        let markup = match region {
            Region::Videos if !videos.is_empty() => Some(videos_html(videos)),
            Region::FactCards => non_empty(assets, Category::FactCards).map(|a| cards_html(a, Category::FactCards)),
            Region::PostCards => non_empty(assets, Category::PostCards).map(|a| cards_html(a, Category::PostCards)),
            Region::Videos => None,
        };
        let Some(markup) = markup else {
            regions.push((region, RegionOutcome::NoAssets));
            continue;
        };

        let re = region.pattern();
        if !re.is_match(&out) {
            regions.push((region, RegionOutcome::PlaceholderMissing));
            continue;
        }
        out = re
            .replace_all(&out, |caps: &regex::Captures| format!("{}\n{}", &caps[1], markup))
            .into_owned();
        regions.push((region, RegionOutcome::Applied));
    }

    (out, regions)
}

fn non_empty(assets: &AssetsByCategory, category: Category) -> Option<&[AssetRef]> {
    assets
        .get(&category)
        .map(Vec::as_slice)
        .filter(|a| !a.is_empty())
}

/// Rewrite the template file in place. With `strict`, a missing file or a
/// missing placeholder for a region that has assets is an error; otherwise it
/// is logged and the run continues.
pub async fn apply(
    path: &Path,
    assets: &AssetsByCategory,
    videos: &[VideoRef],
    strict: bool,
) -> Result<RewriteReport> {
    let exists = tokio::fs::try_exists(path)
        .await
        .with_context(|| format!("failed to check {}", path.display()))?;
    if !exists {
        if strict {
            return Err(TemplateError::Missing(path.display().to_string()).into());
        }
        warn!(path = %path.display(), "template not found; skipping rewrite");
        return Ok(RewriteReport {
            regions: Vec::new(),
            written: false,
        });
    }

    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    let (updated, regions) = rewrite(&content, assets, videos);
    let mut report = RewriteReport {
        regions,
        written: false,
    };

    for region in report.missing() {
        if strict {
            return Err(TemplateError::PlaceholderMissing(region.name()).into());
        }
        warn!(region = region.name(), "template placeholder not found; region left unchanged");
    }

    if report.applied() > 0 {
        tokio::fs::write(path, updated)
            .await
            .with_context(|| format!("failed to write {}", path.display()))?;
        report.written = true;
        info!(path = %path.display(), regions = report.applied(), "updated template");
    }
    Ok(report)
}

fn videos_html(videos: &[VideoRef]) -> String {
    let mut html = String::from("                    <div class=\"row g-4\">\n");
    for v in videos {
        html.push_str(&format!(
            r#"                        <div class="col-lg-4 col-md-6">
                            <div class="ratio ratio-16x9 mb-2">
                                <iframe src="https://player.vimeo.com/video/{id}"
                                        frameborder="0"
                                        allow="autoplay; fullscreen; picture-in-picture"
                                        allowfullscreen>
                                </iframe>
                            </div>
                            <p class="text-center text-muted small">{title}</p>
                        </div>
"#,
            id = html_attr(&v.id),
            title = html_escape(&v.title),
        ));
    }
    html.push_str("                    </div>");
    html
}

fn cards_html(assets: &[AssetRef], category: Category) -> String {
    let mut html = String::from("                    <div class=\"row g-4\">\n");
    for a in assets {
        let file = html_attr(&a.filename);
        let href = static_tag(&format!("images/support/{}/{}", category.as_str(), a.filename));
        html.push_str(&format!(
            r##"                        <div class="col-lg-4 col-md-6">
                            <div class="asset-card bg-white d-flex align-items-center justify-content-center p-3 mb-2">
                                <img src="{href}" alt="{file}" class="img-fluid">
                            </div>
                            <div class="d-flex justify-content-end gap-3 small text-muted px-2">
                                <a href="{href}" download="{file}" class="text-reset text-decoration-none hover-mint"><i class="bi bi-download"></i> Download</a>
                                <a href="#" class="text-reset text-decoration-none hover-mint"><i class="bi bi-facebook"></i> Share</a>
                            </div>
                        </div>
"##,
            href = href,
            file = file,
        ));
    }
    html.push_str("                    </div>");
    html
}

/// `{% static %}` tag for a raw path. The path is a template literal, not HTML,
/// so it is quoted rather than entity-escaped.
fn static_tag(path: &str) -> String {
    if path.contains('\'') {
        format!("{{% static \"{}\" %}}", path)
    } else {
        format!("{{% static '{}' %}}", path)
    }
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn html_attr(s: &str) -> String {
    html_escape(s).replace('"', "&quot;").replace('\'', "&#39;")
}
