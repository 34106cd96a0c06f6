use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    Logos,
    Banners,
    FactCards,
    PostCards,
    General,
    Videos,
}

impl Category {
    /// Categories that own an image subdirectory under the output dir.
    pub const IMAGE_DIRS: [Category; 5] = [
        Category::Logos,
        Category::Banners,
        Category::FactCards,
        Category::PostCards,
        Category::General,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Logos => "logos",
            Category::Banners => "banners",
            Category::FactCards => "fact-cards",
            Category::PostCards => "post-cards",
            Category::General => "general",
            Category::Videos => "videos",
        }
    }

    pub fn parse(s: &str) -> Option<Category> {
        match s {
            "logos" => Some(Category::Logos),
            "banners" => Some(Category::Banners),
            "fact-cards" => Some(Category::FactCards),
            "post-cards" => Some(Category::PostCards),
            "general" => Some(Category::General),
            "videos" => Some(Category::Videos),
            _ => None,
        }
    }

    /// Store tag attached to images of this category.
    pub fn store_tag(&self) -> String {
        format!("support-{}", self.as_str())
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `--category` option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum CategoryFilter {
    Logos,
    Banners,
    FactCards,
    PostCards,
    Videos,
    All,
}

impl CategoryFilter {
    pub fn admits(&self, category: Category) -> bool {
        match self {
            CategoryFilter::All => true,
            CategoryFilter::Logos => category == Category::Logos,
            CategoryFilter::Banners => category == Category::Banners,
            CategoryFilter::FactCards => category == Category::FactCards,
            CategoryFilter::PostCards => category == Category::PostCards,
            CategoryFilter::Videos => category == Category::Videos,
        }
    }
}

/// `--source` option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SourceSelector {
    Scrape,
    Cms,
    Both,
}

impl SourceSelector {
    pub fn scrapes(&self) -> bool {
        matches!(self, SourceSelector::Scrape | SourceSelector::Both)
    }

    pub fn uses_cms(&self) -> bool {
        matches!(self, SourceSelector::Cms | SourceSelector::Both)
    }
}

/// A URL discovered during scraping that may reference a downloadable image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetCandidate {
    pub url: String,
    pub canonical_url: Option<String>,
    pub filename: Option<String>,
    pub category: Option<Category>,
}

impl AssetCandidate {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            canonical_url: None,
            filename: None,
            category: None,
        }
    }

    /// URL used for downloading: the canonical form when resolved.
    pub fn fetch_url(&self) -> &str {
        self.canonical_url.as_deref().unwrap_or(&self.url)
    }
}

/// An external (Vimeo) video reference, serialised into `videos.json`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VideoRef {
    pub id: String,
    pub title: String,
}

impl VideoRef {
    pub fn discovered(id: &str) -> Self {
        Self {
            id: id.to_string(),
            title: format!("Video {}", id),
        }
    }
}

/// Where a persisted asset ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRef {
    pub filename: String,
    pub category: Category,
    pub url: String,
    pub path: PathBuf,
    /// Store record id; `None` when persisted file-only.
    pub store_id: Option<i64>,
}

pub type AssetsByCategory = BTreeMap<Category, Vec<AssetRef>>;

/// Outcome of one import run.
#[derive(Debug, Clone, Default)]
pub struct ImportReport {
    pub image_candidates: Vec<String>,
    pub videos: Vec<VideoRef>,
    pub dry_run: bool,
    pub success_count: usize,
    pub skip_count: usize,
    pub assets: AssetsByCategory,
    pub template: Option<crate::template::RewriteReport>,
}
