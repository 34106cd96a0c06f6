//! Configuration loader and validator for the asset importer.
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::model::VideoRef;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Root configuration struct mirroring the YAML schema.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    pub app: App,
    pub source: Source,
    pub http: Http,
    #[serde(default)]
    pub cms: Cms,
}

/// Where results land on disk and in the image store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct App {
    pub output_dir: String,
    pub template_path: String,
    /// SQLite URL of the image store. Empty disables the store (file-only mode).
    #[serde(default)]
    pub database_url: String,
}

/// The legacy site and CDN being imported from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Source {
    pub site_url: String,
    pub cdn_host: String,
    #[serde(default = "default_media_prefix")]
    pub media_prefix: String,
    #[serde(default = "default_proxy_paths")]
    pub proxy_paths: Vec<String>,
    pub pages: Vec<String>,
    #[serde(default)]
    pub known_assets: Vec<String>,
    #[serde(default)]
    pub known_videos: Vec<VideoRef>,
    /// Also parse pages with an HTML parser, not just the raw-text regex scan.
    #[serde(default = "default_true")]
    pub structural_html: bool,
    #[serde(default)]
    pub enumeration: Option<Enumeration>,
}

/// Speculative URL guesses: every id in `start..end` crossed with every suffix.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Enumeration {
    /// Template containing `{id}` and `{suffix}` placeholders.
    pub url_template: String,
    pub start: u32,
    pub end: u32,
    pub suffixes: Vec<String>,
}

/// HTTP client behaviour shared by the scraper and downloader.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Http {
    pub user_agent: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

/// Legacy CMS API credentials. Empty credentials disable the CMS source.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Cms {
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

fn default_media_prefix() -> String {
    "/media/".to_string()
}

fn default_proxy_paths() -> Vec<String> {
    vec!["/_next/image".to_string()]
}

fn default_true() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    2
}

impl Http {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Cms {
    pub fn has_credentials(&self) -> bool {
        !self.username.trim().is_empty() && !self.password.is_empty()
    }
}

impl Enumeration {
    /// Expand the template into every guessed URL, in id-major order.
    pub fn urls(&self) -> Vec<String> {
        let mut out = Vec::with_capacity(
            (self.end.saturating_sub(self.start) as usize) * self.suffixes.len(),
        );
        for id in self.start..self.end {
            for suffix in &self.suffixes {
                out.push(
                    self.url_template
                        .replace("{id}", &id.to_string())
                        .replace("{suffix}", suffix),
                );
            }
        }
        out
    }
}

impl Config {
    /// The built-in configuration, used when no config file is present.
    pub fn builtin() -> Result<Config, ConfigError> {
        let cfg: Config = serde_yaml::from_str(example())?;
        validate(&cfg)?;
        Ok(cfg)
    }

    /// Page paths joined onto `source.site_url`.
    pub fn page_urls(&self) -> Vec<String> {
        let base = self.source.site_url.trim_end_matches('/');
        self.source
            .pages
            .iter()
            .map(|p| {
                if p.starts_with("http://") || p.starts_with("https://") {
                    p.clone()
                } else if p.starts_with('/') {
                    format!("{}{}", base, p)
                } else {
                    format!("{}/{}", base, p)
                }
            })
            .collect()
    }
}

/// Load configuration from a YAML file and validate it.
/// - If `path` is None, uses `config.yaml` in the current working directory,
///   falling back to [`Config::builtin`] when that file does not exist.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = match path {
        Some(p) => p,
        None => {
            let default = Path::new("config.yaml");
            if !default.exists() {
                return Config::builtin();
            }
            default
        }
    };
    let content = fs::read_to_string(path)?;
    let cfg: Config = serde_yaml::from_str(&content)?;
    validate(&cfg)?;
    Ok(cfg)
}

/// Validate a configuration instance.
/// Upper bound on `end - start` for an enumerated id range.
pub const MAX_ENUMERATION_SPAN: u32 = 10_000;

pub fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.app.output_dir.trim().is_empty() {
        return Err(ConfigError::Invalid("app.output_dir must be non-empty"));
    }
    if cfg.app.template_path.trim().is_empty() {
        return Err(ConfigError::Invalid("app.template_path must be non-empty"));
    }

    let site = cfg.source.site_url.trim();
    if !(site.starts_with("http://") || site.starts_with("https://")) {
        return Err(ConfigError::Invalid("source.site_url must be an http(s) URL"));
    }
    let host = cfg.source.cdn_host.trim();
    if host.is_empty() || host.contains('/') {
        return Err(ConfigError::Invalid("source.cdn_host must be a bare host name"));
    }
    if let Some(e) = &cfg.source.enumeration {
        if !e.url_template.contains("{id}") {
            return Err(ConfigError::Invalid(
                "source.enumeration.url_template must contain {id}",
            ));
        }
        if e.start > e.end {
            return Err(ConfigError::Invalid("source.enumeration.start must be <= end"));
        }
        if e.end - e.start > MAX_ENUMERATION_SPAN {
            return Err(ConfigError::Invalid(
                "source.enumeration range must span at most 10000 ids",
            ));
        }
        if e.suffixes.is_empty() {
            return Err(ConfigError::Invalid(
                "source.enumeration.suffixes must list at least one suffix (may be empty string)",
            ));
        }
    }
    if cfg.source.known_videos.iter().any(|v| v.id.trim().is_empty()) {
        return Err(ConfigError::Invalid("source.known_videos ids must be non-empty"));
    }

    if cfg.http.user_agent.trim().is_empty() {
        return Err(ConfigError::Invalid("http.user_agent must be non-empty"));
    }
    if cfg.http.timeout_secs == 0 {
        return Err(ConfigError::Invalid("http.timeout_secs must be > 0"));
    }
    if cfg.http.max_retries == 0 {
        return Err(ConfigError::Invalid("http.max_retries must be > 0"));
    }

    Ok(())
}

/// Returns the built-in example YAML.
pub fn example() -> &'static str {
    r#"app:
  output_dir: "cashmatters/static/images/support"
  template_path: "cashmatters/templates/support.html"
  database_url: "sqlite://./data/images.db"

source:
  site_url: "https://www.cashmatters.org"
  cdn_host: "d3an988loexeh7.cloudfront.net"
  media_prefix: "/media/"
  proxy_paths:
    - "/_next/image"
  structural_html: true
  pages:
    - "/"
    - "/supporter-resources"
    - "/why-cash-matters"
    - "/about"
    - "/key-facts"
    - "/blog"
    - "/blog?types=key-facts"
    - "/blog?types=news"
  known_assets:
    - "https://d3an988loexeh7.cloudfront.net/media/media/images/key-fact-2120_g0hl7Ko.png"
    - "https://d3an988loexeh7.cloudfront.net/media/media/images/key-fact-2121_lbCK4fP.png"
    - "https://d3an988loexeh7.cloudfront.net/media/original_images/cash-matters-logo-white.png"
    - "https://d3an988loexeh7.cloudfront.net/media/original_images/cash-matters-logo-black.png"
    - "https://d3an988loexeh7.cloudfront.net/media/original_images/cash-matters-logo.png"
    - "https://d3an988loexeh7.cloudfront.net/media/original_images/assets-header.png"
    - "https://d3an988loexeh7.cloudfront.net/media/original_images/we-support-cash-banner.png"
    - "https://d3an988loexeh7.cloudfront.net/media/images/world-global-1140x750.width-1660.jpegquality-80.jpg"
  known_videos:
    - id: "488891865"
      title: "Freedom Matters"
    - id: "417517809"
      title: "Choice Matters"
    - id: "417517552"
      title: "Cash Matters"
  enumeration:
    url_template: "https://d3an988loexeh7.cloudfront.net/media/media/images/key-fact-{id}{suffix}.png"
    start: 2100
    end: 2150
    suffixes: ["", "_g0hl7Ko", "_lbCK4fP", "_abc123"]

http:
  user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36"
  timeout_secs: 30
  max_retries: 2

cms:
  base_url: "https://cashmatters.backend-api.io"
  username: ""
  password: ""
"#
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn parse_example_ok() {
        let cfg: Config = serde_yaml::from_str(example()).unwrap();
        validate(&cfg).unwrap();
        assert_eq!(cfg.http.timeout_secs, 30);
        assert_eq!(cfg.http.max_retries, 2);
        assert_eq!(cfg.source.known_videos.len(), 3);
        assert!(!cfg.cms.has_credentials());
    }

    #[test]
    fn enumeration_expands_id_range_and_suffixes() {
        let cfg = Config::builtin().unwrap();
        let urls = cfg.source.enumeration.as_ref().unwrap().urls();
        assert_eq!(urls.len(), 50 * 4);
        assert_eq!(
            urls[0],
            "https://d3an988loexeh7.cloudfront.net/media/media/images/key-fact-2100.png"
        );
        assert!(urls[1].ends_with("key-fact-2100_g0hl7Ko.png"));
        assert!(urls.last().unwrap().ends_with("key-fact-2149_abc123.png"));
    }

    #[test]
    fn page_urls_join_site() {
        let cfg = Config::builtin().unwrap();
        let pages = cfg.page_urls();
        assert_eq!(pages[0], "https://www.cashmatters.org/");
        assert_eq!(pages[7], "https://www.cashmatters.org/blog?types=news");
    }

    #[test]
    fn invalid_cdn_host() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.source.cdn_host = "https://cdn.example/".into();
        let err = validate(&cfg).unwrap_err();
        match err {
            ConfigError::Invalid(msg) => assert!(msg.contains("cdn_host")),
            _ => panic!("wrong error"),
        }
    }

    #[test]
    fn invalid_http_settings() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.http.max_retries = 0;
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));

        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.http.timeout_secs = 0;
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn invalid_enumeration() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        if let Some(e) = cfg.source.enumeration.as_mut() {
            e.start = 10;
            e.end = 5;
        }
        let err = validate(&cfg).unwrap_err();
        match err {
            ConfigError::Invalid(msg) => assert!(msg.contains("enumeration.start")),
            _ => panic!("wrong error"),
        }
    }

    #[test]
    fn unbounded_enumeration_is_rejected() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        let e = cfg.source.enumeration.as_mut().unwrap();
        e.start = 0;
        e.end = u32::MAX;
        match validate(&cfg).unwrap_err() {
            ConfigError::Invalid(msg) => assert!(msg.contains("at most 10000")),
            _ => panic!("wrong error"),
        }

        let e = cfg.source.enumeration.as_mut().unwrap();
        e.end = MAX_ENUMERATION_SPAN;
        assert!(validate(&cfg).is_ok());
    }

    #[test]
    fn defaults_apply_to_minimal_file() {
        let td = tempdir().unwrap();
        let p = td.path().join("config.yaml");
        fs::write(
            &p,
            r#"app:
  output_dir: "out"
  template_path: "support.html"
source:
  site_url: "http://localhost"
  cdn_host: "cdn.test"
  pages: ["/"]
http:
  user_agent: "test"
"#,
        )
        .unwrap();
        let cfg = load(Some(&p)).unwrap();
        assert_eq!(cfg.http.timeout_secs, 30);
        assert_eq!(cfg.http.max_retries, 2);
        assert_eq!(cfg.source.media_prefix, "/media/");
        assert!(cfg.source.structural_html);
        assert!(cfg.source.enumeration.is_none());
        assert!(cfg.app.database_url.is_empty());
    }
}
