#![allow(dead_code)]

use anyhow::Result;
use asset_importer::cms::{CmsResponse, CmsSession};
use asset_importer::config::{Cms, Config};
use asset_importer::http::{FetchError, FetchResponse, Fetcher};
use reqwest::Url;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

pub const SITE: &str = "http://site.test";
pub const CDN: &str = "cdn.test";
pub const CMS: &str = "https://cms.test";
pub const CSRF: &str = "tok123";

#[derive(Debug, Clone)]
pub enum Reply {
    Status(u16, Vec<u8>),
    Timeout,
}

/// Canned responses by URL, everything else 404. Records every request.
#[derive(Clone, Default)]
pub struct RecordingFetcher {
    routes: Arc<Mutex<HashMap<String, Reply>>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl RecordingFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn route(&self, url: &str, reply: Reply) {
        self.routes.lock().await.insert(url.to_string(), reply);
    }

    pub async fn page(&self, path: &str, html: &str) {
        self.route(&format!("{}{}", SITE, path), Reply::Status(200, html.as_bytes().to_vec()))
            .await;
    }

    pub async fn asset(&self, url: &str, bytes: &[u8]) {
        self.route(url, Reply::Status(200, bytes.to_vec())).await;
    }

    pub async fn calls(&self) -> Vec<String> {
        self.calls.lock().await.clone()
    }

    pub async fn calls_to(&self, url: &str) -> usize {
        self.calls.lock().await.iter().filter(|c| *c == url).count()
    }
}

#[async_trait::async_trait]
impl Fetcher for RecordingFetcher {
    async fn get(&self, url: &str) -> Result<FetchResponse, FetchError> {
        self.calls.lock().await.push(url.to_string());
        match self.routes.lock().await.get(url).cloned() {
            Some(Reply::Status(status, body)) => Ok(FetchResponse { status, body }),
            Some(Reply::Timeout) => Err(FetchError::Timeout(format!("{} timed out", url))),
            None => Ok(FetchResponse {
                status: 404,
                body: b"not found".to_vec(),
            }),
        }
    }
}

/// Fake CMS: serves the login page and the images API, records every request.
#[derive(Clone, Default)]
pub struct RecordingCms {
    accept_login: bool,
    listing: Option<serde_json::Value>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl RecordingCms {
    /// `listing: None` makes the images API answer 500.
    pub fn new(accept_login: bool, listing: Option<serde_json::Value>) -> Self {
        Self {
            accept_login,
            listing,
            ..Default::default()
        }
    }

    pub async fn calls(&self) -> Vec<String> {
        self.calls.lock().await.clone()
    }
}

#[async_trait::async_trait]
impl CmsSession for RecordingCms {
    async fn get(&self, url: &Url) -> Result<CmsResponse> {
        self.calls.lock().await.push(format!("GET {}", url));
        let (status, body) = if url.path().ends_with("/cms/login/") {
            (200, b"<form></form>".to_vec())
        } else if url.path().ends_with("/api/v2/images/") {
            match &self.listing {
                Some(listing) => (200, serde_json::to_vec(listing)?),
                None => (500, b"boom".to_vec()),
            }
        } else {
            (404, Vec::new())
        };
        Ok(CmsResponse {
            status,
            final_url: url.clone(),
            body,
        })
    }

    async fn post_form(
        &self,
        url: &Url,
        referer: &str,
        form: &[(&str, &str)],
    ) -> Result<CmsResponse> {
        let fields: Vec<String> = form.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        self.calls
            .lock()
            .await
            .push(format!("POST {} referer={} {}", url, referer, fields.join("&")));
        let landed = if self.accept_login {
            format!("{}/cms/", CMS)
        } else {
            format!("{}/cms/login/?next=/cms/", CMS)
        };
        Ok(CmsResponse {
            status: 200,
            final_url: Url::parse(&landed)?,
            body: Vec::new(),
        })
    }

    fn cookie(&self, _url: &Url, name: &str) -> Option<String> {
        (name == "csrftoken").then(|| CSRF.to_string())
    }
}

pub fn cms_credentials() -> Cms {
    Cms {
        base_url: CMS.to_string(),
        username: "editor".to_string(),
        password: "secret".to_string(),
    }
}

/// Built-in config pointed at the fake site, with all seeds cleared.
pub fn test_config(root: &Path, pages: &[&str]) -> Config {
    let mut cfg = Config::builtin().unwrap();
    cfg.app.output_dir = root.join("out").to_string_lossy().into_owned();
    cfg.app.template_path = root.join("support.html").to_string_lossy().into_owned();
    cfg.app.database_url = String::new();
    cfg.source.site_url = SITE.to_string();
    cfg.source.cdn_host = CDN.to_string();
    cfg.source.pages = pages.iter().map(|p| p.to_string()).collect();
    cfg.source.known_assets.clear();
    cfg.source.known_videos.clear();
    cfg.source.enumeration = None;
    cfg
}

pub fn cdn(path: &str) -> String {
    format!("https://{}/media/{}", CDN, path)
}

/// Every regular file under `dir`, recursively.
pub fn files_under(dir: &Path) -> Vec<PathBuf> {
    let mut out = Vec::new();
    let Ok(entries) = std::fs::read_dir(dir) else {
        return out;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            out.extend(files_under(&path));
        } else {
            out.push(path);
        }
    }
    out.sort();
    out
}

pub const TEMPLATE: &str = r#"<div class="tab-content">
    <div class="tab-pane fade" id="videos-content" role="tabpanel">
        <div class="text-center py-5 text-muted">Videos Content Coming Soon...</div>
    </div>
    <div class="tab-pane fade" id="facts-content" role="tabpanel">
        <div class="text-center py-5 text-muted">Fact Cards Content Coming Soon...</div>
    </div>
    <div class="tab-pane fade" id="post-content" role="tabpanel">
        <div class="text-center py-5 text-muted">Post Cards Content Coming Soon...</div>
    </div>
</div>
"#;
